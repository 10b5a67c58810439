use anyhow::Result;
use std::collections::HashMap;
use wgpu::{Adapter, Device, Extent3d, Instance, Queue, TextureDescriptor, TextureFormat};

/// Usage every pooled surface is created with, so any pool entry can serve
/// as upload target, sample source, render attachment or readback source.
pub(crate) const TEXTURE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::RENDER_ATTACHMENT)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
pub(crate) struct PoolKey {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Free-list of GPU surfaces keyed by geometry and format.
///
/// Owned by the device worker and only touched from it; handles dropped on
/// other threads migrate their surface back through the reclaim channel.
pub(crate) struct TexturePool {
    free: HashMap<PoolKey, Vec<wgpu::Texture>>,
    allocations: u64,
    hits: u64,
}

impl TexturePool {
    pub fn new() -> Self {
        Self {
            free: HashMap::new(),
            allocations: 0,
            hits: 0,
        }
    }

    pub fn acquire(&mut self, device: &Device, key: PoolKey) -> wgpu::Texture {
        if let Some(textures) = self.free.get_mut(&key) {
            if let Some(texture) = textures.pop() {
                self.hits += 1;
                return texture;
            }
        }

        self.allocations += 1;
        device.create_texture(&TextureDescriptor {
            label: Some("mixer_surface"),
            size: Extent3d {
                width: key.width,
                height: key.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: key.format,
            usage: TEXTURE_USAGE,
            view_formats: &[],
        })
    }

    pub fn release(&mut self, key: PoolKey, texture: wgpu::Texture) {
        self.free.entry(key).or_insert_with(Vec::new).push(texture);
    }

    /// Drop every idle surface. The pool is a cache, not a hard allocator.
    pub fn drain(&mut self) {
        self.free.clear();
    }

    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

/// A shared context for all GPU operations of one device worker.
pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
}

impl GpuContext {
    /// Initializes WGPU headlessly, selecting the best available backend.
    pub fn init() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None, // Headless rendering
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow::anyhow!("Failed to find suitable wgpu adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Aircast Mixer Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}
