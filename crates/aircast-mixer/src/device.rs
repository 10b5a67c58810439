use crate::gpu::{GpuContext, PoolKey, TexturePool};
use crate::kernel::{DrawParams, ImageKernel};
use crate::texture::{ReclaimedTexture, Texture, TextureFuture};
use aircast_core::{AircastError, AircastResult, BlendMode, ConstFrame, PixelFormat};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Counters accumulated on the device worker; all render failures end up
/// here rather than surfacing to callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceStats {
    /// Textures allocated from the driver (pool misses).
    pub allocations: u64,
    /// Textures served from the pool.
    pub pool_hits: u64,
    pub uploads: u64,
    pub readbacks: u64,
    pub draws: u64,
    pub failed_ticks: u64,
}

/// Completion handle for a task posted to the device worker.
pub struct TaskFuture<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> TaskFuture<T> {
    /// Block until the task has run.
    pub fn wait(self) -> AircastResult<T> {
        self.rx
            .recv()
            .map_err(|_| AircastError::device("device worker terminated"))
    }

    /// Block up to `timeout`; on timeout the handle is returned for later
    /// reaping.
    pub fn wait_timeout(self, timeout: Duration) -> Result<AircastResult<T>, Self> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Ok(Ok(value)),
            Err(RecvTimeoutError::Timeout) => Err(self),
            Err(RecvTimeoutError::Disconnected) => {
                Ok(Err(AircastError::device("device worker terminated")))
            }
        }
    }

    /// True once the task has completed (or can never complete); the result
    /// is discarded.
    pub fn try_reap(&mut self) -> bool {
        match self.rx.try_recv() {
            Ok(_) => true,
            Err(mpsc::TryRecvError::Disconnected) => true,
            Err(mpsc::TryRecvError::Empty) => false,
        }
    }
}

enum DeviceCommand {
    Task(Box<dyn FnOnce(&mut DeviceState) + Send>),
    Stop,
}

/// Single-threaded owner of the render context.
///
/// All GPU state transitions, binds, draws and fences happen on the worker
/// this spawns; other threads only post tasks and receive completion
/// futures.
pub struct MixDevice {
    sender: mpsc::Sender<DeviceCommand>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl MixDevice {
    /// Spawn the device worker and initialize the GPU context on it.
    pub fn new() -> AircastResult<Arc<MixDevice>> {
        let (sender, receiver) = mpsc::channel::<DeviceCommand>();
        let (init_tx, init_rx) = mpsc::sync_channel::<AircastResult<()>>(1);

        let worker = thread::Builder::new()
            .name("aircast-device".into())
            .spawn(move || {
                let mut state = match DeviceState::init() {
                    Ok(state) => {
                        let _ = init_tx.send(Ok(()));
                        state
                    }
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };
                tracing::info!(
                    adapter = %state.ctx.adapter.get_info().name,
                    "initialized GPU mixer device"
                );
                while let Ok(command) = receiver.recv() {
                    match command {
                        DeviceCommand::Task(task) => task(&mut state),
                        DeviceCommand::Stop => break,
                    }
                }
            })
            .map_err(|err| AircastError::Device(format!("failed to spawn device worker: {err}")))?;

        match init_rx.recv() {
            Ok(Ok(())) => Ok(Arc::new(MixDevice {
                sender,
                worker: Mutex::new(Some(worker)),
            })),
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                let _ = worker.join();
                Err(AircastError::device("device worker failed to start"))
            }
        }
    }

    /// Schedule `task` onto the device worker and return a completion
    /// handle. Tasks run in submission order.
    pub(crate) fn begin_invoke<T, F>(&self, task: F) -> TaskFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DeviceState) -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let _ = self.sender.send(DeviceCommand::Task(Box::new(move |state| {
            let _ = tx.send(task(state));
        })));
        TaskFuture { rx }
    }

    /// Begin uploading one plane of `frame`; the returned future becomes
    /// ready once the upload has been issued on the device worker.
    pub fn upload_async(&self, frame: ConstFrame, plane: usize) -> TextureFuture {
        let (tx, rx) = mpsc::channel();
        let _ = self.sender.send(DeviceCommand::Task(Box::new(move |state| {
            let _ = tx.send(state.upload_plane(&frame, plane));
        })));
        TextureFuture::pending(rx)
    }

    /// Read a surface back into host memory asynchronously.
    pub fn read_async(&self, texture: Texture) -> TaskFuture<AircastResult<Vec<u8>>> {
        self.begin_invoke(move |state| state.read_texture(&texture))
    }

    /// Drop every idle pooled surface.
    pub fn gc(&self) -> TaskFuture<()> {
        self.begin_invoke(|state| {
            tracing::info!("device: draining texture pool");
            state.gc();
        })
    }

    /// Snapshot of the device counters.
    pub fn stats(&self) -> AircastResult<DeviceStats> {
        self.begin_invoke(|state| state.stats()).wait()
    }
}

impl Drop for MixDevice {
    fn drop(&mut self) {
        let _ = self.sender.send(DeviceCommand::Stop);
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(handle) = worker.take() {
                let _ = handle.join();
            }
        }
    }
}

/// State confined to the device worker: context, pool, kernel, counters.
pub(crate) struct DeviceState {
    pub(crate) ctx: GpuContext,
    pool: TexturePool,
    kernel: ImageKernel,
    reclaim_tx: mpsc::Sender<ReclaimedTexture>,
    reclaim_rx: mpsc::Receiver<ReclaimedTexture>,
    stats: DeviceStats,
}

impl DeviceState {
    fn init() -> AircastResult<Self> {
        let ctx = GpuContext::init()
            .map_err(|err| AircastError::Device(format!("wgpu init failed: {err}")))?;
        let kernel = ImageKernel::new(&ctx);
        let (reclaim_tx, reclaim_rx) = mpsc::channel();
        Ok(Self {
            ctx,
            pool: TexturePool::new(),
            kernel,
            reclaim_tx,
            reclaim_rx,
            stats: DeviceStats::default(),
        })
    }

    pub(crate) fn stats(&self) -> DeviceStats {
        let mut stats = self.stats;
        stats.allocations = self.pool.allocations();
        stats.pool_hits = self.pool.hits();
        stats
    }

    pub(crate) fn note_failed_tick(&mut self) {
        self.stats.failed_ticks += 1;
    }

    fn drain_reclaimed(&mut self) {
        while let Ok(reclaimed) = self.reclaim_rx.try_recv() {
            self.pool.release(reclaimed.key, reclaimed.texture);
        }
    }

    pub(crate) fn gc(&mut self) {
        self.drain_reclaimed();
        self.pool.drain();
    }

    /// Pool a surface without clearing it (for upload and snapshot targets).
    pub(crate) fn acquire_texture(&mut self, width: u32, height: u32, channels: u32) -> Texture {
        let format = if channels == 1 {
            wgpu::TextureFormat::R8Unorm
        } else {
            wgpu::TextureFormat::Bgra8Unorm
        };
        self.acquire_with_format(width, height, channels, format)
    }

    fn acquire_with_format(
        &mut self,
        width: u32,
        height: u32,
        channels: u32,
        format: wgpu::TextureFormat,
    ) -> Texture {
        self.drain_reclaimed();
        let key = PoolKey {
            width,
            height,
            format,
        };
        let raw = self.pool.acquire(&self.ctx.device, key);
        Texture::new(raw, key, channels, self.reclaim_tx.clone())
    }

    /// Pool a cleared surface, ready to serve as a draw target.
    pub(crate) fn create_texture(&mut self, width: u32, height: u32, channels: u32) -> Texture {
        let texture = self.acquire_texture(width, height, channels);
        self.clear_texture(&texture);
        texture
    }

    pub(crate) fn clear_texture(&mut self, texture: &Texture) {
        let view = texture.view();
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear_surface"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.ctx.queue.submit(Some(encoder.finish()));
    }

    /// Upload one plane of a frame through the staging belt.
    pub(crate) fn upload_plane(&mut self, frame: &ConstFrame, plane: usize) -> Texture {
        let desc = frame.pixel_format_desc();
        let geometry = desc.planes[plane];
        let format = plane_texture_format(desc.format, geometry.channels);
        let texture = self.acquire_with_format(
            geometry.width as u32,
            geometry.height as u32,
            geometry.channels as u32,
            format,
        );

        self.ctx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: texture.raw(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            frame.image_data(plane),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(geometry.stride as u32),
                rows_per_image: Some(geometry.height as u32),
            },
            wgpu::Extent3d {
                width: geometry.width as u32,
                height: geometry.height as u32,
                depth_or_array_layers: 1,
            },
        );
        self.stats.uploads += 1;
        texture
    }

    /// Read a surface back as tightly packed bytes in top-down row order.
    pub(crate) fn read_texture(&mut self, texture: &Texture) -> AircastResult<Vec<u8>> {
        let width = texture.width();
        let height = texture.height();
        let bytes_per_pixel = match texture.format() {
            wgpu::TextureFormat::R8Unorm => 1u32,
            _ => 4u32,
        };
        let unpadded_bytes_per_row = width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = (unpadded_bytes_per_row + align - 1) / align * align;

        let buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mixer_readback"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: texture.raw(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.ctx.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| AircastError::device("readback mapping never completed"))?
            .map_err(|err| AircastError::Device(format!("readback mapping failed: {err}")))?;

        let data = slice.get_mapped_range();
        let mut packed = vec![0u8; (unpadded_bytes_per_row * height) as usize];
        for row in 0..height as usize {
            let src_start = row * padded_bytes_per_row as usize;
            let dst_start = row * unpadded_bytes_per_row as usize;
            packed[dst_start..dst_start + unpadded_bytes_per_row as usize]
                .copy_from_slice(&data[src_start..src_start + unpadded_bytes_per_row as usize]);
        }
        drop(data);
        buffer.unmap();

        self.stats.readbacks += 1;
        Ok(packed)
    }

    /// Rasterize one quad. Non-normal blend modes snapshot the destination
    /// first so the fragment program can compose against it.
    pub(crate) fn draw(&mut self, params: DrawParams) -> AircastResult<()> {
        if params.transform.opacity <= 0.0
            || params.transform.field_mode == aircast_core::FieldMode::Empty
            || params.textures.is_empty()
        {
            return Ok(());
        }

        let snapshot = if params.blend_mode != BlendMode::Normal {
            let background = &params.background;
            let snapshot = self.acquire_texture(
                background.width(),
                background.height(),
                background.channels(),
            );
            let mut encoder = self
                .ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
            encoder.copy_texture_to_texture(
                params.background.raw().as_image_copy(),
                snapshot.raw().as_image_copy(),
                wgpu::Extent3d {
                    width: background.width(),
                    height: background.height(),
                    depth_or_array_layers: 1,
                },
            );
            self.ctx.queue.submit(Some(encoder.finish()));
            Some(snapshot)
        } else {
            None
        };

        self.stats.draws += 1;
        let DeviceState {
            ref ctx,
            ref mut kernel,
            ..
        } = *self;
        kernel.draw(ctx, &params, snapshot.as_ref())
    }
}

fn plane_texture_format(format: PixelFormat, channels: usize) -> wgpu::TextureFormat {
    if channels == 1 {
        wgpu::TextureFormat::R8Unorm
    } else if format == PixelFormat::Bgra {
        wgpu::TextureFormat::Bgra8Unorm
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_texture_formats() {
        assert_eq!(
            plane_texture_format(PixelFormat::Bgra, 4),
            wgpu::TextureFormat::Bgra8Unorm
        );
        assert_eq!(
            plane_texture_format(PixelFormat::Argb, 4),
            wgpu::TextureFormat::Rgba8Unorm
        );
        assert_eq!(
            plane_texture_format(PixelFormat::Ycbcr, 1),
            wgpu::TextureFormat::R8Unorm
        );
    }

    #[test]
    fn test_task_future_reports_dead_worker() {
        let (tx, rx) = mpsc::channel::<u32>();
        drop(tx);
        let future = TaskFuture { rx };
        assert!(future.wait().is_err());
    }
}
