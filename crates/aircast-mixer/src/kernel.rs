use crate::gpu::GpuContext;
use crate::texture::Texture;
use aircast_core::{
    AircastResult, BlendMode, ImageTransform, Keyer, PixelFormat, PixelFormatDesc,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 2],
    uv: [f32; 2],
}

const VERTICES: &[Vertex] = &[
    // Tri 1
    Vertex { position: [0.0, 0.0], uv: [0.0, 0.0] },
    Vertex { position: [0.0, 1.0], uv: [0.0, 1.0] },
    Vertex { position: [1.0, 1.0], uv: [1.0, 1.0] },
    // Tri 2
    Vertex { position: [0.0, 0.0], uv: [0.0, 0.0] },
    Vertex { position: [1.0, 1.0], uv: [1.0, 1.0] },
    Vertex { position: [1.0, 0.0], uv: [1.0, 0.0] },
];

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct KernelUniforms {
    fill: [f32; 4],
    viewport: [f32; 4],
    levels: [f32; 4],
    color_adj: [f32; 4],
    modes: [u32; 4],
    keys: [u32; 4],
    tint: [f32; 4],
}

/// How the shader output reaches the attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BlendKind {
    /// Premultiplied source-over.
    Over,
    /// Additive with saturation (mix accumulation).
    Add,
    /// The shader already composed against a snapshot; plain write.
    Composed,
}

impl BlendKind {
    fn state(self) -> Option<wgpu::BlendState> {
        match self {
            BlendKind::Over => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            BlendKind::Add => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            BlendKind::Composed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    /// Pixel-format hash of the source (see `PixelFormatDesc::program_key`).
    program: u32,
    target: wgpu::TextureFormat,
    blend: BlendKind,
}

/// Everything one kernel draw needs.
pub(crate) struct DrawParams {
    pub pix_desc: PixelFormatDesc,
    pub textures: Vec<Texture>,
    pub transform: ImageTransform,
    pub blend_mode: BlendMode,
    pub keyer: Keyer,
    /// Bound as the render target; sampled via a snapshot for non-normal
    /// blend modes.
    pub background: Texture,
    pub local_key: Option<Texture>,
    pub layer_key: Option<Texture>,
    /// Write the item's gated alpha as a mask instead of color.
    pub write_key: bool,
    /// The source already carries premultiplied alpha (internal buffers).
    pub premultiplied: bool,
}

/// Stateless draw primitive: one quad, one fragment program, one target.
pub(crate) struct ImageKernel {
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    sampler: wgpu::Sampler,
    vertex_buffer: wgpu::Buffer,
    dummy_rgba: wgpu::Texture,
    dummy_r8: wgpu::Texture,
}

impl ImageKernel {
    pub fn new(ctx: &GpuContext) -> Self {
        let module = ctx
            .device
            .create_shader_module(wgpu::include_wgsl!("kernel.wgsl"));

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("kernel_bind_group_layout"),
                    entries: &[
                        texture_entry(0),
                        texture_entry(1),
                        texture_entry(2),
                        texture_entry(3),
                        texture_entry(4),
                        texture_entry(5),
                        texture_entry(6),
                        wgpu::BindGroupLayoutEntry {
                            binding: 7,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 8,
                            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                    ],
                });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("kernel_pipeline_layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let vertex_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kernel_vertex_buffer"),
                contents: bytemuck::cast_slice(VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let dummy = |format| {
            ctx.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("kernel_dummy"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        };

        Self {
            module,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            sampler,
            vertex_buffer,
            dummy_rgba: dummy(wgpu::TextureFormat::Bgra8Unorm),
            dummy_r8: dummy(wgpu::TextureFormat::R8Unorm),
        }
    }

    pub fn draw(
        &mut self,
        ctx: &GpuContext,
        params: &DrawParams,
        snapshot: Option<&Texture>,
    ) -> AircastResult<()> {
        let target = &params.background;
        let target_width = target.width();
        let target_height = target.height();

        let Some((scissor_x, scissor_y, scissor_w, scissor_h)) =
            scissor_rect(&params.transform, target_width, target_height)
        else {
            return Ok(());
        };

        let transform = &params.transform;
        let uniforms = KernelUniforms {
            fill: [
                transform.fill_translation[0] as f32,
                transform.fill_translation[1] as f32,
                transform.fill_scale[0] as f32,
                transform.fill_scale[1] as f32,
            ],
            viewport: [target_width as f32, target_height as f32, 0.0, 0.0],
            levels: [
                transform.levels.min_input as f32,
                transform.levels.max_input as f32,
                transform.levels.min_output as f32,
                transform.levels.max_output as f32,
            ],
            color_adj: [
                transform.levels.gamma as f32,
                transform.brightness as f32,
                transform.contrast as f32,
                transform.saturation as f32,
            ],
            modes: [
                shader_format_code(params.pix_desc.format),
                transform.field_mode.bits() as u32,
                match params.keyer {
                    Keyer::Linear => 0,
                    Keyer::Additive => 1,
                },
                params.blend_mode.as_u32(),
            ],
            keys: [
                params.local_key.is_some() as u32,
                params.layer_key.is_some() as u32,
                params.write_key as u32,
                params.premultiplied as u32,
            ],
            tint: [transform.opacity as f32, 0.0, 0.0, 0.0],
        };

        let uniform_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kernel_uniforms"),
                contents: bytemuck::cast_slice(&[uniforms]),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let dummy_rgba_view = self
            .dummy_rgba
            .create_view(&wgpu::TextureViewDescriptor::default());
        let dummy_r8_view = self
            .dummy_r8
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut plane_views = Vec::with_capacity(4);
        for texture in params.textures.iter().take(4) {
            plane_views.push(texture.view());
        }
        let plane0 = plane_views.first().unwrap_or(&dummy_rgba_view);
        let plane1 = plane_views.get(1).unwrap_or(&dummy_rgba_view);
        let plane2 = plane_views.get(2).unwrap_or(&dummy_rgba_view);
        let plane3 = plane_views.get(3).unwrap_or(&dummy_rgba_view);

        let snapshot_view = snapshot.map(|texture| texture.view());
        let background_view = snapshot_view.as_ref().unwrap_or(&dummy_rgba_view);
        let local_key_view = params.local_key.as_ref().map(|t| t.view());
        let layer_key_view = params.layer_key.as_ref().map(|t| t.view());

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(plane0),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(plane1),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(plane2),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(plane3),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(background_view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(
                        local_key_view.as_ref().unwrap_or(&dummy_r8_view),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(
                        layer_key_view.as_ref().unwrap_or(&dummy_r8_view),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 8,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let blend = if params.write_key {
            BlendKind::Over
        } else if params.blend_mode != BlendMode::Normal {
            BlendKind::Composed
        } else if params.keyer == Keyer::Additive {
            BlendKind::Add
        } else {
            BlendKind::Over
        };
        let key = PipelineKey {
            program: params.pix_desc.program_key(),
            target: target.format(),
            blend,
        };
        let pipeline = match self.pipelines.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(vacant) => {
                let pipeline = build_pipeline(
                    &ctx.device,
                    &self.module,
                    &self.pipeline_layout,
                    key.target,
                    blend,
                );
                vacant.insert(pipeline)
            }
        };

        let target_view = target.view();
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kernel_draw"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            pass.set_scissor_rect(scissor_x, scissor_y, scissor_w, scissor_h);
            pass.draw(0..VERTICES.len() as u32, 0..1);
        }
        ctx.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    target: wgpu::TextureFormat,
    blend: BlendKind,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("kernel_pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: "vs_main",
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: "fs_main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: target,
                blend: blend.state(),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

fn shader_format_code(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Bgra => 0,
        PixelFormat::Rgba => 1,
        PixelFormat::Argb => 2,
        PixelFormat::Abgr => 3,
        PixelFormat::Ycbcr => 4,
        PixelFormat::Ycbcra => 5,
        PixelFormat::Invalid => 0,
    }
}

/// Scissor rectangle in target pixels derived from the clip transform, or
/// `None` when the clip leaves nothing visible. Negative clip scales are
/// normalized; clips outside [0, 1] are clamped to the target.
fn scissor_rect(
    transform: &ImageTransform,
    target_width: u32,
    target_height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let mut x0 = transform.clip_translation[0];
    let mut y0 = transform.clip_translation[1];
    let mut w = transform.clip_scale[0];
    let mut h = transform.clip_scale[1];
    if w < 0.0 {
        x0 += w;
        w = -w;
    }
    if h < 0.0 {
        y0 += h;
        h = -h;
    }

    let width = target_width as f64;
    let height = target_height as f64;
    let x_min = (x0 * width).floor().clamp(0.0, width);
    let y_min = (y0 * height).floor().clamp(0.0, height);
    let x_max = ((x0 + w) * width).ceil().clamp(0.0, width);
    let y_max = ((y0 + h) * height).ceil().clamp(0.0, height);
    if x_max <= x_min || y_max <= y_min {
        return None;
    }
    Some((
        x_min as u32,
        y_min as u32,
        (x_max - x_min) as u32,
        (y_max - y_min) as u32,
    ))
}
