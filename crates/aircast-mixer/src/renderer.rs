use crate::device::{DeviceState, MixDevice, TaskFuture};
use crate::kernel::DrawParams;
use crate::texture::{Texture, TextureFuture};
use aircast_core::{
    AircastError, AircastResult, BlendMode, FieldMode, ImageTransform, Keyer, PixelFormat,
    PixelFormatDesc, VideoFormatDesc,
};
use std::sync::Arc;
use std::time::Duration;

/// One source image within one layer: descriptor, native field order, the
/// cumulative transform at visit time and one upload handle per plane.
#[derive(Clone)]
pub struct Item {
    pub pix_desc: PixelFormatDesc,
    pub field_mode: FieldMode,
    pub transform: ImageTransform,
    pub textures: Vec<TextureFuture>,
}

/// Ordered items plus the blend mode the finished layer composites with.
#[derive(Clone)]
pub struct Layer {
    pub items: Vec<Item>,
    pub blend_mode: BlendMode,
}

impl Layer {
    pub fn new(blend_mode: BlendMode) -> Self {
        Self {
            items: Vec::new(),
            blend_mode,
        }
    }
}

/// Why a tick's composition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFailure {
    /// A kernel draw failed; the remaining layers were aborted. The channel
    /// should repeat its last good frame.
    Draw,
    /// The device could not serve the tick (lost context or allocation
    /// pressure). The channel should ship a zero frame and consider itself
    /// degraded.
    Device,
}

/// Completion handle for one composed frame.
///
/// A successful wait yields exactly the declared frame size; a failed
/// composition surfaces as a [`RenderFailure`] sentinel so the channel can
/// fall back to its last good frame instead of shipping the broken one.
pub enum FrameFuture {
    Ready(Vec<u8>),
    Pending {
        task: TaskFuture<Result<Vec<u8>, RenderFailure>>,
    },
}

impl FrameFuture {
    /// Block until the frame is composed and read back.
    pub fn wait(self) -> Result<Vec<u8>, RenderFailure> {
        match self {
            FrameFuture::Ready(bytes) => Ok(bytes),
            FrameFuture::Pending { task } => match task.wait() {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!("device lost while awaiting frame: {}", err);
                    Err(RenderFailure::Device)
                }
            },
        }
    }

    /// Block up to `timeout`; on timeout the future is handed back so the
    /// stale readback can still be reaped when it arrives.
    pub fn wait_timeout(
        self,
        timeout: Duration,
    ) -> Result<Result<Vec<u8>, RenderFailure>, FrameFuture> {
        match self {
            FrameFuture::Ready(bytes) => Ok(Ok(bytes)),
            FrameFuture::Pending { task } => match task.wait_timeout(timeout) {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(err)) => {
                    tracing::error!("device lost while awaiting frame: {}", err);
                    Ok(Err(RenderFailure::Device))
                }
                Err(task) => Err(FrameFuture::Pending { task }),
            },
        }
    }

    /// True once the underlying readback has arrived (result discarded).
    pub fn try_reap(&mut self) -> bool {
        match self {
            FrameFuture::Ready(_) => true,
            FrameFuture::Pending { task } => task.try_reap(),
        }
    }
}

/// Per-frame composition: decomposes layers into kernel draws on the device
/// worker and returns the asynchronous readback of the packed result.
pub struct ImageRenderer {
    device: Arc<MixDevice>,
}

impl ImageRenderer {
    pub fn new(device: Arc<MixDevice>) -> Self {
        Self { device }
    }

    pub fn render(&self, layers: Vec<Layer>, format_desc: &VideoFormatDesc) -> FrameFuture {
        if layers.is_empty() {
            // Bypass the GPU entirely for an empty frame.
            return FrameFuture::Ready(vec![0u8; format_desc.size]);
        }

        let format_desc = format_desc.clone();
        let task = self.device.begin_invoke(move |state| {
            compose(state, layers, &format_desc).map_err(|err| {
                tracing::error!(format = %format_desc, "tick aborted: {}", err);
                state.note_failed_tick();
                match err {
                    AircastError::Device(_) => RenderFailure::Device,
                    _ => RenderFailure::Draw,
                }
            })
        });
        FrameFuture::Pending { task }
    }
}

fn compose(
    state: &mut DeviceState,
    layers: Vec<Layer>,
    format_desc: &VideoFormatDesc,
) -> AircastResult<Vec<u8>> {
    let draw_buffer =
        state.create_texture(format_desc.width as u32, format_desc.height as u32, 4);

    if format_desc.field_mode != FieldMode::Progressive {
        // The upper pass consumes moved state, so the lower pass gets the
        // original layer list.
        draw(state, layers.clone(), &draw_buffer, format_desc, FieldMode::Upper)?;
        draw(state, layers, &draw_buffer, format_desc, FieldMode::Lower)?;
    } else {
        draw(
            state,
            layers,
            &draw_buffer,
            format_desc,
            FieldMode::Progressive,
        )?;
    }

    state.read_texture(&draw_buffer)
}

fn draw(
    state: &mut DeviceState,
    layers: Vec<Layer>,
    draw_buffer: &Texture,
    format_desc: &VideoFormatDesc,
    pass: FieldMode,
) -> AircastResult<()> {
    let mut layer_key_buffer: Option<Texture> = None;
    for layer in layers {
        draw_layer(state, layer, draw_buffer, &mut layer_key_buffer, format_desc, pass)?;
    }
    Ok(())
}

/// Field-mode rewriting applied to a layer's items before drawing a pass.
///
/// NTSC-DV inputs get their active-line bias compensated, items whose field
/// order disagrees with the output are shifted one line, every item is
/// masked to the pass and interlaced stills are dropped from the first
/// field so they only render on the last one.
pub fn prepare_items(
    items: Vec<Item>,
    format_desc: &VideoFormatDesc,
    pass: FieldMode,
) -> Vec<Item> {
    let height = format_desc.height as f64;
    items
        .into_iter()
        .filter_map(|mut item| {
            if item.pix_desc.planes.first().map(|p| p.height) == Some(480) {
                // NTSC DV
                item.transform.fill_translation[1] += 2.0 / height;
                item.transform.fill_scale[1] = 1.0 - 6.0 / height;
            }

            if item.field_mode == FieldMode::Lower && format_desc.field_mode == FieldMode::Upper {
                item.transform.fill_translation[1] += 1.0 / height;
            } else if item.field_mode == FieldMode::Upper
                && format_desc.field_mode == FieldMode::Lower
            {
                item.transform.fill_translation[1] -= 1.0 / height;
            }

            item.transform.field_mode &= pass;
            if item.transform.field_mode == FieldMode::Empty {
                return None;
            }
            // Only use the last field for stills.
            if item.transform.is_still && item.transform.field_mode == format_desc.field_mode {
                return None;
            }
            Some(item)
        })
        .collect()
}

fn draw_layer(
    state: &mut DeviceState,
    layer: Layer,
    draw_buffer: &Texture,
    layer_key_buffer: &mut Option<Texture>,
    format_desc: &VideoFormatDesc,
    pass: FieldMode,
) -> AircastResult<()> {
    let items = prepare_items(layer.items, format_desc, pass);
    if items.is_empty() {
        // The layer contributes nothing; the rolling layer key passes
        // through unchanged.
        return Ok(());
    }

    let mut local_key_buffer: Option<Texture> = None;
    let mut local_mix_buffer: Option<Texture> = None;

    if layer.blend_mode != BlendMode::Normal {
        let layer_draw_buffer =
            state.create_texture(draw_buffer.width(), draw_buffer.height(), 4);
        for item in items {
            draw_item(
                state,
                item,
                &layer_draw_buffer,
                layer_key_buffer,
                &mut local_key_buffer,
                &mut local_mix_buffer,
            )?;
        }
        draw_mixer_buffer(
            state,
            &layer_draw_buffer,
            local_mix_buffer.take(),
            BlendMode::Normal,
        )?;
        draw_mixer_buffer(state, draw_buffer, Some(layer_draw_buffer), layer.blend_mode)?;
    } else {
        // Fast path: items draw straight onto the shared buffer.
        for item in items {
            draw_item(
                state,
                item,
                draw_buffer,
                layer_key_buffer,
                &mut local_key_buffer,
                &mut local_mix_buffer,
            )?;
        }
        draw_mixer_buffer(state, draw_buffer, local_mix_buffer.take(), BlendMode::Normal)?;
    }

    // This layer's local key becomes the next layer's layer key; the
    // propagation is exactly one layer deep.
    *layer_key_buffer = local_key_buffer;
    Ok(())
}

fn draw_item(
    state: &mut DeviceState,
    item: Item,
    draw_buffer: &Texture,
    layer_key_buffer: &Option<Texture>,
    local_key_buffer: &mut Option<Texture>,
    local_mix_buffer: &mut Option<Texture>,
) -> AircastResult<()> {
    let mut textures = Vec::with_capacity(item.textures.len());
    for future in &item.textures {
        textures.push(future.get()?);
    }

    if item.transform.is_key {
        let key_buffer = local_key_buffer
            .get_or_insert_with(|| state.create_texture(draw_buffer.width(), draw_buffer.height(), 1))
            .clone();
        state.draw(DrawParams {
            pix_desc: item.pix_desc,
            textures,
            transform: item.transform,
            blend_mode: BlendMode::Normal,
            keyer: Keyer::Linear,
            background: key_buffer,
            local_key: None,
            layer_key: None,
            write_key: true,
            premultiplied: false,
        })
    } else if item.transform.is_mix {
        let mix_buffer = local_mix_buffer
            .get_or_insert_with(|| state.create_texture(draw_buffer.width(), draw_buffer.height(), 4))
            .clone();
        state.draw(DrawParams {
            pix_desc: item.pix_desc,
            textures,
            transform: item.transform,
            blend_mode: BlendMode::Normal,
            keyer: Keyer::Additive,
            background: mix_buffer,
            // Mixes borrow the local key so every accumulated source stays
            // gated by it; only plain items consume it.
            local_key: local_key_buffer.clone(),
            layer_key: layer_key_buffer.clone(),
            write_key: false,
            premultiplied: false,
        })
    } else {
        // Flush accumulated mixes before the item so they stay gated
        // between key-delimited groups.
        draw_mixer_buffer(state, draw_buffer, local_mix_buffer.take(), BlendMode::Normal)?;
        state.draw(DrawParams {
            pix_desc: item.pix_desc,
            textures,
            transform: item.transform,
            blend_mode: BlendMode::Normal,
            keyer: Keyer::Linear,
            background: draw_buffer.clone(),
            local_key: local_key_buffer.take(),
            layer_key: layer_key_buffer.clone(),
            write_key: false,
            premultiplied: false,
        })
    }
}

fn draw_mixer_buffer(
    state: &mut DeviceState,
    draw_buffer: &Texture,
    source_buffer: Option<Texture>,
    blend_mode: BlendMode,
) -> AircastResult<()> {
    let Some(source_buffer) = source_buffer else {
        return Ok(());
    };
    state.draw(DrawParams {
        pix_desc: PixelFormatDesc::packed(
            PixelFormat::Bgra,
            source_buffer.width() as usize,
            source_buffer.height() as usize,
        ),
        textures: vec![source_buffer],
        transform: ImageTransform::identity(),
        blend_mode,
        keyer: Keyer::Linear,
        background: draw_buffer.clone(),
        local_key: None,
        layer_key: None,
        write_key: false,
        premultiplied: true,
    })
}
