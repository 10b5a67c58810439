use crate::device::MixDevice;
use crate::renderer::{FrameFuture, ImageRenderer, Item, Layer};
use aircast_core::{
    AircastResult, BlendMode, ConstFrame, FieldMode, FrameTransform, ImageTransform, MutableFrame,
    PixelFormat, PixelFormatDesc, VideoFormatDesc,
};
use std::sync::Arc;

/// Stateful per-channel front end of the compositor.
///
/// During a tick, producers drive `begin_layer`/`push`/`visit`/`pop`/
/// `end_layer`; `render` then hands the accumulated plan to the renderer.
/// All operations run on the channel executor and are not reentrant.
pub struct ImageMixer {
    device: Arc<MixDevice>,
    renderer: ImageRenderer,
    transform_stack: Vec<ImageTransform>,
    layers: Vec<Layer>,
}

impl ImageMixer {
    pub fn new(device: Arc<MixDevice>) -> Self {
        tracing::info!("initialized GPU image mixer");
        Self {
            renderer: ImageRenderer::new(device.clone()),
            device,
            transform_stack: vec![ImageTransform::identity()],
            layers: Vec::new(),
        }
    }

    /// Open a new layer on top of the previous ones.
    pub fn begin_layer(&mut self, blend_mode: BlendMode) {
        self.layers.push(Layer::new(blend_mode));
    }

    /// Sentinel closing the current layer.
    pub fn end_layer(&mut self) {}

    /// Push the cumulative product of the stack top and `transform`.
    pub fn push(&mut self, transform: &FrameTransform) {
        let top = *self
            .transform_stack
            .last()
            .expect("transform stack is never empty");
        self.transform_stack.push(top * transform.image_transform);
    }

    /// Drop the top transform. Must pair with a prior `push`.
    pub fn pop(&mut self) {
        debug_assert!(self.transform_stack.len() > 1, "pop without matching push");
        if self.transform_stack.len() > 1 {
            self.transform_stack.pop();
        }
    }

    /// Accept one frame into the current layer and start uploading its
    /// planes. Invalid frames and empty-field visits are silently skipped.
    pub fn visit(&mut self, frame: &ConstFrame) {
        let desc = frame.pixel_format_desc();
        if desc.format == PixelFormat::Invalid || desc.planes.is_empty() {
            return;
        }
        let top = *self
            .transform_stack
            .last()
            .expect("transform stack is never empty");
        if top.field_mode == FieldMode::Empty {
            return;
        }
        if self.layers.is_empty() {
            tracing::debug!("visit outside a layer ignored");
            return;
        }

        let textures = (0..desc.planes.len())
            .map(|plane| self.device.upload_async(frame.clone(), plane))
            .collect();
        let item = Item {
            pix_desc: desc.clone(),
            field_mode: frame.field_mode(),
            transform: top,
            textures,
        };
        if let Some(layer) = self.layers.last_mut() {
            layer.items.push(item);
        }
    }

    /// Submit the accumulated layers for composition; the layer list is
    /// empty afterwards while the transform stack is preserved.
    pub fn render(&mut self, format_desc: &VideoFormatDesc) -> FrameFuture {
        debug_assert_eq!(
            self.transform_stack.len(),
            1,
            "transform stack unbalanced at end of tick"
        );
        self.renderer
            .render(std::mem::take(&mut self.layers), format_desc)
    }

    /// Current depth of the transform stack (1 when balanced).
    pub fn transform_depth(&self) -> usize {
        self.transform_stack.len()
    }

    /// Items accepted so far in this tick.
    pub fn pending_item_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.items.len()).sum()
    }

    /// Producer helper: allocate a writable frame for this mixer.
    pub fn create_frame(
        &self,
        tag: u64,
        desc: PixelFormatDesc,
        frame_rate: f64,
        field_mode: FieldMode,
    ) -> AircastResult<MutableFrame> {
        MutableFrame::new(tag, desc, frame_rate, field_mode)
    }
}
