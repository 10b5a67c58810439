use aircast_core::{AircastResult, VideoFormatDesc};
use std::sync::Arc;

/// One composed frame as delivered to consumers.
#[derive(Clone)]
pub struct OutputFrame {
    /// Monotonic tick index within the channel.
    pub tick: u64,
    pub format_desc: VideoFormatDesc,
    /// Packed BGRA bytes in top-down row order, exactly
    /// `format_desc.size` long.
    pub image: Arc<Vec<u8>>,
    /// Interleaved pass-through audio samples for this tick.
    pub audio: Arc<Vec<i32>>,
}

/// Output sink of a channel (file writer, SDI card, preview).
pub trait Consumer: Send {
    /// Deliver one frame. Returning an error drops the consumer from the
    /// channel.
    fn send(&mut self, frame: &OutputFrame) -> AircastResult<()>;
}
