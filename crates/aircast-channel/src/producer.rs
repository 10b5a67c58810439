use aircast_core::{BlendMode, VideoFormatDesc};
use aircast_mixer::ImageMixer;

/// Source of frames for one layer of a channel.
///
/// The executor brackets each tick's `sample` call with
/// `begin_layer`/`end_layer`; any `push`/`visit`/`pop` nesting inside is up
/// to the producer.
pub trait Producer: Send {
    /// Blend mode of the layer this producer renders into.
    fn blend_mode(&self) -> BlendMode {
        BlendMode::Normal
    }

    /// Draw this tick's content into the mixer.
    fn sample(&mut self, mixer: &mut ImageMixer, format_desc: &VideoFormatDesc);

    /// Pass-through audio for this tick; `None` means silence.
    fn sample_audio(&mut self, _samples_per_channel: usize) -> Option<Vec<i32>> {
        None
    }
}
