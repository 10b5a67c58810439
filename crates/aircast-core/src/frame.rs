use crate::error::AircastResult;
use crate::field::FieldMode;
use crate::pixel::PixelFormatDesc;
use std::sync::Arc;

/// A host-side frame under construction by a producer.
///
/// One byte array per plane, sized from the descriptor, plus an interleaved
/// 32-bit audio buffer that rides along untouched by the video mix.
pub struct MutableFrame {
    tag: u64,
    pix_desc: PixelFormatDesc,
    frame_rate: f64,
    field_mode: FieldMode,
    planes: Vec<Vec<u8>>,
    audio: Vec<i32>,
}

impl MutableFrame {
    /// Allocate a frame with zeroed planes; fails on an invalid descriptor.
    pub fn new(
        tag: u64,
        pix_desc: PixelFormatDesc,
        frame_rate: f64,
        field_mode: FieldMode,
    ) -> AircastResult<Self> {
        pix_desc.validate()?;
        let planes = pix_desc.planes.iter().map(|p| vec![0u8; p.size()]).collect();
        Ok(Self {
            tag,
            pix_desc,
            frame_rate,
            field_mode,
            planes,
            audio: Vec::new(),
        })
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn pixel_format_desc(&self) -> &PixelFormatDesc {
        &self.pix_desc
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn field_mode(&self) -> FieldMode {
        self.field_mode
    }

    /// Mutable pixel bytes of one plane.
    pub fn image_data_mut(&mut self, plane: usize) -> &mut [u8] {
        &mut self.planes[plane]
    }

    /// Mutable pass-through audio buffer (interleaved 32-bit samples).
    pub fn audio_mut(&mut self) -> &mut Vec<i32> {
        &mut self.audio
    }

    /// Seal the frame for sharing with the mixer.
    pub fn freeze(self) -> ConstFrame {
        ConstFrame {
            inner: Arc::new(FrameInner {
                tag: self.tag,
                pix_desc: self.pix_desc,
                frame_rate: self.frame_rate,
                field_mode: self.field_mode,
                planes: self.planes,
                audio: self.audio,
            }),
        }
    }
}

struct FrameInner {
    tag: u64,
    pix_desc: PixelFormatDesc,
    frame_rate: f64,
    field_mode: FieldMode,
    planes: Vec<Vec<u8>>,
    audio: Vec<i32>,
}

/// An immutable, cheaply clonable frame as visited by the mixer.
#[derive(Clone)]
pub struct ConstFrame {
    inner: Arc<FrameInner>,
}

impl ConstFrame {
    pub fn tag(&self) -> u64 {
        self.inner.tag
    }

    pub fn pixel_format_desc(&self) -> &PixelFormatDesc {
        &self.inner.pix_desc
    }

    pub fn frame_rate(&self) -> f64 {
        self.inner.frame_rate
    }

    pub fn field_mode(&self) -> FieldMode {
        self.inner.field_mode
    }

    pub fn plane_count(&self) -> usize {
        self.inner.planes.len()
    }

    /// Pixel bytes of one plane (stride declared in the descriptor).
    pub fn image_data(&self, plane: usize) -> &[u8] {
        &self.inner.planes[plane]
    }

    pub fn audio_data(&self) -> &[i32] {
        &self.inner.audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{PixelFormat, PixelFormatDesc};

    #[test]
    fn test_mutable_frame_allocates_planes() {
        let desc = PixelFormatDesc::packed(PixelFormat::Bgra, 16, 8);
        let frame = MutableFrame::new(1, desc, 25.0, FieldMode::Progressive).unwrap();
        assert_eq!(frame.pixel_format_desc().planes.len(), 1);
    }

    #[test]
    fn test_mutable_frame_rejects_invalid_desc() {
        let desc = PixelFormatDesc::new(PixelFormat::Invalid);
        assert!(MutableFrame::new(1, desc, 25.0, FieldMode::Progressive).is_err());
    }

    #[test]
    fn test_freeze_preserves_contents() {
        let desc = PixelFormatDesc::packed(PixelFormat::Bgra, 2, 2);
        let mut frame = MutableFrame::new(7, desc, 50.0, FieldMode::Upper).unwrap();
        frame.image_data_mut(0)[0] = 0xAB;
        frame.audio_mut().extend_from_slice(&[1, 2, 3]);

        let frozen = frame.freeze();
        assert_eq!(frozen.tag(), 7);
        assert_eq!(frozen.field_mode(), FieldMode::Upper);
        assert_eq!(frozen.image_data(0)[0], 0xAB);
        assert_eq!(frozen.audio_data(), &[1, 2, 3]);

        // Clones share the same storage.
        let clone = frozen.clone();
        assert_eq!(clone.image_data(0).as_ptr(), frozen.image_data(0).as_ptr());
    }

    #[test]
    fn test_ycbcr_plane_sizes() {
        let desc = PixelFormatDesc::ycbcr(16, 8, 2, 2);
        let frame = MutableFrame::new(0, desc, 25.0, FieldMode::Progressive).unwrap();
        let frozen = frame.freeze();
        assert_eq!(frozen.image_data(0).len(), 16 * 8);
        assert_eq!(frozen.image_data(1).len(), 8 * 4);
    }
}
