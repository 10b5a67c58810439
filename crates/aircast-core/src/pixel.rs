use crate::error::{AircastError, AircastResult};
use serde::{Deserialize, Serialize};

/// Pixel layout of a source frame.
///
/// Packed variants carry a single interleaved 4-channel plane; the YCbCr
/// variants carry one plane per component with optional chroma subsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Bgra,
    Rgba,
    Argb,
    Abgr,
    Ycbcr,
    Ycbcra,
    Invalid,
}

impl PixelFormat {
    /// True for the interleaved 4-channel variants.
    pub fn is_packed(self) -> bool {
        matches!(
            self,
            PixelFormat::Bgra | PixelFormat::Rgba | PixelFormat::Argb | PixelFormat::Abgr
        )
    }

    /// Whether the format carries an alpha channel.
    pub fn has_alpha(self) -> bool {
        match self {
            PixelFormat::Ycbcr | PixelFormat::Invalid => false,
            _ => true,
        }
    }

    /// Number of planes this format is declared with.
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::Ycbcr => 3,
            PixelFormat::Ycbcra => 4,
            PixelFormat::Invalid => 0,
            _ => 1,
        }
    }
}

/// Geometry of one image plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plane {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Interleaved channels per pixel.
    pub channels: usize,
    /// Row stride in bytes. At least `width * channels`; extra bytes are
    /// padding.
    pub stride: usize,
}

impl Plane {
    /// Create a plane with a tight stride.
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            stride: width * channels,
        }
    }

    /// Create a plane with an explicit (padded) stride.
    pub fn with_stride(width: usize, height: usize, channels: usize, stride: usize) -> Self {
        Self {
            width,
            height,
            channels,
            stride,
        }
    }

    /// Total byte size of the plane including padding.
    pub fn size(&self) -> usize {
        self.stride * self.height
    }
}

/// Pixel format plus the geometry of every plane of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelFormatDesc {
    pub format: PixelFormat,
    pub planes: Vec<Plane>,
}

impl PixelFormatDesc {
    /// An empty descriptor for the given format; planes are pushed by the
    /// caller.
    pub fn new(format: PixelFormat) -> Self {
        Self {
            format,
            planes: Vec::new(),
        }
    }

    /// Descriptor for a packed 4-channel frame.
    pub fn packed(format: PixelFormat, width: usize, height: usize) -> Self {
        Self {
            format,
            planes: vec![Plane::new(width, height, 4)],
        }
    }

    /// Descriptor for a planar YCbCr frame with the given chroma subsampling
    /// ratios (1 = 4:4:4, 2 = 4:2:2 / 4:2:0, 4 = 4:1:1).
    pub fn ycbcr(width: usize, height: usize, x_ratio: usize, y_ratio: usize) -> Self {
        let chroma = Plane::new(width / x_ratio, height / y_ratio, 1);
        Self {
            format: PixelFormat::Ycbcr,
            planes: vec![Plane::new(width, height, 1), chroma, chroma],
        }
    }

    /// Descriptor for a planar YCbCr frame with an alpha plane.
    pub fn ycbcra(width: usize, height: usize, x_ratio: usize, y_ratio: usize) -> Self {
        let mut desc = Self::ycbcr(width, height, x_ratio, y_ratio);
        desc.format = PixelFormat::Ycbcra;
        desc.planes.push(Plane::new(width, height, 1));
        desc
    }

    /// Check the plane-geometry invariants for this format.
    pub fn validate(&self) -> AircastResult<()> {
        if self.format == PixelFormat::Invalid {
            return Err(AircastError::InvalidFrame("invalid pixel format".into()));
        }
        if self.planes.is_empty() {
            return Err(AircastError::InvalidFrame("no planes".into()));
        }
        if self.planes.len() != self.format.plane_count() {
            return Err(AircastError::InvalidFrame(format!(
                "expected {} planes, got {}",
                self.format.plane_count(),
                self.planes.len()
            )));
        }
        for plane in &self.planes {
            if plane.width == 0 || plane.height == 0 {
                return Err(AircastError::InvalidFrame("zero-sized plane".into()));
            }
            if plane.stride < plane.width * plane.channels {
                return Err(AircastError::InvalidFrame("stride below row size".into()));
            }
        }
        if self.format.is_packed() {
            if self.planes[0].channels != 4 {
                return Err(AircastError::InvalidFrame(
                    "packed formats require a 4-channel plane".into(),
                ));
            }
            return Ok(());
        }
        // Planar: every plane is single-channel and the chroma subsampling
        // ratios must be powers of two no greater than 4.
        if self.planes.iter().any(|p| p.channels != 1) {
            return Err(AircastError::InvalidFrame(
                "planar formats require single-channel planes".into(),
            ));
        }
        let (x_ratio, y_ratio) = self.subsampling();
        for ratio in [x_ratio, y_ratio] {
            if ratio == 0 || ratio > 4 || !ratio.is_power_of_two() {
                return Err(AircastError::InvalidFrame(format!(
                    "unsupported chroma subsampling ratio {}",
                    ratio
                )));
            }
        }
        if self.planes[1] != self.planes[2] {
            return Err(AircastError::InvalidFrame(
                "chroma planes must have equal geometry".into(),
            ));
        }
        if self.format == PixelFormat::Ycbcra
            && (self.planes[3].width != self.planes[0].width
                || self.planes[3].height != self.planes[0].height)
        {
            return Err(AircastError::InvalidFrame(
                "alpha plane must match the luma plane".into(),
            ));
        }
        Ok(())
    }

    /// Chroma subsampling ratios (x, y) of a planar descriptor.
    pub fn subsampling(&self) -> (usize, usize) {
        if self.planes.len() < 2 || self.planes[1].width == 0 || self.planes[1].height == 0 {
            return (1, 1);
        }
        (
            self.planes[0].width / self.planes[1].width,
            self.planes[0].height / self.planes[1].height,
        )
    }

    /// 32-bit key identifying the fragment program this frame needs.
    ///
    /// Planar formats: bits 0-10 width, 11-21 height, 22-24 y-ratio,
    /// 25-27 x-ratio, bit 30 alpha, bit 31 set. Packed formats: bits 0-14
    /// height, 15-29 width, bit 30 alpha, bit 31 clear.
    pub fn program_key(&self) -> u32 {
        if self.planes.is_empty() {
            return 0;
        }
        let plane0 = &self.planes[0];
        match self.format {
            PixelFormat::Ycbcr | PixelFormat::Ycbcra => {
                let (x_ratio, y_ratio) = self.subsampling();
                let mut key = (plane0.width as u32 & 0x7FF)
                    | ((plane0.height as u32 & 0x7FF) << 11)
                    | ((y_ratio as u32 & 0x7) << 22)
                    | ((x_ratio as u32 & 0x7) << 25)
                    | (1 << 31);
                if self.format.has_alpha() {
                    key |= 1 << 30;
                }
                key
            }
            PixelFormat::Invalid => 0,
            _ => {
                (plane0.height as u32 & 0x7FFF)
                    | ((plane0.width as u32 & 0x7FFF) << 15)
                    | (1 << 30)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_descriptor_valid() {
        let desc = PixelFormatDesc::packed(PixelFormat::Bgra, 1920, 1080);
        assert!(desc.validate().is_ok());
        assert_eq!(desc.planes.len(), 1);
        assert_eq!(desc.planes[0].stride, 1920 * 4);
    }

    #[test]
    fn test_invalid_format_rejected() {
        let desc = PixelFormatDesc::packed(PixelFormat::Invalid, 16, 16);
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_empty_planes_rejected() {
        let desc = PixelFormatDesc::new(PixelFormat::Bgra);
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_ycbcr_subsampling() {
        let desc = PixelFormatDesc::ycbcr(1920, 1080, 2, 2);
        assert!(desc.validate().is_ok());
        assert_eq!(desc.subsampling(), (2, 2));
        assert_eq!(desc.planes[1].width, 960);
    }

    #[test]
    fn test_ycbcr_bad_ratio_rejected() {
        let mut desc = PixelFormatDesc::ycbcr(1920, 1080, 2, 2);
        desc.planes[1] = Plane::new(640, 540, 1);
        desc.planes[2] = desc.planes[1];
        // 1920 / 640 = 3, not a power of two
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_program_key_packed_layout() {
        let desc = PixelFormatDesc::packed(PixelFormat::Bgra, 1920, 1080);
        let key = desc.program_key();
        assert_eq!(key & 0x7FFF, 1080);
        assert_eq!((key >> 15) & 0x7FFF, 1920);
        assert_eq!((key >> 30) & 1, 1);
        assert_eq!(key >> 31, 0);
    }

    #[test]
    fn test_program_key_planar_layout() {
        let desc = PixelFormatDesc::ycbcra(720, 576, 2, 1);
        let key = desc.program_key();
        assert_eq!(key & 0x7FF, 720);
        assert_eq!((key >> 11) & 0x7FF, 576);
        assert_eq!((key >> 22) & 0x7, 1); // y-ratio
        assert_eq!((key >> 25) & 0x7, 2); // x-ratio
        assert_eq!((key >> 30) & 1, 1); // alpha
        assert_eq!(key >> 31, 1);
    }

    #[test]
    fn test_program_key_differs_by_alpha() {
        let a = PixelFormatDesc::ycbcr(720, 576, 2, 2).program_key();
        let b = PixelFormatDesc::ycbcra(720, 576, 2, 2).program_key();
        assert_ne!(a, b);
    }
}
