use crate::field::FieldMode;
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Input/output level mapping applied per channel before colorimetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    pub min_input: f64,
    pub max_input: f64,
    pub gamma: f64,
    pub min_output: f64,
    pub max_output: f64,
}

impl Default for Levels {
    fn default() -> Self {
        Self {
            min_input: 0.0,
            max_input: 1.0,
            gamma: 1.0,
            min_output: 0.0,
            max_output: 1.0,
        }
    }
}

/// Affine placement plus colorimetry for one item within a frame.
///
/// Fill places the quad (translation then scale, both normalized to the
/// output), clip bounds the visible rectangle. Transforms compose with `*`:
/// translations add after scaling, scalars multiply, level ranges intersect
/// and field modes AND together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageTransform {
    pub opacity: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub fill_translation: [f64; 2],
    pub fill_scale: [f64; 2],
    pub clip_translation: [f64; 2],
    pub clip_scale: [f64; 2],
    pub levels: Levels,
    pub field_mode: FieldMode,
    pub is_key: bool,
    pub is_mix: bool,
    pub is_still: bool,
}

impl ImageTransform {
    /// The identity transform: full-frame fill and clip, neutral color,
    /// progressive.
    pub fn identity() -> Self {
        Self::default()
    }
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            fill_translation: [0.0, 0.0],
            fill_scale: [1.0, 1.0],
            clip_translation: [0.0, 0.0],
            clip_scale: [1.0, 1.0],
            levels: Levels::default(),
            field_mode: FieldMode::Progressive,
            is_key: false,
            is_mix: false,
            is_still: false,
        }
    }
}

impl Mul for ImageTransform {
    type Output = ImageTransform;

    fn mul(self, rhs: ImageTransform) -> ImageTransform {
        ImageTransform {
            opacity: self.opacity * rhs.opacity,
            brightness: self.brightness * rhs.brightness,
            contrast: self.contrast * rhs.contrast,
            saturation: self.saturation * rhs.saturation,
            fill_translation: [
                self.fill_translation[0] + rhs.fill_translation[0] * self.fill_scale[0],
                self.fill_translation[1] + rhs.fill_translation[1] * self.fill_scale[1],
            ],
            fill_scale: [
                self.fill_scale[0] * rhs.fill_scale[0],
                self.fill_scale[1] * rhs.fill_scale[1],
            ],
            clip_translation: [
                self.clip_translation[0] + rhs.clip_translation[0] * self.clip_scale[0],
                self.clip_translation[1] + rhs.clip_translation[1] * self.clip_scale[1],
            ],
            clip_scale: [
                self.clip_scale[0] * rhs.clip_scale[0],
                self.clip_scale[1] * rhs.clip_scale[1],
            ],
            levels: Levels {
                min_input: self.levels.min_input.max(rhs.levels.min_input),
                max_input: self.levels.max_input.min(rhs.levels.max_input),
                gamma: self.levels.gamma * rhs.levels.gamma,
                min_output: self.levels.min_output.max(rhs.levels.min_output),
                max_output: self.levels.max_output.min(rhs.levels.max_output),
            },
            field_mode: self.field_mode & rhs.field_mode,
            is_key: self.is_key | rhs.is_key,
            is_mix: self.is_mix | rhs.is_mix,
            is_still: self.is_still | rhs.is_still,
        }
    }
}

/// Per-frame transform as pushed by producers; the image part is what the
/// mixer composes, the audio volume rides along untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTransform {
    pub image_transform: ImageTransform,
    pub audio_volume: f64,
}

impl FrameTransform {
    pub fn new() -> Self {
        Self {
            image_transform: ImageTransform::identity(),
            audio_volume: 1.0,
        }
    }
}

impl Default for FrameTransform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_neutral() {
        let t = ImageTransform::identity();
        let mut other = ImageTransform::identity();
        other.fill_translation = [0.25, 0.5];
        other.fill_scale = [0.5, 0.5];
        other.opacity = 0.5;
        let product = t * other;
        assert_eq!(product, other);
    }

    #[test]
    fn test_translation_adds_after_scaling() {
        let mut outer = ImageTransform::identity();
        outer.fill_translation = [0.1, 0.2];
        outer.fill_scale = [0.5, 0.5];
        let mut inner = ImageTransform::identity();
        inner.fill_translation = [0.2, 0.4];

        let product = outer * inner;
        assert!((product.fill_translation[0] - 0.2).abs() < 1e-9);
        assert!((product.fill_translation[1] - 0.4).abs() < 1e-9);
        assert!((product.fill_scale[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_scalars_multiply() {
        let mut a = ImageTransform::identity();
        a.opacity = 0.5;
        a.brightness = 2.0;
        let mut b = ImageTransform::identity();
        b.opacity = 0.5;
        b.saturation = 0.0;

        let product = a * b;
        assert!((product.opacity - 0.25).abs() < 1e-9);
        assert!((product.brightness - 2.0).abs() < 1e-9);
        assert!((product.saturation - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_field_modes_and_together() {
        let mut a = ImageTransform::identity();
        a.field_mode = FieldMode::Upper;
        let mut b = ImageTransform::identity();
        b.field_mode = FieldMode::Lower;
        assert_eq!((a * b).field_mode, FieldMode::Empty);

        b.field_mode = FieldMode::Progressive;
        assert_eq!((a * b).field_mode, FieldMode::Upper);
    }

    #[test]
    fn test_flags_accumulate() {
        let mut a = ImageTransform::identity();
        a.is_key = true;
        let mut b = ImageTransform::identity();
        b.is_still = true;
        let product = a * b;
        assert!(product.is_key);
        assert!(product.is_still);
        assert!(!product.is_mix);
    }

    #[test]
    fn test_level_ranges_intersect() {
        let mut a = ImageTransform::identity();
        a.levels.min_input = 0.1;
        a.levels.max_input = 0.9;
        let mut b = ImageTransform::identity();
        b.levels.min_input = 0.2;
        b.levels.max_input = 0.95;
        b.levels.gamma = 2.0;

        let product = a * b;
        assert!((product.levels.min_input - 0.2).abs() < 1e-9);
        assert!((product.levels.max_input - 0.9).abs() < 1e-9);
        assert!((product.levels.gamma - 2.0).abs() < 1e-9);
    }
}
