use serde::{Deserialize, Serialize};
use std::fmt;

/// Blend mode applied when compositing a layer (or an item in the fast
/// path) onto the surface below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    /// Standard alpha blending (Porter-Duff "over").
    Normal,
    Lighten,
    Darken,
    Multiply,
    Screen,
    Overlay,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    ColorDodge,
    ColorBurn,
    Add,
    Subtract,
    Contrast,
}

impl Default for BlendMode {
    fn default() -> Self {
        BlendMode::Normal
    }
}

impl BlendMode {
    /// Stable numeric id, used to select the blend branch in the fragment
    /// program.
    pub fn as_u32(self) -> u32 {
        use BlendMode::*;
        match self {
            Normal => 0,
            Lighten => 1,
            Darken => 2,
            Multiply => 3,
            Screen => 4,
            Overlay => 5,
            HardLight => 6,
            SoftLight => 7,
            Difference => 8,
            Exclusion => 9,
            ColorDodge => 10,
            ColorBurn => 11,
            Add => 12,
            Subtract => 13,
            Contrast => 14,
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BlendMode::*;
        let name = match self {
            Normal => "normal",
            Lighten => "lighten",
            Darken => "darken",
            Multiply => "multiply",
            Screen => "screen",
            Overlay => "overlay",
            HardLight => "hard_light",
            SoftLight => "soft_light",
            Difference => "difference",
            Exclusion => "exclusion",
            ColorDodge => "color_dodge",
            ColorBurn => "color_burn",
            Add => "add",
            Subtract => "subtract",
            Contrast => "contrast",
        };
        write!(f, "{}", name)
    }
}

/// How a source is gated by an external single-channel mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyer {
    /// Multiply the source by the key before blending over the destination.
    Linear,
    /// Add the gated source to the destination, saturating.
    Additive,
}

impl Default for Keyer {
    fn default() -> Self {
        Keyer::Linear
    }
}
