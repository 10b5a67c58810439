use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr};

/// Which scanline parity an image contributes to.
///
/// The two field bits compose with bitwise AND/OR: `Progressive` carries both
/// fields, `Empty` carries neither. Masking an item's field mode against a
/// render pass narrows it to the scanlines that pass rasterizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldMode {
    Empty,
    Lower,
    Upper,
    Progressive,
}

impl FieldMode {
    /// The raw 2-bit representation (`lower = 1`, `upper = 2`).
    pub fn bits(self) -> u8 {
        match self {
            FieldMode::Empty => 0,
            FieldMode::Lower => 1,
            FieldMode::Upper => 2,
            FieldMode::Progressive => 3,
        }
    }

    /// Rebuild a field mode from its 2-bit representation.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            1 => FieldMode::Lower,
            2 => FieldMode::Upper,
            3 => FieldMode::Progressive,
            _ => FieldMode::Empty,
        }
    }

    /// True for a single-field mode (`Lower` or `Upper`).
    pub fn is_interlaced(self) -> bool {
        matches!(self, FieldMode::Lower | FieldMode::Upper)
    }
}

impl Default for FieldMode {
    fn default() -> Self {
        FieldMode::Progressive
    }
}

impl BitAnd for FieldMode {
    type Output = FieldMode;
    fn bitand(self, rhs: FieldMode) -> FieldMode {
        FieldMode::from_bits(self.bits() & rhs.bits())
    }
}

impl BitAndAssign for FieldMode {
    fn bitand_assign(&mut self, rhs: FieldMode) {
        *self = *self & rhs;
    }
}

impl BitOr for FieldMode {
    type Output = FieldMode;
    fn bitor(self, rhs: FieldMode) -> FieldMode {
        FieldMode::from_bits(self.bits() | rhs.bits())
    }
}

impl fmt::Display for FieldMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldMode::Empty => write!(f, "empty"),
            FieldMode::Lower => write!(f, "lower"),
            FieldMode::Upper => write!(f, "upper"),
            FieldMode::Progressive => write!(f, "progressive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_mode_bits_roundtrip() {
        for mode in [
            FieldMode::Empty,
            FieldMode::Lower,
            FieldMode::Upper,
            FieldMode::Progressive,
        ] {
            assert_eq!(FieldMode::from_bits(mode.bits()), mode);
        }
    }

    #[test]
    fn test_field_mode_and() {
        assert_eq!(FieldMode::Progressive & FieldMode::Upper, FieldMode::Upper);
        assert_eq!(FieldMode::Progressive & FieldMode::Lower, FieldMode::Lower);
        assert_eq!(FieldMode::Upper & FieldMode::Lower, FieldMode::Empty);
        assert_eq!(FieldMode::Empty & FieldMode::Progressive, FieldMode::Empty);
    }

    #[test]
    fn test_field_mode_or() {
        assert_eq!(FieldMode::Upper | FieldMode::Lower, FieldMode::Progressive);
        assert_eq!(FieldMode::Empty | FieldMode::Upper, FieldMode::Upper);
    }

    #[test]
    fn test_field_mode_and_assign() {
        let mut mode = FieldMode::Progressive;
        mode &= FieldMode::Upper;
        assert_eq!(mode, FieldMode::Upper);
    }

    #[test]
    fn test_field_mode_display() {
        assert_eq!(format!("{}", FieldMode::Progressive), "progressive");
        assert_eq!(format!("{}", FieldMode::Empty), "empty");
    }
}
