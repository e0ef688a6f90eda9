//! Floating-point unit: register format tracking, arithmetic and conversion.
//!
//! Every floating-point general register carries a format tag. Reads and writes go
//! through [`value_fpr`] and [`store_fpr`], which keep the tag consistent and poison
//! the register with a quiet NaN once it has been viewed through a conflicting format.

/// Directed and nearest-even format conversion.
pub mod convert;
/// Predicates and arithmetic over tagged operands.
pub mod ops;
/// Tag-checked register access and coprocessor load/store helpers.
pub mod registers;

pub use convert::convert;
pub use ops::{abs, add, div, equal, infinity, less, mul, nan, neg, recip, sqrt, sub};
pub use registers::{cop_ld, cop_lw, cop_sd, cop_sw, store_fpr, value_fpr};

use crate::SimFault;

/// Quiet NaN returned when a single-precision value is read from a poisoned register.
pub const QNAN_SINGLE: u64 = 0x7FBF_FFFF;
/// Quiet NaN returned when a 32-bit fixed-point value is read from a poisoned register.
pub const QNAN_WORD: u64 = 0x7FFF_FFFF;
/// Quiet NaN returned when a double-precision value is read from a poisoned register.
pub const QNAN_DOUBLE: u64 = 0x7FF7_FFFF_FFFF_FFFF;
/// Quiet NaN returned when a 64-bit fixed-point value is read from a poisoned register.
pub const QNAN_LONG: u64 = 0x7FFF_FFFF_FFFF_FFFF;

/// Single-precision positive infinity.
pub const INFINITY_SINGLE: u64 = 0x7F80_0000;
/// Double-precision positive infinity.
pub const INFINITY_DOUBLE: u64 = 0x7FF0_0000_0000_0000;

/// Filler placed in the upper half of a 64-bit register holding a 32-bit value.
pub const UPPER_HALF_POISON: u64 = 0xDEAD_C0DE << 32;

/// Interpretation currently attached to a floating-point register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FpFormat {
    /// Raw bits with no interpretation yet. The first typed access adopts its format.
    #[default]
    Uninterpreted,
    /// Poisoned by conflicting accesses. Typed reads return a quiet NaN.
    Unknown,
    /// IEEE-754 binary32.
    Single,
    /// IEEE-754 binary64.
    Double,
    /// 32-bit two's-complement integer.
    Word,
    /// 64-bit two's-complement integer.
    Long,
    /// Store request for 32 raw bits. Recorded as [`FpFormat::Uninterpreted`].
    Uninterpreted32,
    /// Store request for 64 raw bits. Recorded as [`FpFormat::Uninterpreted`].
    Uninterpreted64,
}

impl FpFormat {
    /// Returns `true` for the 32-bit formats.
    #[must_use]
    pub const fn is_narrow(self) -> bool {
        matches!(self, Self::Single | Self::Word | Self::Uninterpreted32)
    }

    /// Quiet NaN pattern for a typed format.
    ///
    /// # Errors
    ///
    /// Returns [`SimFault::UnsupportedFormat`] for the untyped formats.
    pub const fn quiet_nan(self) -> Result<u64, SimFault> {
        match self {
            Self::Single => Ok(QNAN_SINGLE),
            Self::Double => Ok(QNAN_DOUBLE),
            Self::Word => Ok(QNAN_WORD),
            Self::Long => Ok(QNAN_LONG),
            Self::Uninterpreted
            | Self::Unknown
            | Self::Uninterpreted32
            | Self::Uninterpreted64 => Err(SimFault::UnsupportedFormat {
                operation: "quiet NaN",
                format: self,
            }),
        }
    }
}

/// IEEE-754 rounding modes, numbered as in the `FCSR.RM` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum RoundingMode {
    /// Round to nearest, ties to even.
    #[default]
    Nearest = 0,
    /// Round toward zero.
    ToZero = 1,
    /// Round toward positive infinity.
    ToPositiveInfinity = 2,
    /// Round toward negative infinity.
    ToNegativeInfinity = 3,
}

impl RoundingMode {
    /// Rounding mode currently selected by `FCR31`.
    #[must_use]
    pub const fn from_fcr31(fcr31: u32) -> Self {
        match fcr31 & 0x3 {
            0 => Self::Nearest,
            1 => Self::ToZero,
            2 => Self::ToPositiveInfinity,
            _ => Self::ToNegativeInfinity,
        }
    }
}
