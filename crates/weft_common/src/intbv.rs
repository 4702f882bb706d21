//! Bounded integers with a fixed bit width, the storage type of bit-vector signals.
//!
//! An [`IntBv`] is an integer value constrained to a half-open range
//! `[min, max)`. The bit width follows from the bounds: unsigned ranges need
//! `bitlen(max - 1)` bits, ranges with a negative minimum need one extra sign
//! bit. Every assignment re-checks the bounds and fails rather than wrapping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Largest supported bit width. Values are stored in an `i128`, and both the
/// unsigned and signed ranges of this width must be representable.
pub const MAX_WIDTH: u32 = 126;

/// Errors produced when constructing or assigning bounded integers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitsError {
    /// The value is smaller than the inclusive lower bound.
    #[error("value {value} is below the minimum {min}")]
    BelowMin {
        /// The rejected value.
        value: i128,
        /// The inclusive lower bound.
        min: i128,
    },

    /// The value is not smaller than the exclusive upper bound.
    #[error("value {value} is not below the exclusive maximum {max}")]
    AboveMax {
        /// The rejected value.
        value: i128,
        /// The exclusive upper bound.
        max: i128,
    },

    /// The bounds describe an empty range.
    #[error("empty range [{min}, {max})")]
    EmptyRange {
        /// The inclusive lower bound.
        min: i128,
        /// The exclusive upper bound.
        max: i128,
    },

    /// A width of zero, or one wider than [`MAX_WIDTH`].
    #[error("invalid bit width {width} (expected 1..={max})", max = MAX_WIDTH)]
    InvalidWidth {
        /// The requested width.
        width: u32,
    },

    /// A binary literal contained something other than `0`, `1` and `_`.
    #[error("invalid binary literal '{0}'")]
    InvalidBinary(String),

    /// A bit range that is empty, reversed, or reaches past the vector.
    #[error("invalid bit range [{high}:{low}] for a {width}-bit vector")]
    InvalidRange {
        /// Exclusive upper bit position.
        high: u32,
        /// Inclusive lower bit position.
        low: u32,
        /// Width of the vector being sliced (`0` for unsized).
        width: u32,
    },

    /// The operation needs a vector with a known width.
    #[error("operation requires a sized bit-vector")]
    Unsized,
}

/// A bounded integer with an optional `[min, max)` range and derived bit width.
///
/// Equality and hashing consider only the numeric value, so two vectors with
/// different bounds but the same value compare equal.
#[derive(Clone, Serialize, Deserialize)]
pub struct IntBv {
    value: i128,
    min: Option<i128>,
    max: Option<i128>,
    /// Bit width, `0` when either bound is missing.
    width: u32,
}

impl IntBv {
    /// Creates an unbounded, unsized integer.
    pub fn new(value: i128) -> Self {
        Self {
            value,
            min: None,
            max: None,
            width: 0,
        }
    }

    /// Creates an integer constrained to `[min, max)`.
    ///
    /// The width is only known when both bounds are given.
    pub fn bounded(value: i128, min: Option<i128>, max: Option<i128>) -> Result<Self, BitsError> {
        let limit = 1i128 << MAX_WIDTH;
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo >= hi {
                return Err(BitsError::EmptyRange { min: lo, max: hi });
            }
        }
        if max.is_some_and(|m| m > limit) || min.is_some_and(|m| m < -limit) {
            return Err(BitsError::InvalidWidth {
                width: MAX_WIDTH + 1,
            });
        }
        let width = width_for_bounds(min, max);
        if width > MAX_WIDTH {
            return Err(BitsError::InvalidWidth { width });
        }
        let bv = Self {
            value,
            min,
            max,
            width,
        };
        bv.check(value)?;
        Ok(bv)
    }

    /// Creates an unsigned vector of the given width: `[0, 2^width)`.
    pub fn unsigned(value: i128, width: u32) -> Result<Self, BitsError> {
        check_width(width)?;
        Self::bounded(value, Some(0), Some(1i128 << width))
    }

    /// Creates a two's-complement signed vector: `[-2^(width-1), 2^(width-1))`.
    pub fn signed(value: i128, width: u32) -> Result<Self, BitsError> {
        check_width(width)?;
        let half = 1i128 << (width - 1);
        Self::bounded(value, Some(-half), Some(half))
    }

    /// Creates a single-bit unsigned vector from a boolean.
    pub fn from_bool(value: bool) -> Self {
        Self {
            value: i128::from(value),
            min: Some(0),
            max: Some(2),
            width: 1,
        }
    }

    /// Parses a binary literal such as `"1010_0101"` into an unsigned vector
    /// whose width is the number of digits.
    pub fn from_binary_str(s: &str) -> Result<Self, BitsError> {
        let digits: String = s.chars().filter(|&c| c != '_').collect();
        if digits.is_empty() || !digits.chars().all(|c| c == '0' || c == '1') {
            return Err(BitsError::InvalidBinary(s.to_string()));
        }
        let width = digits.len() as u32;
        check_width(width)?;
        let raw =
            u128::from_str_radix(&digits, 2).map_err(|_| BitsError::InvalidBinary(s.to_string()))?;
        Self::unsigned(raw as i128, width)
    }

    /// Returns the numeric value.
    pub fn value(&self) -> i128 {
        self.value
    }

    /// Returns the inclusive lower bound, if any.
    pub fn min(&self) -> Option<i128> {
        self.min
    }

    /// Returns the exclusive upper bound, if any.
    pub fn max(&self) -> Option<i128> {
        self.max
    }

    /// Returns the bit width, or `0` for an unsized integer.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns `true` if the lower bound is negative.
    pub fn is_signed(&self) -> bool {
        self.min.is_some_and(|m| m < 0)
    }

    /// Checks a candidate value against this vector's bounds.
    pub fn check(&self, value: i128) -> Result<(), BitsError> {
        if let Some(min) = self.min {
            if value < min {
                return Err(BitsError::BelowMin { value, min });
            }
        }
        if let Some(max) = self.max {
            if value >= max {
                return Err(BitsError::AboveMax { value, max });
            }
        }
        Ok(())
    }

    /// Returns the two's-complement bit at `index`.
    pub fn bit(&self, index: u32) -> bool {
        if index >= 127 {
            return self.value < 0;
        }
        (self.value >> index) & 1 == 1
    }

    /// Returns the two's-complement bit pattern, truncated to the width when sized.
    pub fn bits(&self) -> u128 {
        if self.width == 0 {
            self.value as u128
        } else {
            (self.value as u128) & mask(self.width)
        }
    }

    /// Extracts bits `[high-1 .. low]` as an unsigned vector of width `high - low`.
    pub fn slice(&self, high: u32, low: u32) -> Result<Self, BitsError> {
        let limit = if self.width == 0 { 127 } else { self.width };
        if high <= low || high > limit || high - low > MAX_WIDTH {
            return Err(BitsError::InvalidRange {
                high,
                low,
                width: self.width,
            });
        }
        let width = high - low;
        let raw = ((self.value >> low) as u128) & mask(width);
        Self::unsigned(raw as i128, width)
    }

    /// Extracts bits `[high-1 .. low]` and reinterprets them as two's complement.
    pub fn signed_slice(&self, high: u32, low: u32) -> Result<Self, BitsError> {
        let raw = self.slice(high, low)?;
        let width = raw.width;
        let value = if raw.bit(width - 1) {
            raw.value - (1i128 << width)
        } else {
            raw.value
        };
        Self::signed(value, width)
    }

    /// Returns the bit-reversed pattern as an unsigned vector of the same width.
    pub fn reversed(&self) -> Result<Self, BitsError> {
        if self.width == 0 {
            return Err(BitsError::Unsized);
        }
        let bits = self.bits();
        let mut out = 0u128;
        for i in 0..self.width {
            if (bits >> i) & 1 == 1 {
                out |= 1 << (self.width - 1 - i);
            }
        }
        Self::unsigned(out as i128, self.width)
    }

    /// Formats the bit pattern MSB first, padded to the width when sized.
    pub fn to_binary_string(&self) -> String {
        if self.width == 0 {
            if self.value < 0 {
                format!("-{:b}", self.value.unsigned_abs())
            } else {
                format!("{:b}", self.value)
            }
        } else {
            format!("{:0w$b}", self.bits(), w = self.width as usize)
        }
    }
}

impl PartialEq for IntBv {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for IntBv {}

impl Hash for IntBv {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Display for IntBv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl fmt::Debug for IntBv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width == 0 {
            write!(f, "IntBv({})", self.value)
        } else {
            write!(f, "IntBv({}, width={})", self.value, self.width)
        }
    }
}

/// Mask with the low `width` bits set; `width` must be at most 127.
fn mask(width: u32) -> u128 {
    (1u128 << width) - 1
}

fn check_width(width: u32) -> Result<(), BitsError> {
    if width == 0 || width > MAX_WIDTH {
        return Err(BitsError::InvalidWidth { width });
    }
    Ok(())
}

/// Number of significant bits in a non-negative value.
fn bit_length(v: i128) -> u32 {
    128 - v.leading_zeros()
}

fn width_for_bounds(min: Option<i128>, max: Option<i128>) -> u32 {
    match (min, max) {
        (Some(min), Some(max)) if min >= 0 => bit_length(max - 1).max(1),
        (Some(min), Some(max)) => 1 + bit_length((max - 1).max(0)).max(bit_length(-min - 1)),
        _ => 0,
    }
}
