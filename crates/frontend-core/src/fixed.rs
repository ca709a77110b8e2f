use core::fmt;
use core::ops::{Add, Mul, Neg, Sub};

use crate::round::{convergent_round, truncate};

/// Fixed-point number format. Raw values are two's-complement integers
/// scaled by `2^-f_width`; the total width is `signed + i_width + f_width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QFormat {
    pub i_width: u32,
    pub f_width: u32,
    pub signed: bool,
}

impl QFormat {
    pub const fn new(i_width: u32, f_width: u32, signed: bool) -> Self {
        Self { i_width, f_width, signed }
    }

    /// Signed format with `i_width` integer and `f_width` fractional bits (sign bit excluded)
    pub const fn sq(i_width: u32, f_width: u32) -> Self {
        Self::new(i_width, f_width, true)
    }

    pub const fn uq(i_width: u32, f_width: u32) -> Self {
        Self::new(i_width, f_width, false)
    }

    /// Signed integer format that is `width` bits wide in total
    pub const fn signed_int(width: u32) -> Self {
        Self::sq(width.saturating_sub(1), 0)
    }

    /// Format of a `width`-bit register holding `f_width` fractional bits.
    /// The integer width is whatever is left, but never negative.
    pub fn from_width(width: u32, f_width: u32, signed: bool) -> Self {
        let i_width = width.saturating_sub(signed as u32 + f_width);
        Self::new(i_width, f_width, signed)
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.signed as u32 + self.i_width + self.f_width
    }

    pub fn min_raw(&self) -> i64 {
        if self.signed { -(1i64 << (self.width() - 1)) } else { 0 }
    }

    pub fn max_raw(&self) -> i64 {
        if self.signed {
            (1i64 << (self.width() - 1)) - 1
        } else {
            (1i64 << self.width()) - 1
        }
    }

    /// Two's-complement wrap of `raw` to this format's width
    #[inline]
    pub fn wrap(&self, raw: i64) -> i64 {
        wrap_to_width(raw, self.width(), self.signed)
    }

    #[inline]
    pub fn saturate(&self, raw: i64) -> i64 {
        raw.clamp(self.min_raw(), self.max_raw())
    }

    pub fn contains(&self, raw: i64) -> bool {
        raw >= self.min_raw() && raw <= self.max_raw()
    }

    /// Result format of an exact addition or subtraction
    pub fn add_format(&self, other: &QFormat) -> QFormat {
        QFormat {
            i_width: self.i_width.max(other.i_width) + 1,
            f_width: self.f_width.max(other.f_width),
            signed: self.signed | other.signed,
        }
    }

    /// Result format of an exact multiplication
    pub fn mul_format(&self, other: &QFormat) -> QFormat {
        let signed = self.signed | other.signed;
        let f_width = self.f_width + other.f_width;
        let width = self.width() + other.width();
        QFormat::from_width(width, f_width, signed)
    }

    pub fn to_f64(&self, raw: i64) -> f64 {
        raw as f64 / (1u64 << self.f_width) as f64
    }

    /// Nearest raw value (ties to even), saturated to the format's range
    pub fn from_f64(&self, value: f64) -> i64 {
        let scaled = (value * (1u64 << self.f_width) as f64).round_ties_even();
        self.saturate(scaled as i64)
    }
}

impl fmt::Display for QFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.signed { "SQ" } else { "UQ" };
        write!(f, "{}({}.{})", prefix, self.i_width, self.f_width)
    }
}

#[inline]
pub fn wrap_to_width(raw: i64, width: u32, signed: bool) -> i64 {
    if width >= 64 {
        return raw;
    }
    if width == 0 {
        return 0;
    }
    if signed {
        let s = 64 - width;
        (raw << s) >> s
    } else {
        raw & ((1i64 << width) - 1)
    }
}

/// A raw value tagged with its format.
/// Arithmetic is exact: the result format grows to hold every possible result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixed {
    raw: i64,
    fmt: QFormat,
}

impl Fixed {
    /// Wraps `raw` into `fmt`
    pub fn new(raw: i64, fmt: QFormat) -> Self {
        Self { raw: fmt.wrap(raw), fmt }
    }

    pub fn from_f64(value: f64, fmt: QFormat) -> Self {
        Self { raw: fmt.from_f64(value), fmt }
    }

    #[inline]
    pub fn raw(&self) -> i64 {
        self.raw
    }

    #[inline]
    pub fn fmt(&self) -> QFormat {
        self.fmt
    }

    pub fn to_f64(&self) -> f64 {
        self.fmt.to_f64(self.raw)
    }

    /// Changes the number of fractional bits. Extends with zeros, or drops
    /// bits with convergent rounding. Rounding up may carry past the integer
    /// range; `requantize` wraps that away.
    pub fn round_to(self, f_width: u32) -> Fixed {
        let cur = self.fmt.f_width;
        let raw = if f_width >= cur {
            self.raw << (f_width - cur)
        } else {
            convergent_round(self.raw, cur - f_width)
        };
        Fixed { raw, fmt: QFormat { f_width, ..self.fmt } }
    }

    /// Changes the number of fractional bits, dropping bits by flooring
    pub fn truncate_to(self, f_width: u32) -> Fixed {
        let cur = self.fmt.f_width;
        let raw = if f_width >= cur {
            self.raw << (f_width - cur)
        } else {
            truncate(self.raw, cur - f_width)
        };
        Fixed { raw, fmt: QFormat { f_width, ..self.fmt } }
    }

    /// Rounds the fraction then wraps the integer part into `fmt`
    pub fn requantize(self, fmt: QFormat) -> Fixed {
        let rounded = self.round_to(fmt.f_width);
        Fixed::new(rounded.raw, fmt)
    }

    /// Rounds the fraction then clamps into `fmt`
    pub fn saturate_to(self, fmt: QFormat) -> Fixed {
        let rounded = self.round_to(fmt.f_width);
        Fixed { raw: fmt.saturate(rounded.raw), fmt }
    }

    fn aligned(self, f_width: u32) -> i64 {
        self.raw << (f_width - self.fmt.f_width)
    }
}

impl Add for Fixed {
    type Output = Fixed;
    fn add(self, rhs: Fixed) -> Fixed {
        let fmt = self.fmt.add_format(&rhs.fmt);
        Fixed { raw: self.aligned(fmt.f_width) + rhs.aligned(fmt.f_width), fmt }
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    fn sub(self, rhs: Fixed) -> Fixed {
        let mut fmt = self.fmt.add_format(&rhs.fmt);
        fmt.signed = true;
        Fixed { raw: self.aligned(fmt.f_width) - rhs.aligned(fmt.f_width), fmt }
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    fn mul(self, rhs: Fixed) -> Fixed {
        Fixed { raw: self.raw * rhs.raw, fmt: self.fmt.mul_format(&rhs.fmt) }
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    fn neg(self) -> Fixed {
        let fmt = QFormat { i_width: self.fmt.i_width + 1, signed: true, ..self.fmt };
        Fixed { raw: -self.raw, fmt }
    }
}

/// Number of bits needed to represent `n` in two's complement (sign bit
/// only counted for negative values). Zero needs one bit.
pub fn bits_for(n: i64) -> u32 {
    if n < 0 {
        bit_length((-(n + 1)) as u64) + 1
    } else {
        bit_length(n as u64).max(1)
    }
}

#[inline]
fn bit_length(n: u64) -> u32 {
    64 - n.leading_zeros()
}

/// Smallest `k` with `2^k >= n`
pub fn ceil_log2(n: u64) -> u32 {
    if n <= 1 { 0 } else { bit_length(n - 1) }
}

/// `log2(n)` if `n` is a power of two
pub fn exact_log2(n: u64) -> Option<u32> {
    if n.is_power_of_two() { Some(n.trailing_zeros()) } else { None }
}
