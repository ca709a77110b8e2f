use num::rational::Ratio;
use num::{Signed, Zero};

use frontend_core::{BuildErr, QFormat, bits_for, ceil_log2, exact_log2};

/// Filter coefficient, an exact rational with a power-of-two denominator
pub type Coeff = Ratio<i64>;

/// Ordered coefficient vector, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taps {
    values: Vec<Coeff>,
}

impl Taps {
    pub fn new(values: Vec<Coeff>) -> Result<Self, BuildErr> {
        frontend_core::expect_param!(values.len(), !values.is_empty(), "taps")?;
        for (index, v) in values.iter().enumerate() {
            if exact_log2(*v.denom() as u64).is_none() {
                return Err(BuildErr::NotDyadic { index });
            }
        }
        Ok(Self { values })
    }

    /// Taps given as integer numerators over a common denominator
    pub fn from_ints(numerators: &[i64], denominator: i64) -> Result<Self, BuildErr> {
        frontend_core::expect_param!(denominator, denominator > 0)?;
        Self::new(numerators.iter().map(|&n| Ratio::new(n, denominator)).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Coeff] {
        &self.values
    }

    /// Fractional bits needed to represent every tap exactly
    pub fn f_width(&self) -> u32 {
        self.values
            .iter()
            .filter_map(|v| exact_log2(*v.denom() as u64))
            .max()
            .unwrap_or(0)
    }

    /// Taps as raw integers scaled by `2^f_width()`
    pub fn raw(&self) -> Vec<i64> {
        let f = self.f_width();
        self.values.iter().map(|v| v.numer() * ((1i64 << f) / v.denom())).collect()
    }

    /// Smallest format holding every tap
    pub fn format(&self) -> QFormat {
        let f_width = self.f_width();
        let max_abs = self.raw().iter().map(|r| r.abs()).max().unwrap_or(0);
        let i_width = bits_for(max_abs).saturating_sub(f_width);
        let signed = self.values.iter().any(|v| v.is_negative());
        QFormat::new(i_width, f_width, signed)
    }

    pub fn sum(&self) -> Coeff {
        self.values.iter().fold(Coeff::zero(), |acc, v| acc + *v)
    }

    /// `ceil(log2(sum + extra))`, the bit growth of a filter with these taps.
    /// Negative for a sum below 1/2, zero for a non-positive sum.
    pub fn gain_bits(&self, extra: i64) -> i32 {
        let total = self.sum() + Coeff::from_integer(extra);
        if !total.is_positive() {
            return 0;
        }
        // The denominator is a power of two, so ceil(log2(n/2^k)) = ceil_log2(n) - k
        let den_log = exact_log2(*total.denom() as u64).unwrap_or(0) as i32;
        ceil_log2(*total.numer() as u64) as i32 - den_log
    }

    pub fn is_symmetric(&self) -> bool {
        self.values.iter().eq(self.values.iter().rev())
    }

    pub fn is_antisymmetric(&self) -> bool {
        self.values.iter().zip(self.values.iter().rev()).all(|(a, b)| *a == -*b)
    }

    /// Every other tap, starting at `offset`
    pub fn decimated(&self, offset: usize) -> Taps {
        Taps {
            values: self.values.iter().skip(offset).step_by(2).copied().collect(),
        }
    }

    pub fn scaled(&self, k: i64) -> Taps {
        Taps {
            values: self.values.iter().map(|v| *v * Coeff::from_integer(k)).collect(),
        }
    }

    pub fn to_f64(&self) -> Vec<f64> {
        self.values.iter().map(|v| *v.numer() as f64 / *v.denom() as f64).collect()
    }

    /// Checks the half-band structure: length 4k+3, even symmetry, and
    /// odd-indexed taps all zero except the centre one, which is exactly 1/2.
    pub fn check_halfband(&self) -> Result<(), BuildErr> {
        let len = self.values.len();
        if len % 4 != 3 {
            return Err(BuildErr::NotHalfBand { reason: "length must be 4k+3" });
        }
        if !self.is_symmetric() {
            return Err(BuildErr::NotSymmetric);
        }
        let centre = len / 2;
        for (i, v) in self.values.iter().enumerate().skip(1).step_by(2) {
            if i == centre {
                if *v != Ratio::new(1, 2) {
                    return Err(BuildErr::NotHalfBand { reason: "centre tap must be 1/2" });
                }
            } else if !v.is_zero() {
                return Err(BuildErr::NotHalfBand { reason: "odd taps must be zero" });
            }
        }
        Ok(())
    }
}
