//! Multiplierless constant multiplication.
//!
//! Constants are decomposed into canonical signed digits (CSD) so that a
//! product becomes a handful of shifted additions and subtractions. A
//! `ShiftAddMcm` multiplies one input by a whole set of constants, sharing the
//! network of every odd fundamental between all terms that reduce to it.

use std::collections::BTreeMap;

use frontend_core::{QFormat, bits_for};

/// Signed digits of `n`, least significant first, each in {-1, 0, 1}.
///
/// Uses the canonical form unless plain binary needs no more non-zero digits
/// (for negative numbers the negation itself costs one digit).
pub fn to_csd(n: i64) -> Vec<i8> {
    if n == 0 {
        return vec![0];
    }
    let mag = n.unsigned_abs();
    let nbits = 64 - mag.leading_zeros() as usize;
    let bit = |i: usize| -> u8 { if i < nbits { ((mag >> i) & 1) as u8 } else { 0 } };

    let mut digits = Vec::with_capacity(nbits + 1);
    let mut carry = 0u8;
    for i in 0..=nbits {
        let (b, next) = (bit(i), bit(i + 1));
        let d = b ^ carry;
        let ys = next & d;
        let yd = (next ^ 1) & d;
        digits.push(yd as i8 - ys as i8);
        carry = (b & next) | ((b | next) & carry);
    }
    if n < 0 {
        digits.iter_mut().for_each(|d| *d = -*d);
    }
    while digits.len() > 1 && digits.last() == Some(&0) {
        digits.pop();
    }

    let csd_cost = digits.iter().filter(|&&d| d != 0).count();
    let binary_cost = mag.count_ones() as usize;
    if binary_cost + (n < 0) as usize <= csd_cost {
        let sign = if n < 0 { -1 } else { 1 };
        return (0..nbits).map(|i| sign * bit(i) as i8).collect();
    }
    digits
}

/// Splits `n` into an odd fundamental and a left shift, `n = odd << shift`
pub fn make_odd(n: i64) -> (i64, u32) {
    if n == 0 {
        return (0, 0);
    }
    let shift = n.trailing_zeros();
    (n >> shift, shift)
}

/// Multiplies by a constant given as signed digits
pub fn csd_multiply(x: i64, digits: &[i8]) -> i64 {
    digits
        .iter()
        .enumerate()
        .filter(|(_, d)| **d != 0)
        .fold(0, |acc, (i, &d)| acc + d as i64 * (x << i))
}

/// Adders (or subtractors) needed to multiply by `n` through its CSD form
pub fn adder_cost(n: i64) -> usize {
    to_csd(n).iter().filter(|&&d| d != 0).count().saturating_sub(1)
}

#[derive(Debug, Clone)]
struct Fanout {
    /// Index into the fundamentals, None for a zero term
    fundamental: Option<usize>,
    shift: u32,
    negate: bool,
}

/// Multiple-constant multiplier built from shared shift-add networks
#[derive(Debug, Clone)]
pub struct ShiftAddMcm {
    terms: Vec<i64>,
    shape_in: QFormat,
    /// Odd positive fundamentals and their digits
    fundamentals: Vec<(i64, Vec<i8>)>,
    fanout: Vec<Fanout>,
}

impl ShiftAddMcm {
    pub fn new(terms: &[i64], shape_in: QFormat) -> Self {
        let mut index: BTreeMap<i64, usize> = BTreeMap::new();
        let mut fundamentals = vec![];
        let mut fanout = vec![];

        for &term in terms {
            let (odd, shift) = make_odd(term);
            if odd == 0 {
                fanout.push(Fanout { fundamental: None, shift: 0, negate: false });
                continue;
            }
            let key = odd.abs();
            let idx = *index.entry(key).or_insert_with(|| {
                fundamentals.push((key, to_csd(key)));
                fundamentals.len() - 1
            });
            fanout.push(Fanout { fundamental: Some(idx), shift, negate: odd < 0 });
        }

        let mcm = Self {
            terms: terms.to_vec(),
            shape_in,
            fundamentals,
            fanout,
        };
        tracing::debug!(
            "ShiftAddMcm: {} terms, {} fundamentals, {} adders",
            mcm.terms.len(),
            mcm.fundamentals.len(),
            mcm.adder_count()
        );
        mcm
    }

    pub fn terms(&self) -> &[i64] {
        &self.terms
    }

    pub fn fundamental_count(&self) -> usize {
        self.fundamentals.len()
    }

    /// Total adders in the network. Shifts and negations are free.
    pub fn adder_count(&self) -> usize {
        self.fundamentals
            .iter()
            .map(|(_, digits)| digits.iter().filter(|&&d| d != 0).count().saturating_sub(1))
            .sum()
    }

    /// Format of the product for term `k`, as a raw integer
    pub fn product_format(&self, k: usize) -> QFormat {
        let width = self.shape_in.width() + bits_for(self.terms[k]);
        QFormat::from_width(width, 0, true)
    }

    /// All products `x * terms[k]`, written into `out`
    pub fn multiply_into(&self, x: i64, out: &mut [i64]) {
        let products: Vec<i64> = self.fundamentals.iter().map(|(_, d)| csd_multiply(x, d)).collect();
        for (o, f) in out.iter_mut().zip(self.fanout.iter()) {
            *o = match f.fundamental {
                Some(idx) => {
                    let p = products[idx] << f.shift;
                    if f.negate { -p } else { p }
                }
                None => 0,
            };
        }
    }

    pub fn multiply(&self, x: i64) -> Vec<i64> {
        let mut out = vec![0; self.terms.len()];
        self.multiply_into(x, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(digits: &[i8]) -> i64 {
        digits.iter().enumerate().map(|(i, &d)| (d as i64) << i).sum()
    }

    #[test]
    fn test_csd_examples() {
        assert_eq!(to_csd(0), vec![0]);
        assert_eq!(to_csd(7), vec![-1, 0, 0, 1]);
        assert_eq!(to_csd(3), vec![1, 1]);
        assert_eq!(to_csd(5), vec![1, 0, 1]);
        assert_eq!(to_csd(-1), vec![-1]);
        assert_eq!(to_csd(-3), vec![1, 0, -1]);
        assert_eq!(to_csd(-92), vec![0, 0, 1, 0, 0, 1, 0, -1]);
    }

    #[test]
    fn test_csd_value_and_adjacency() {
        for n in -5000..5000 {
            let digits = to_csd(n);
            assert_eq!(value(&digits), n, "csd({}) = {:?}", n, digits);
            assert!(digits.iter().all(|d| (-1..=1).contains(d)));
            // Never more non-zero digits than plain binary
            let nz = digits.iter().filter(|&&d| d != 0).count();
            assert!(nz <= n.unsigned_abs().count_ones() as usize + (n < 0) as usize);
        }
    }

    #[test]
    fn test_make_odd() {
        assert_eq!(make_odd(320), (5, 6));
        assert_eq!(make_odd(-92), (-23, 2));
        assert_eq!(make_odd(7), (7, 0));
        assert_eq!(make_odd(0), (0, 0));
    }

    #[test]
    fn test_mcm_products() {
        let terms = [-2, 0, 7, 0, -18, 0, 41, 0, -92, 0, 320, 512, 320];
        let mcm = ShiftAddMcm::new(&terms, QFormat::sq(0, 7));
        // 1, 7, 9, 41, 23, 5
        assert_eq!(mcm.fundamental_count(), 6);
        assert_eq!(mcm.adder_count(), adder_cost(7) + adder_cost(9) + adder_cost(41) + adder_cost(23) + adder_cost(5));

        for x in -128..128 {
            let products = mcm.multiply(x);
            for (k, (&p, &t)) in products.iter().zip(terms.iter()).enumerate() {
                assert_eq!(p, x * t);
                assert!(mcm.product_format(k).contains(p));
            }
        }
    }

    #[test]
    fn test_csd_multiply() {
        for k in [-92i64, 41, 10370, -3298, 1] {
            let digits = to_csd(k);
            for x in [-2048i64, -1, 0, 3, 2047] {
                assert_eq!(csd_multiply(x, &digits), x * k);
            }
        }
    }
}
