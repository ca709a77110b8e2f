use std::collections::VecDeque;

use frontend_core::{BuildErr, IqSample, QFormat};

use super::coeffs::Taps;
use super::mac::MacFir;
use super::mcm::ShiftAddMcm;
use super::requantize::requantize_raw;
use crate::Stage;

/// Multiply-accumulate kernel of an FIR arm.
///
/// Produces exact sums `carry + sum(taps[k] * x[n-k])` as raw integers with
/// `f_in + f_taps` fractional bits. The carry must already be aligned to that
/// scale. Results wait in an output register until taken.
pub trait ArmKernel: Send {
    fn ready(&self) -> bool;
    fn push(&mut self, x: IqSample, carry: IqSample);
    fn peek(&self) -> Option<IqSample>;
    fn pop(&mut self) -> Option<IqSample>;
    fn tick(&mut self) {}
    /// Clears the sample history and any sum in flight
    fn reset(&mut self);
}

/// Selects how an FIR arm computes its products
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmKind {
    /// Transposed form over a shift-add constant multiplier network, one sample per step
    Mcm,
    /// Time-shared serial multiply-accumulate, `overclock` taps per engine and sample
    Mac { overclock: usize },
}

impl ArmKind {
    pub fn build(&self, taps: &Taps, shape_in: QFormat) -> Result<Box<dyn ArmKernel>, BuildErr> {
        match *self {
            ArmKind::Mcm => Ok(Box::new(TransposedFir::new(taps, shape_in))),
            ArmKind::Mac { overclock } => Ok(Box::new(MacFir::new(taps, shape_in, overclock)?)),
        }
    }

    /// Same kernel, running `factor` times as many taps per sample
    pub fn overclocked(&self, factor: usize) -> ArmKind {
        match *self {
            ArmKind::Mcm => ArmKind::Mcm,
            ArmKind::Mac { overclock } => ArmKind::Mac { overclock: overclock * factor },
        }
    }
}

/// Transposed-form FIR: every input is multiplied by all taps at once and the
/// products are added into a chain of partial-sum registers.
pub struct TransposedFir {
    mcm: ShiftAddMcm,
    partials: [Vec<i64>; 2],
    products: Vec<i64>,
    out: Option<IqSample>,
}

impl TransposedFir {
    pub fn new(taps: &Taps, shape_in: QFormat) -> Self {
        let raw = taps.raw();
        let len = raw.len();
        Self {
            mcm: ShiftAddMcm::new(&raw, shape_in),
            partials: [vec![0; len - 1], vec![0; len - 1]],
            products: vec![0; len],
            out: None,
        }
    }

    fn step_channel(&mut self, ch: usize, x: i64, carry: i64) -> i64 {
        self.mcm.multiply_into(x, &mut self.products);
        let partials = &mut self.partials[ch];
        let n = self.products.len();
        let y = self.products[0] + partials.first().copied().unwrap_or(0) + carry;
        for k in 1..n {
            let next = if k < n - 1 { partials[k] } else { 0 };
            partials[k - 1] = self.products[k] + next;
        }
        y
    }
}

impl ArmKernel for TransposedFir {
    fn ready(&self) -> bool {
        self.out.is_none()
    }

    fn push(&mut self, x: IqSample, carry: IqSample) {
        let i = self.step_channel(0, x.i, carry.i);
        let q = self.step_channel(1, x.q, carry.q);
        self.out = Some(IqSample::new(i, q));
    }

    fn peek(&self) -> Option<IqSample> {
        self.out
    }

    fn pop(&mut self) -> Option<IqSample> {
        self.out.take()
    }

    fn reset(&mut self) {
        self.partials.iter_mut().for_each(|p| p.fill(0));
        self.out = None;
    }
}

/// Pure delay line of `n` samples
#[derive(Debug, Clone)]
pub struct Delay<T> {
    line: VecDeque<T>,
    n: usize,
}

impl<T: Copy + Default> Delay<T> {
    pub fn new(n: usize) -> Self {
        Self {
            line: std::iter::repeat_n(T::default(), n).collect(),
            n,
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Inserts `x` and returns the value inserted `n` calls ago
    pub fn shift(&mut self, x: T) -> T {
        if self.n == 0 {
            return x;
        }
        self.line.push_back(x);
        self.line.pop_front().unwrap_or(x)
    }

    /// The value `shift` would return next
    pub fn oldest(&self) -> Option<&T> {
        self.line.front()
    }

    pub fn reset(&mut self) {
        self.line.iter_mut().for_each(|v| *v = T::default());
    }
}

/// General FIR filter stage with convergent rounding to its output format
pub struct FirFilter {
    taps: Taps,
    shape_in: QFormat,
    shape_out: QFormat,
    sum_f: u32,
    arm: Box<dyn ArmKernel>,
}

impl FirFilter {
    pub fn new(taps: Taps, shape_in: QFormat, shape_out: Option<QFormat>, kind: ArmKind) -> Result<Self, BuildErr> {
        let shape_out = shape_out.unwrap_or_else(|| Self::default_shape_out(&taps, shape_in, false));
        let arm = kind.build(&taps, shape_in)?;
        let sum_f = shape_in.f_width + taps.f_width();
        tracing::debug!(
            "FirFilter: {} taps {:?}, {} -> {}, taps {}",
            taps.len(),
            kind,
            shape_in,
            shape_out,
            taps.format()
        );
        Ok(Self {
            taps,
            shape_in,
            shape_out,
            sum_f,
            arm,
        })
    }

    /// Full-precision output format: `f = f_in + f_taps`, plus the integer
    /// growth of the tap sum (and of an extra unit tap if `add_tap`).
    pub fn default_shape_out(taps: &Taps, shape_in: QFormat, add_tap: bool) -> QFormat {
        let taps_fmt = taps.format();
        let signed = shape_in.signed | taps_fmt.signed;
        let f_width = shape_in.f_width + taps_fmt.f_width;
        let gain = taps.gain_bits(add_tap as i64) as i64;
        let i_width = shape_in.width() as i64 + taps_fmt.width() as i64 - signed as i64 - f_width as i64 + gain;
        QFormat::new(i_width.max(0) as u32, f_width, signed)
    }

    pub fn taps(&self) -> &Taps {
        &self.taps
    }

    pub fn shape_in(&self) -> QFormat {
        self.shape_in
    }

    fn finish(&self, sum: IqSample) -> IqSample {
        sum.map(|v| requantize_raw(v, self.sum_f, self.shape_out))
    }
}

impl Stage for FirFilter {
    fn ready(&self) -> bool {
        self.arm.ready()
    }

    fn push(&mut self, sample: IqSample) {
        self.arm.push(sample, IqSample::ZERO);
    }

    fn peek(&self) -> Option<IqSample> {
        self.arm.peek().map(|s| self.finish(s))
    }

    fn pop(&mut self) -> Option<IqSample> {
        self.arm.pop().map(|s| self.finish(s))
    }

    fn tick(&mut self) {
        self.arm.tick();
    }

    fn reset(&mut self) {
        self.arm.reset();
    }

    fn shape_out(&self) -> Option<QFormat> {
        Some(self.shape_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn convolve(x: &[i64], h: &[i64]) -> Vec<i64> {
        let mut y = vec![0; x.len() + h.len() - 1];
        for (i, &a) in x.iter().enumerate() {
            for (j, &b) in h.iter().enumerate() {
                y[i + j] += a * b;
            }
        }
        y
    }

    #[test]
    fn test_transposed_matches_convolution() {
        let taps = Taps::from_ints(&[-1, 0, 6, 0, -1], 8).unwrap();
        let mut fir = TransposedFir::new(&taps, QFormat::sq(0, 11));
        let mut rng = StdRng::seed_from_u64(7);
        let xi: Vec<i64> = (0..200).map(|_| rng.random_range(-2048..2048)).collect();
        let xq: Vec<i64> = xi.iter().map(|v| -v / 3).collect();

        let mut got = vec![];
        for (&i, &q) in xi.iter().zip(xq.iter()) {
            assert!(fir.ready());
            fir.push(IqSample::new(i, q), IqSample::ZERO);
            got.push(fir.pop().unwrap());
        }
        let ref_i = convolve(&xi, &taps.raw());
        let ref_q = convolve(&xq, &taps.raw());
        for (n, s) in got.iter().enumerate() {
            assert_eq!(s.i, ref_i[n]);
            assert_eq!(s.q, ref_q[n]);
        }
    }

    #[test]
    fn test_default_shape_out() {
        let taps = Taps::from_ints(&[-1, 0, 6, 0, -1], 8).unwrap();
        // taps SQ(0.3), sum 1/2
        let fmt = FirFilter::default_shape_out(&taps, QFormat::sq(0, 11), false);
        assert_eq!(fmt, QFormat::sq(0, 14));
        let arm = Taps::from_ints(&[-1, 9, 9, -1], 16).unwrap();
        let fmt = FirFilter::default_shape_out(&arm, QFormat::sq(0, 7), true);
        assert_eq!(fmt, QFormat::sq(2, 11));
    }

    #[test]
    fn test_fir_stage_rounds_to_output() {
        let taps = Taps::from_ints(&[1, 2, 1], 4).unwrap();
        let mut fir = FirFilter::new(taps, QFormat::sq(0, 7), Some(QFormat::sq(0, 7)), ArmKind::Mcm).unwrap();
        let mut out = vec![];
        for x in [64, 64, 64, 64, 1, 0, 0] {
            fir.push(IqSample::new(x, -x));
            out.push(fir.pop().unwrap().i);
            fir.tick();
        }
        // 64/4 = 16, 64*3/4 = 48, then 64; (64 + 2*64 + 1)/4 = 48.25 -> 48
        assert_eq!(out, vec![16, 48, 64, 64, 48, 16, 0]);
    }

    #[test]
    fn test_delay() {
        let mut d = Delay::<i64>::new(2);
        assert_eq!(d.shift(1), 0);
        assert_eq!(d.shift(2), 0);
        assert_eq!(d.shift(3), 1);
        assert_eq!(d.oldest(), Some(&2));
        d.reset();
        assert_eq!(d.shift(4), 0);
        let mut zero = Delay::<i64>::new(0);
        assert_eq!(zero.shift(9), 9);
    }
}
