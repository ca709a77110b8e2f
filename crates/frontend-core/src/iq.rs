use num_complex::Complex;

use crate::fixed::QFormat;

/// Complex baseband sample as raw fixed-point integers.
/// The format is a property of the stream carrying the sample, not of the sample itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct IqSample {
    pub i: i64,
    pub q: i64,
}

impl IqSample {
    pub const ZERO: IqSample = IqSample { i: 0, q: 0 };

    #[inline]
    pub const fn new(i: i64, q: i64) -> Self {
        Self { i, q }
    }

    /// Applies `f` to both channels
    #[inline]
    pub fn map(self, mut f: impl FnMut(i64) -> i64) -> Self {
        Self { i: f(self.i), q: f(self.q) }
    }

    /// Applies `f` to both channels, passing the channel index (0 for I, 1 for Q)
    #[inline]
    pub fn map_channels(self, mut f: impl FnMut(usize, i64) -> i64) -> Self {
        Self { i: f(0, self.i), q: f(1, self.q) }
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> i64 {
        if ch == 0 { self.i } else { self.q }
    }

    #[inline]
    pub fn as_array(&self) -> [i64; 2] {
        [self.i, self.q]
    }

    #[inline]
    pub fn from_array(v: [i64; 2]) -> Self {
        Self { i: v[0], q: v[1] }
    }

    pub fn to_complex(&self, fmt: QFormat) -> Complex<f64> {
        Complex::new(fmt.to_f64(self.i), fmt.to_f64(self.q))
    }

    /// Nearest representable sample, saturated to `fmt`
    pub fn from_complex(c: Complex<f64>, fmt: QFormat) -> Self {
        Self { i: fmt.from_f64(c.re), q: fmt.from_f64(c.im) }
    }
}

impl From<[i64; 2]> for IqSample {
    fn from(v: [i64; 2]) -> Self {
        Self::from_array(v)
    }
}
