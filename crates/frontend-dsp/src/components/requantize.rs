use frontend_core::{Fixed, IqSample, QFormat};

use crate::Stage;

/// Full-width carrier for a raw accumulator value with `f_width` fraction bits
#[inline]
fn carrier(raw: i64, f_width: u32) -> Fixed {
    Fixed::new(raw, QFormat::from_width(64, f_width, true))
}

/// Moves `raw`, scaled by `2^-f_from`, to `to`: extends or convergent-rounds
/// the fraction, then wraps the integer part.
#[inline]
pub fn requantize_raw(raw: i64, f_from: u32, to: QFormat) -> i64 {
    carrier(raw, f_from).requantize(to).raw()
}

/// Like `requantize_raw`, but clamps instead of wrapping
#[inline]
pub fn requantize_raw_saturating(raw: i64, f_from: u32, to: QFormat) -> i64 {
    carrier(raw, f_from).saturate_to(to).raw()
}

/// Precision reduction stage: convergent rounding to a narrower format
pub struct Requantize {
    shape_in: QFormat,
    shape_out: QFormat,
    saturate: bool,
    out: Option<IqSample>,
}

impl Requantize {
    pub fn new(shape_in: QFormat, shape_out: QFormat) -> Self {
        Self {
            shape_in,
            shape_out,
            saturate: false,
            out: None,
        }
    }

    /// Clamp results that round past the top of the output range
    pub fn saturating(mut self) -> Self {
        self.saturate = true;
        self
    }

    pub fn convert(&self, s: IqSample) -> IqSample {
        let f = self.shape_in.f_width;
        if self.saturate {
            s.map(|v| requantize_raw_saturating(v, f, self.shape_out))
        } else {
            s.map(|v| requantize_raw(v, f, self.shape_out))
        }
    }
}

impl Stage for Requantize {
    fn ready(&self) -> bool {
        self.out.is_none()
    }

    fn push(&mut self, sample: IqSample) {
        self.out = Some(self.convert(sample));
    }

    fn peek(&self) -> Option<IqSample> {
        self.out
    }

    fn pop(&mut self) -> Option<IqSample> {
        self.out.take()
    }

    fn reset(&mut self) {
        self.out = None;
    }

    fn shape_out(&self) -> Option<QFormat> {
        Some(self.shape_out)
    }
}

/// Precision expansion stage: shifts samples left by a fixed number of bits
pub struct LeftShift {
    shift: u32,
    shape_out: QFormat,
    out: Option<IqSample>,
}

impl LeftShift {
    pub fn new(shape_in: QFormat, shift: u32) -> Self {
        let shape_out = QFormat::from_width(shape_in.width() + shift, shape_in.f_width + shift, shape_in.signed);
        Self { shift, shape_out, out: None }
    }
}

impl Stage for LeftShift {
    fn ready(&self) -> bool {
        self.out.is_none()
    }

    fn push(&mut self, sample: IqSample) {
        self.out = Some(sample.map(|v| v << self.shift));
    }

    fn peek(&self) -> Option<IqSample> {
        self.out
    }

    fn pop(&mut self) -> Option<IqSample> {
        self.out.take()
    }

    fn reset(&mut self) {
        self.out = None;
    }

    fn shape_out(&self) -> Option<QFormat> {
        Some(self.shape_out)
    }
}
