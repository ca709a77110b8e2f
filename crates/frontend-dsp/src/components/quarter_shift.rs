use frontend_config::ControlRegs;
use frontend_core::{IqSample, QFormat};

use crate::Stage;

/// Frequency shift by a quarter of the sample rate.
///
/// Each sample is rotated by `index * 90°` using swaps and negations only,
/// where a mod-4 index steps once per sample (downward when `up` is set).
/// Negation wraps, so the most negative value maps onto itself.
pub struct QuarterShift {
    fmt: QFormat,
    index: u8,
    enable: bool,
    up: bool,
    out: Option<IqSample>,
}

impl QuarterShift {
    pub fn new(fmt: QFormat) -> Self {
        Self {
            fmt,
            index: 0,
            enable: false,
            up: false,
            out: None,
        }
    }

    pub fn set_shift(&mut self, enable: bool, up: bool) {
        if (enable, up) != (self.enable, self.up) {
            tracing::info!("QuarterShift: enable {} up {}", enable, up);
        }
        self.enable = enable;
        self.up = up;
    }

    fn rotate(&self, x: IqSample) -> IqSample {
        let swap = self.index & 1 == 1;
        let inv_i = self.index & 2 == 2;
        let inv_q = swap ^ inv_i;

        let (i, q) = if swap { (x.q, x.i) } else { (x.i, x.q) };
        let i = if inv_i { self.fmt.wrap(-i) } else { i };
        let q = if inv_q { self.fmt.wrap(-q) } else { q };
        IqSample::new(i, q)
    }
}

impl Stage for QuarterShift {
    fn ready(&self) -> bool {
        self.out.is_none()
    }

    fn push(&mut self, sample: IqSample) {
        self.out = Some(if self.enable { self.rotate(sample) } else { sample });
        // The index keeps counting while bypassed
        self.index = if self.up { (self.index + 3) % 4 } else { (self.index + 1) % 4 };
    }

    fn peek(&self) -> Option<IqSample> {
        self.out
    }

    fn pop(&mut self) -> Option<IqSample> {
        self.out.take()
    }

    fn reset(&mut self) {
        self.index = 0;
        self.out = None;
    }

    fn configure(&mut self, regs: &ControlRegs) {
        self.set_shift(regs.shift_enable, regs.shift_up);
    }

    fn shape_out(&self) -> Option<QFormat> {
        Some(self.fmt)
    }
}
