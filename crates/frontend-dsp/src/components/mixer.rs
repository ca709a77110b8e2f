use frontend_config::ControlRegs;
use frontend_core::{BuildErr, IqSample, QFormat, convergent_round};

use super::mac::Multiplier16;
use super::nco::Nco;
use crate::Stage;

/// Complex product `(A + jB)(C + jD)` on four shared-model multipliers.
///
/// `i = AC - BD`, `q = AD + BC`, convergent-rounded by `w(AC) - w_out - 1`
/// bits and wrapped to the output width.
#[derive(Debug, Clone)]
pub struct ComplexMultiplier {
    ac: Multiplier16,
    ad: Multiplier16,
    bd: Multiplier16,
    bc: Multiplier16,
    shift: u32,
    shape_out: QFormat,
}

impl ComplexMultiplier {
    pub fn new(a_fmt: QFormat, b_fmt: QFormat, shape_out: QFormat) -> Result<Self, BuildErr> {
        let product_width = a_fmt.width() + b_fmt.width();
        let shift = product_width as i64 - shape_out.width() as i64 - 1;
        if shift < 0 {
            return Err(BuildErr::NegativeShift { shift });
        }
        Ok(Self {
            ac: Multiplier16::new(a_fmt, b_fmt)?,
            ad: Multiplier16::new(a_fmt, b_fmt)?,
            bd: Multiplier16::new(a_fmt, b_fmt)?,
            bc: Multiplier16::new(a_fmt, b_fmt)?,
            shift: shift as u32,
            shape_out,
        })
    }

    pub fn shape_out(&self) -> QFormat {
        self.shape_out
    }

    pub fn multiply(&self, a: IqSample, b: IqSample) -> IqSample {
        let i = self.ac.multiply(a.i, b.i) - self.bd.multiply(a.q, b.q);
        let q = self.ad.multiply(a.i, b.q) + self.bc.multiply(a.q, b.i);
        IqSample::new(
            self.shape_out.wrap(convergent_round(i, self.shift)),
            self.shape_out.wrap(convergent_round(q, self.shift)),
        )
    }
}

/// Frequency shift by an arbitrary NCO step. `shift_up` selects the sign of
/// the rotation; the NCO keeps running while the mixer is bypassed.
pub struct Mixer {
    nco: Nco,
    mult: ComplexMultiplier,
    shape_in: QFormat,
    enable: bool,
    up: bool,
    step: u64,
    out: Option<IqSample>,
}

impl Mixer {
    pub fn new(shape_in: QFormat, nco: Nco) -> Result<Self, BuildErr> {
        let mult = ComplexMultiplier::new(shape_in, nco.output_format(), shape_in)?;
        tracing::debug!("Mixer: {} x {} -> {}", shape_in, nco.output_format(), shape_in);
        Ok(Self {
            nco,
            mult,
            shape_in,
            enable: false,
            up: true,
            step: 0,
            out: None,
        })
    }

    pub fn set_tuning(&mut self, enable: bool, up: bool, step: u64) {
        if (enable, up, step) != (self.enable, self.up, self.step) {
            tracing::info!("Mixer: enable {} up {} step {}", enable, up, step);
        }
        self.enable = enable;
        self.up = up;
        self.step = step;
        self.nco.set_step(if up { step } else { step.wrapping_neg() });
    }

    pub fn nco(&self) -> &Nco {
        &self.nco
    }
}

impl Stage for Mixer {
    fn ready(&self) -> bool {
        self.out.is_none()
    }

    fn push(&mut self, sample: IqSample) {
        let lo = self.nco.next();
        self.out = Some(if self.enable { self.mult.multiply(sample, lo) } else { sample });
    }

    fn peek(&self) -> Option<IqSample> {
        self.out
    }

    fn pop(&mut self) -> Option<IqSample> {
        self.out.take()
    }

    fn reset(&mut self) {
        self.nco.reset();
        self.out = None;
    }

    fn configure(&mut self, regs: &ControlRegs) {
        self.set_tuning(regs.shift_enable, regs.shift_up, regs.phase_step as u64);
    }

    fn shape_out(&self) -> Option<QFormat> {
        Some(self.shape_in)
    }
}
