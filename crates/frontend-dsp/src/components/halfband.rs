//! Half-band rate changers by two.
//!
//! A half-band filter has every odd-indexed tap zero except the centre one,
//! which is 1/2. Splitting the input into even and odd phases leaves one FIR
//! arm with the even taps and one arm that is a pure delay.

use frontend_config::ControlRegs;
use frontend_core::{BuildErr, IqSample, QFormat};

use super::coeffs::Taps;
use super::fir::{ArmKernel, ArmKind, Delay};
use super::requantize::requantize_raw;
use crate::{ControlFn, Stage};

/// Shared half-band setup: checks the taps and derives the arm taps and the delay
fn split_arms(taps: &Taps) -> Result<(Taps, usize), BuildErr> {
    taps.check_halfband()?;
    // Scaled by two; the 1/2 is applied when rounding the output
    let arm_taps = taps.decimated(0).scaled(2);
    // Centre tap sits at 2d + 1 for a length of 4d + 3
    Ok((arm_taps, taps.len() / 4))
}

/// Half-band decimator by two.
///
/// Even input samples go through the delay arm, odd samples through the FIR
/// arm; the delayed even sample joins the arm sum as a carry. The result is
/// `convolve(x, taps)[1::2]`, convergent-rounded to the output format.
pub struct HalfBandDecimator {
    shape_in: QFormat,
    shape_out: QFormat,
    /// Fractional bits of the arm sum
    sum_f: u32,
    taps_f: u32,

    arm: Box<dyn ArmKernel>,
    delay: Delay<IqSample>,
    /// Delayed even sample waiting for its odd partner
    carry: Option<IqSample>,

    enabled: bool,
    enable_ctl: Option<ControlFn<bool>>,
    out: Option<IqSample>,
}

impl HalfBandDecimator {
    pub fn new(taps: &Taps, shape_in: QFormat, shape_out: Option<QFormat>, kind: ArmKind) -> Result<Self, BuildErr> {
        let (arm_taps, delay) = split_arms(taps)?;
        // The arm only sees every other input sample, so it gets twice the cycles
        let arm = kind.overclocked(2).build(&arm_taps, shape_in)?;
        let shape_out = shape_out.unwrap_or(shape_in);
        tracing::debug!(
            "HalfBandDecimator: {} taps {:?}, {} -> {}, delay arm {}",
            taps.len(),
            kind,
            shape_in,
            shape_out,
            delay
        );
        Ok(Self {
            shape_in,
            shape_out,
            sum_f: shape_in.f_width + arm_taps.f_width(),
            taps_f: arm_taps.f_width(),
            arm,
            delay: Delay::new(delay),
            carry: None,
            enabled: true,
            enable_ctl: None,
            out: None,
        })
    }

    /// Drives the enable flag from the control registers
    pub fn with_control(mut self, f: impl Fn(&ControlRegs) -> bool + Send + 'static) -> Self {
        self.enable_ctl = Some(Box::new(f));
        self
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or bypasses the filter. A change clears the arm state; a
    /// sample still inside the arm is discarded.
    pub fn set_enable(&mut self, enable: bool) {
        if enable == self.enabled {
            return;
        }
        tracing::info!("HalfBandDecimator: {}", if enable { "enabled" } else { "bypassed" });
        self.enabled = enable;
        self.clear_arms();
    }

    fn clear_arms(&mut self) {
        self.arm.reset();
        self.delay.reset();
        self.carry = None;
    }

    fn finish(&self, sum: IqSample) -> IqSample {
        // One extra fractional bit applies the 1/2
        sum.map(|v| requantize_raw(v, self.sum_f + 1, self.shape_out))
    }
}

impl Stage for HalfBandDecimator {
    fn ready(&self) -> bool {
        if !self.enabled {
            return self.out.is_none();
        }
        match self.carry {
            None => true,
            Some(_) => self.arm.ready(),
        }
    }

    fn push(&mut self, sample: IqSample) {
        if !self.enabled {
            self.out = Some(sample.map(|v| requantize_raw(v, self.shape_in.f_width, self.shape_out)));
            return;
        }
        match self.carry.take() {
            None => {
                self.carry = Some(self.delay.shift(sample));
            }
            Some(even) => {
                let carry = even.map(|v| v << self.taps_f);
                self.arm.push(sample, carry);
            }
        }
    }

    fn peek(&self) -> Option<IqSample> {
        self.out
    }

    fn pop(&mut self) -> Option<IqSample> {
        self.out.take()
    }

    fn tick(&mut self) {
        self.arm.tick();
        if self.out.is_none() {
            if let Some(sum) = self.arm.pop() {
                self.out = Some(self.finish(sum));
            }
        }
    }

    fn reset(&mut self) {
        self.clear_arms();
        self.out = None;
    }

    fn configure(&mut self, regs: &ControlRegs) {
        if let Some(f) = &self.enable_ctl {
            let enable = f(regs);
            self.set_enable(enable);
        }
    }

    fn shape_out(&self) -> Option<QFormat> {
        Some(self.shape_out)
    }
}

/// Half-band interpolator by two.
///
/// Each input sample yields the FIR arm output followed by the delayed input,
/// which equals `convolve(zero_stuff(2x), taps)`.
pub struct HalfBandInterpolator {
    shape_in: QFormat,
    shape_out: QFormat,
    sum_f: u32,

    arm: Box<dyn ArmKernel>,
    delay: Delay<IqSample>,
    /// Delay arm output, emitted once the FIR arm result is out
    held: Option<IqSample>,
    arm_done: bool,

    enabled: bool,
    enable_ctl: Option<ControlFn<bool>>,
    out: Option<IqSample>,
}

impl HalfBandInterpolator {
    pub fn new(taps: &Taps, shape_in: QFormat, shape_out: Option<QFormat>, kind: ArmKind) -> Result<Self, BuildErr> {
        let (arm_taps, delay) = split_arms(taps)?;
        let arm = kind.build(&arm_taps, shape_in)?;
        let shape_out = shape_out.unwrap_or(shape_in);
        tracing::debug!(
            "HalfBandInterpolator: {} taps {:?}, {} -> {}, delay arm {}",
            taps.len(),
            kind,
            shape_in,
            shape_out,
            delay
        );
        Ok(Self {
            shape_in,
            shape_out,
            sum_f: shape_in.f_width + arm_taps.f_width(),
            arm,
            delay: Delay::new(delay),
            held: None,
            arm_done: true,
            enabled: true,
            enable_ctl: None,
            out: None,
        })
    }

    /// Drives the enable flag from the control registers
    pub fn with_control(mut self, f: impl Fn(&ControlRegs) -> bool + Send + 'static) -> Self {
        self.enable_ctl = Some(Box::new(f));
        self
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enable(&mut self, enable: bool) {
        if enable == self.enabled {
            return;
        }
        tracing::info!("HalfBandInterpolator: {}", if enable { "enabled" } else { "bypassed" });
        self.enabled = enable;
        self.clear_arms();
    }

    fn clear_arms(&mut self) {
        self.arm.reset();
        self.delay.reset();
        self.held = None;
        self.arm_done = true;
    }

    fn from_input(&self, s: IqSample) -> IqSample {
        s.map(|v| requantize_raw(v, self.shape_in.f_width, self.shape_out))
    }
}

impl Stage for HalfBandInterpolator {
    fn ready(&self) -> bool {
        if !self.enabled {
            return self.out.is_none();
        }
        self.held.is_none() && self.arm.ready()
    }

    fn push(&mut self, sample: IqSample) {
        if !self.enabled {
            self.out = Some(self.from_input(sample));
            return;
        }
        self.arm.push(sample, IqSample::ZERO);
        self.held = Some(self.delay.shift(sample));
        self.arm_done = false;
    }

    fn peek(&self) -> Option<IqSample> {
        self.out
    }

    fn pop(&mut self) -> Option<IqSample> {
        self.out.take()
    }

    fn tick(&mut self) {
        self.arm.tick();
        if self.out.is_some() {
            return;
        }
        if !self.arm_done {
            if let Some(sum) = self.arm.pop() {
                self.out = Some(sum.map(|v| requantize_raw(v, self.sum_f, self.shape_out)));
                self.arm_done = true;
            }
        } else if let Some(s) = self.held.take() {
            self.out = Some(self.from_input(s));
        }
    }

    fn reset(&mut self) {
        self.clear_arms();
        self.out = None;
    }

    fn configure(&mut self, regs: &ControlRegs) {
        if let Some(f) = &self.enable_ctl {
            let enable = f(regs);
            self.set_enable(enable);
        }
    }

    fn shape_out(&self) -> Option<QFormat> {
        Some(self.shape_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taps5() -> Taps {
        Taps::from_ints(&[-1, 0, 9, 16, 9, 0, -1], 32).unwrap()
    }

    fn convolve(x: &[i64], h: &[i64]) -> Vec<i64> {
        let mut y = vec![0; x.len() + h.len() - 1];
        for (i, &a) in x.iter().enumerate() {
            for (j, &b) in h.iter().enumerate() {
                y[i + j] += a * b;
            }
        }
        y
    }

    /// Runs a stage with an always-ready output until `n_out` samples appeared
    fn run(stage: &mut dyn Stage, xs: &[i64], n_out: usize) -> Vec<i64> {
        let mut out = vec![];
        let mut it = xs.iter().peekable();
        for _ in 0..100 * (xs.len() + n_out) {
            if let Some(s) = stage.pop() {
                out.push(s.i);
            }
            if let Some(&&x) = it.peek() {
                if stage.ready() {
                    stage.push(IqSample::new(x, -x));
                    it.next();
                }
            }
            stage.tick();
            if out.len() == n_out {
                break;
            }
        }
        out
    }

    #[test]
    fn test_split_arms() {
        let (arm, delay) = split_arms(&taps5()).unwrap();
        assert_eq!(arm.raw(), vec![-1, 9, 9, -1]);
        assert_eq!(delay, 1);
        let (arm, delay) = split_arms(&Taps::from_ints(&[1, 2, 1], 4).unwrap()).unwrap();
        assert_eq!(arm.raw(), vec![1, 1]);
        assert_eq!(delay, 0);
        assert!(split_arms(&Taps::from_ints(&[1, 0, 2, 0, 1], 4).unwrap()).is_err());
    }

    #[test]
    fn test_decimator_matches_reference() {
        let xs: Vec<i64> = (0..64).map(|n| ((n * 37) % 255) - 127).collect();
        // Exact: SQ(0.7) in, 5 tap fraction bits, one more for the output
        let shape_out = QFormat::sq(1, 12);
        for kind in [ArmKind::Mcm, ArmKind::Mac { overclock: 1 }, ArmKind::Mac { overclock: 4 }] {
            let mut dec = HalfBandDecimator::new(&taps5(), QFormat::sq(0, 7), Some(shape_out), kind).unwrap();
            let got = run(&mut dec, &xs, 32);
            let reference: Vec<i64> = convolve(&xs, &taps5().raw()).into_iter().skip(1).step_by(2).take(32).collect();
            assert_eq!(got, reference, "{:?}", kind);
        }
    }

    #[test]
    fn test_interpolator_matches_reference() {
        let xs: Vec<i64> = (0..32).map(|n| ((n * 53) % 255) - 127).collect();
        let shape_out = QFormat::sq(1, 12);
        let stuffed: Vec<i64> = xs.iter().flat_map(|&x| [2 * x, 0]).collect();
        let reference: Vec<i64> = convolve(&stuffed, &taps5().raw()).into_iter().take(64).collect();
        for kind in [ArmKind::Mcm, ArmKind::Mac { overclock: 2 }] {
            let mut int = HalfBandInterpolator::new(&taps5(), QFormat::sq(0, 7), Some(shape_out), kind).unwrap();
            let got = run(&mut int, &xs, 64);
            assert_eq!(got, reference, "{:?}", kind);
        }
    }

    #[test]
    fn test_bypass_and_toggle() {
        let mut dec = HalfBandDecimator::new(&taps5(), QFormat::sq(0, 7), Some(QFormat::sq(0, 9)), ArmKind::Mcm)
            .unwrap()
            .with_control(|r| r.rx_decim > 0);
        dec.configure(&ControlRegs::default());
        assert!(!dec.enabled());

        // Bypass passes every sample, rescaled to the output format
        let got = run(&mut dec, &[1, 2, 3, 4], 4);
        assert_eq!(got, vec![4, 8, 12, 16]);

        dec.configure(&ControlRegs { rx_decim: 1, ..Default::default() });
        assert!(dec.enabled());
        let got = run(&mut dec, &[32, 32, 32, 32, 32, 32, 32, 32], 4);
        // Settles to the DC level 32 << 2 = 128
        assert_eq!(got[3], 128);
    }
}
