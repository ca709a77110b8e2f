//! Cascaded integrator-comb rate changers.
//!
//! Widths are budgeted at construction from Hogenauer's analysis: the
//! decimator prunes low bits after every stage so that the added truncation
//! noise stays below the noise of the final output quantization, and the
//! interpolator carries the exact growth of every stage.

use frontend_config::ControlRegs;
use frontend_core::{BuildErr, IqSample, ModCounter, QFormat, convergent_round, exact_log2};

use super::fir::Delay;
use crate::{ControlFn, Stage};

/// Log2 growth of each of the 2N interpolator stages
pub fn cic_growth(order: u32, rate: u32, m: u32) -> Vec<u32> {
    let n = order as i64;
    let rm_log = (rate * m).trailing_zeros() as i64;
    let r_log = rate.trailing_zeros() as i64;
    (1..=2 * n)
        .map(|i| {
            let g = if i <= n {
                if m == 1 && i == n { n - 1 } else { i }
            } else {
                (2 * n - i) + rm_log * (i - n) - r_log
            };
            g.max(0) as u32
        })
        .collect()
}

fn binomial(n: i64, k: i64) -> i128 {
    if k < 0 || k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1i128, |acc, j| acc * (n - j) as i128 / (j + 1) as i128)
}

/// Hogenauer's F_j^2: squared-coefficient sum of the impulse response from
/// stage `stage` (1-based) to the decimator output. Stage 2N+1 is the output itself.
pub fn noise_gain_sq(order: u32, rate: u32, m: u32, stage: u32) -> i128 {
    let n = order as i64;
    let rm = (rate * m) as i64;
    let i = stage as i64;
    if i == 2 * n + 1 {
        return 1;
    }
    if i <= n {
        let len = n * (rm - 1) + i - 1;
        (0..=len)
            .map(|k| {
                let h: i128 = (0..=k / rm)
                    .map(|l| {
                        let sign = if l % 2 == 0 { 1 } else { -1 };
                        sign * binomial(n, l) * binomial(n - i + k - rm * l, k - rm * l)
                    })
                    .sum();
                h * h
            })
            .sum()
    } else {
        let len = 2 * n + 1 - i;
        (0..=len).map(|k| binomial(len, k).pow(2)).sum()
    }
}

/// Bits discarded after each decimator stage, for the input and the 2N
/// stages. The first entry is always zero and the last one is the final
/// truncation to `bits_out`.
pub fn cic_truncation(order: u32, rate: u32, m: u32, bits_in: u32, bits_out: u32) -> Vec<u32> {
    let full = bits_in as i64 + order as i64 * (rate * m).trailing_zeros() as i64;
    let b_last = full - bits_out as i64;
    let t = (2 * b_last) as f64 - 12f64.log2() + (6.0 / order as f64).log2();

    let mut out: Vec<u32> = (1..=2 * order)
        .map(|stage| {
            let f = noise_gain_sq(order, rate, m, stage) as f64;
            (0.5 * (-f.log2() + t)).floor().max(0.0) as u32
        })
        .collect();
    out.push(b_last.max(0) as u32);
    out[0] = 0;
    out
}

/// Programmable power-of-two rate drawn from a fixed set
#[derive(Debug, Clone)]
struct RateProgram {
    /// Sorted log2 of the allowed rates
    logs: Vec<u32>,
    current: u32,
}

impl RateProgram {
    fn new(rates: &[u32]) -> Result<Self, BuildErr> {
        if rates.is_empty() {
            return Err(BuildErr::EmptyRates);
        }
        let mut logs = vec![];
        for &rate in rates {
            match exact_log2(rate as u64) {
                Some(l) if l <= 16 => logs.push(l),
                _ => return Err(BuildErr::RateNotPowerOfTwo { rate }),
            }
        }
        logs.sort_unstable();
        logs.dedup();
        let current = logs[0];
        Ok(Self { logs, current })
    }

    fn min_log(&self) -> u32 {
        self.logs[0]
    }

    fn max_log(&self) -> u32 {
        self.logs[self.logs.len() - 1]
    }

    fn is_programmable(&self) -> bool {
        self.logs.len() > 1
    }

    /// Nearest allowed log2 rate
    fn clamp(&self, log: u32) -> u32 {
        self.logs
            .iter()
            .copied()
            .min_by_key(|&l| l.abs_diff(log))
            .unwrap_or(self.logs[0])
    }
}

fn wrap(v: i64, width: u32) -> i64 {
    QFormat::signed_int(width).wrap(v)
}

/// CIC decimator with Hogenauer pruning and a programmable rate
pub struct CicDecimator {
    order: u32,
    m: u32,
    rates: RateProgram,
    shape_in: QFormat,
    shape_out: QFormat,

    /// Register widths: input, N integrators, N combs
    widths: Vec<u32>,
    /// Left shift restoring the output scale when the minimum rate grows less than the width change
    width_gain: u32,
    /// Right shift per log2 rate, normalizing the gain
    shifts: Vec<(u32, u32)>,
    max_shift: u32,

    integrators: [Vec<i64>; 2],
    combs: Vec<Delay<IqSample>>,
    counter: ModCounter,

    rate_ctl: Option<ControlFn<u32>>,
    out: Option<IqSample>,
}

impl CicDecimator {
    /// `width_out` defaults to the full-precision width at the highest rate
    pub fn new(order: u32, m: u32, rates: &[u32], shape_in: QFormat, width_out: Option<u32>) -> Result<Self, BuildErr> {
        frontend_core::expect_param!(order, (1..=4).contains(&order))?;
        frontend_core::expect_param!(m, m == 1 || m == 2)?;
        let rates = RateProgram::new(rates)?;

        let win = shape_in.width();
        let m_log = m.trailing_zeros();
        let full = win + order * (rates.max_log() + m_log);
        frontend_core::expect_width!(full, 63, "cic accumulator")?;
        let min_growth = order * (rates.min_log() + m_log);
        let wout = width_out.unwrap_or(full);
        frontend_core::expect_param!(wout, wout > 0, "width_out")?;

        // Widths derive from the maximum rate, the pruning schedule from the minimum one
        let min_rate = 1u32 << rates.min_log();
        let truncation = cic_truncation(order, min_rate, m, win, wout);
        let widths: Vec<u32> = truncation.iter().map(|&t| full.saturating_sub(t).max(1)).collect();

        let width_gain = wout.saturating_sub(win + min_growth);

        let shifts: Vec<(u32, u32)> = rates
            .logs
            .iter()
            .map(|&l| (l, order * (l - rates.min_log())))
            .collect();
        let max_shift = shifts.iter().map(|&(_, s)| s).max().unwrap_or(0);

        let shape_out = QFormat::from_width(wout, (shape_in.f_width + wout).saturating_sub(win), shape_in.signed);
        tracing::debug!(
            "CicDecimator: N={} M={} rates 2^{:?}, {} -> {}, widths {:?}",
            order,
            m,
            rates.logs,
            shape_in,
            shape_out,
            widths
        );

        let counter = ModCounter::new(1 << rates.current);
        Ok(Self {
            order,
            m,
            rates,
            shape_in,
            shape_out,
            widths,
            width_gain,
            shifts,
            max_shift,
            integrators: [vec![0; order as usize], vec![0; order as usize]],
            combs: (0..order).map(|_| Delay::new(m as usize)).collect(),
            counter,
            rate_ctl: None,
            out: None,
        })
    }

    /// Drives the decimation factor (as log2) from the control registers
    pub fn with_control(mut self, f: impl Fn(&ControlRegs) -> u32 + Send + 'static) -> Self {
        self.rate_ctl = Some(Box::new(f));
        self
    }

    pub fn widths(&self) -> &[u32] {
        &self.widths
    }

    pub fn factor(&self) -> u32 {
        1 << self.rates.current
    }

    /// Selects the decimation factor as log2, clamped to the nearest allowed rate.
    /// A change clears all filter state.
    pub fn set_factor_log(&mut self, log: u32) {
        let log = self.rates.clamp(log);
        if log == self.rates.current {
            return;
        }
        tracing::info!("CicDecimator: factor {} -> {}", 1u32 << self.rates.current, 1u32 << log);
        self.rates.current = log;
        self.clear_state();
    }

    pub fn set_rate(&mut self, rate: u32) {
        self.set_factor_log(31 - rate.max(1).leading_zeros());
    }

    fn clear_state(&mut self) {
        self.integrators.iter_mut().for_each(|acc| acc.fill(0));
        self.combs.iter_mut().for_each(|d| d.reset());
        self.counter.set_modulus(1 << self.rates.current);
        self.counter.reset();
    }

    fn integrate(&mut self, ch: usize, x: i64) -> i64 {
        let w = &self.widths;
        let mut v = wrap(x, w[0]);
        for (i, acc) in self.integrators[ch].iter_mut().enumerate() {
            *acc = wrap(*acc + v, w[i]);
            v = wrap(*acc >> w[i].saturating_sub(w[i + 1]), w[i + 1]);
        }
        v
    }

    fn comb_and_scale(&mut self, s: IqSample) -> IqSample {
        let n = self.order as usize;
        let w = &self.widths;
        let mut last_w = w[n];
        let mut v = s;
        for (i, delay) in self.combs.iter_mut().enumerate() {
            let w_out = w[n + 1 + i];
            let diff = v.as_array();
            let old = delay.shift(v).as_array();
            let sh = last_w.saturating_sub(w_out);
            v = IqSample::new(wrap((diff[0] - old[0]) >> sh, w_out), wrap((diff[1] - old[1]) >> sh, w_out));
            last_w = w_out;
        }

        let wout = self.shape_out.width();
        let gain = self.width_gain;
        let shift = if self.rates.is_programmable() {
            let cur = self.rates.current;
            self.shifts.iter().find(|&&(l, _)| l == cur).map(|&(_, s)| s)
        } else {
            None
        };
        let max_shift = self.max_shift;
        v.map(|x| {
            let mut x = if gain > 0 { wrap(x << gain, last_w + gain) } else { x };
            if let Some(s) = shift {
                x <<= max_shift - s;
                if max_shift > 0 {
                    x = convergent_round(x, max_shift);
                }
            }
            wrap(x, wout)
        })
    }
}

impl Stage for CicDecimator {
    fn ready(&self) -> bool {
        self.out.is_none()
    }

    fn push(&mut self, sample: IqSample) {
        let integrated = IqSample::new(self.integrate(0, sample.i), self.integrate(1, sample.q));
        let emit = self.counter.value() == 0;
        self.counter.incr();
        if emit {
            self.out = Some(self.comb_and_scale(integrated));
        }
    }

    fn peek(&self) -> Option<IqSample> {
        self.out
    }

    fn pop(&mut self) -> Option<IqSample> {
        self.out.take()
    }

    fn reset(&mut self) {
        self.clear_state();
        self.out = None;
    }

    fn configure(&mut self, regs: &ControlRegs) {
        if let Some(f) = &self.rate_ctl {
            let log = f(regs);
            self.set_factor_log(log);
        }
    }

    fn shape_out(&self) -> Option<QFormat> {
        Some(self.shape_out)
    }
}

/// CIC interpolator with a programmable rate.
///
/// With M = 1 the innermost comb and integrator pair is replaced by a
/// zero-order hold of the upsampled value.
pub struct CicInterpolator {
    order: u32,
    m: u32,
    rates: RateProgram,
    shape_in: QFormat,
    shape_out: QFormat,
    zoh: bool,

    comb_widths: Vec<u32>,
    integrator_widths: Vec<u32>,
    min_shift: u32,

    combs: Vec<Delay<IqSample>>,
    integrators: [Vec<i64>; 2],
    /// Comb output being upsampled
    held: IqSample,
    /// Outputs still to produce for `held`
    phase: u32,

    rate_ctl: Option<ControlFn<u32>>,
    out: Option<IqSample>,
}

impl CicInterpolator {
    /// `width_out` defaults to the full-precision width at the highest rate, which
    /// only leaves room for normalization when a single rate is declared.
    pub fn new(order: u32, m: u32, rates: &[u32], shape_in: QFormat, width_out: Option<u32>) -> Result<Self, BuildErr> {
        frontend_core::expect_param!(order, (1..=4).contains(&order))?;
        frontend_core::expect_param!(m, m == 1 || m == 2)?;
        let rates = RateProgram::new(rates)?;

        let win = shape_in.width();
        let growth = cic_growth(order, 1 << rates.max_log(), m);
        let full = win + growth[growth.len() - 1];
        frontend_core::expect_width!(full, 63, "cic accumulator")?;

        let min_growth = cic_growth(order, 1 << rates.min_log(), m);
        let wout = width_out.unwrap_or(full);
        let min_shift = (win + min_growth[min_growth.len() - 1]) as i64 - wout as i64;
        if min_shift < 0 {
            return Err(BuildErr::NegativeShift { shift: min_shift });
        }

        let n = order as usize;
        let zoh = m == 1;
        let comb_count = if zoh { n - 1 } else { n };
        let comb_widths: Vec<u32> = growth[..comb_count].iter().map(|g| win + g).collect();
        let first_integrator = if zoh { n + 1 } else { n };
        let integrator_widths: Vec<u32> = growth[first_integrator..].iter().map(|g| win + g).collect();

        // Output width and fraction follow the normalized unity gain
        let shape_out = QFormat::from_width(wout, (shape_in.f_width + wout).saturating_sub(win), shape_in.signed);
        tracing::debug!(
            "CicInterpolator: N={} M={} rates 2^{:?}, {} -> {}, combs {:?}, integrators {:?}{}",
            order,
            m,
            rates.logs,
            shape_in,
            shape_out,
            comb_widths,
            integrator_widths,
            if zoh { ", zero-order hold" } else { "" }
        );

        Ok(Self {
            order,
            m,
            rates,
            shape_in,
            shape_out,
            zoh,
            min_shift: min_shift as u32,
            combs: (0..comb_count).map(|_| Delay::new(m as usize)).collect(),
            integrators: [vec![0; integrator_widths.len()], vec![0; integrator_widths.len()]],
            comb_widths,
            integrator_widths,
            held: IqSample::ZERO,
            phase: 0,
            rate_ctl: None,
            out: None,
        })
    }

    /// Drives the interpolation factor (as log2) from the control registers
    pub fn with_control(mut self, f: impl Fn(&ControlRegs) -> u32 + Send + 'static) -> Self {
        self.rate_ctl = Some(Box::new(f));
        self
    }

    pub fn factor(&self) -> u32 {
        1 << self.rates.current
    }

    /// Selects the interpolation factor as log2, clamped to the nearest allowed rate.
    /// A change clears all filter state.
    pub fn set_factor_log(&mut self, log: u32) {
        let log = self.rates.clamp(log);
        if log == self.rates.current {
            return;
        }
        tracing::info!("CicInterpolator: factor {} -> {}", 1u32 << self.rates.current, 1u32 << log);
        self.rates.current = log;
        self.clear_state();
    }

    pub fn set_rate(&mut self, rate: u32) {
        self.set_factor_log(31 - rate.max(1).leading_zeros());
    }

    fn clear_state(&mut self) {
        self.combs.iter_mut().for_each(|d| d.reset());
        self.integrators.iter_mut().for_each(|acc| acc.fill(0));
        self.held = IqSample::ZERO;
        self.phase = 0;
    }

    fn shift(&self) -> u32 {
        self.min_shift + (self.order - 1) * (self.rates.current - self.rates.min_log())
    }

    /// Produces the next upsampled output if one is pending and the output register is free
    fn fill(&mut self) {
        if self.out.is_some() || self.phase == 0 {
            return;
        }
        let first = self.phase == 1 << self.rates.current;
        let u = if first || self.zoh { self.held } else { IqSample::ZERO };
        self.phase -= 1;

        let shift = self.shift();
        let wout = self.shape_out.width();
        let mut y = [0i64; 2];
        for (ch, acc) in self.integrators.iter_mut().enumerate() {
            let mut v = u.channel(ch);
            for (a, &w) in acc.iter_mut().zip(self.integrator_widths.iter()) {
                *a = wrap(*a + v, w);
                v = *a;
            }
            if shift > 0 {
                v = convergent_round(v, shift);
            }
            y[ch] = wrap(v, wout);
        }
        self.out = Some(IqSample::from_array(y));
    }
}

impl Stage for CicInterpolator {
    fn ready(&self) -> bool {
        self.phase == 0
    }

    fn push(&mut self, sample: IqSample) {
        let win = self.shape_in.width();
        let mut v = sample.map(|x| wrap(x, win));
        for (delay, &w) in self.combs.iter_mut().zip(self.comb_widths.iter()) {
            let old = delay.shift(v);
            v = IqSample::new(wrap(v.i - old.i, w), wrap(v.q - old.q, w));
        }
        self.held = v;
        self.phase = 1 << self.rates.current;
        self.fill();
    }

    fn peek(&self) -> Option<IqSample> {
        self.out
    }

    fn pop(&mut self) -> Option<IqSample> {
        self.out.take()
    }

    fn tick(&mut self) {
        self.fill();
    }

    fn reset(&mut self) {
        self.clear_state();
        self.out = None;
    }

    fn configure(&mut self, regs: &ControlRegs) {
        if let Some(f) = &self.rate_ctl {
            let log = f(regs);
            self.set_factor_log(log);
        }
    }

    fn shape_out(&self) -> Option<QFormat> {
        Some(self.shape_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth() {
        // Combs grow by 2^i (the last one by 2^(N-1) for M=1), integrators by 2^(2N-i)(RM)^(i-N)/R
        assert_eq!(cic_growth(3, 8, 1), vec![1, 2, 2, 2, 4, 6]);
        assert_eq!(cic_growth(4, 32, 2), vec![1, 2, 3, 4, 4, 9, 14, 19]);
        assert_eq!(cic_growth(1, 1, 1), vec![0, 0]);
    }

    #[test]
    fn test_noise_gain() {
        // Comb stages: sum of squared binomials
        assert_eq!(noise_gain_sq(2, 4, 1, 4), 2);
        assert_eq!(noise_gain_sq(2, 4, 1, 3), 6);
        assert_eq!(noise_gain_sq(2, 4, 1, 5), 1);
        // Single integrator followed by one comb of delay RM: RM ones
        assert_eq!(noise_gain_sq(1, 4, 2, 1), 8);
    }

    #[test]
    fn test_truncation_schedule() {
        assert_eq!(cic_truncation(4, 4, 2, 8, 12), vec![0, 0, 1, 2, 3, 4, 5, 6, 8]);
        assert_eq!(cic_truncation(4, 4, 2, 8, 8), vec![0, 3, 5, 6, 7, 8, 9, 10, 12]);
        // Full precision output keeps everything
        assert!(cic_truncation(2, 4, 1, 8, 12).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_construction_errors() {
        let fmt = QFormat::sq(0, 7);
        assert!(matches!(CicDecimator::new(5, 1, &[4], fmt, None), Err(BuildErr::InvalidParam { param: "order", .. })));
        assert!(matches!(CicDecimator::new(2, 3, &[4], fmt, None), Err(BuildErr::InvalidParam { param: "m", .. })));
        assert!(matches!(CicDecimator::new(2, 1, &[], fmt, None), Err(BuildErr::EmptyRates)));
        assert!(matches!(CicDecimator::new(2, 1, &[4, 6], fmt, None), Err(BuildErr::RateNotPowerOfTwo { rate: 6 })));
        assert!(matches!(
            CicDecimator::new(4, 2, &[1 << 16], fmt, None),
            Err(BuildErr::WidthExceeded { field: "cic accumulator", .. })
        ));
        // At rate 1 the interpolator grows by 2 bits, so a 20-bit output would need a left shift
        assert!(matches!(CicInterpolator::new(2, 2, &[1, 2], fmt, Some(20)), Err(BuildErr::NegativeShift { .. })));
    }

    #[test]
    fn test_rate_clamp() {
        let mut dec = CicDecimator::new(2, 1, &[4, 8, 16], QFormat::sq(0, 7), Some(8)).unwrap();
        assert_eq!(dec.factor(), 4);
        dec.set_factor_log(9);
        assert_eq!(dec.factor(), 16);
        dec.set_rate(1);
        assert_eq!(dec.factor(), 4);
        dec.set_rate(8);
        assert_eq!(dec.factor(), 8);
    }

    #[test]
    fn test_decimator_dc_gain() {
        // Normalized unity gain: a DC input settles to the same value at the output
        let mut dec = CicDecimator::new(3, 2, &[4, 8], QFormat::sq(0, 7), Some(8)).unwrap();
        dec.set_rate(8);
        let mut last = None;
        for _ in 0..400 {
            dec.push(IqSample::new(100, -100));
            if let Some(s) = dec.pop() {
                last = Some(s);
            }
        }
        let last = last.unwrap();
        assert!((last.i - 100).abs() <= 1 && (last.q + 100).abs() <= 1, "{:?}", last);
    }

    #[test]
    fn test_interpolator_zoh_dc() {
        let mut int = CicInterpolator::new(3, 1, &[1, 2, 4, 8], QFormat::sq(0, 7), Some(8)).unwrap();
        int.set_rate(4);
        let mut outs = vec![];
        for _ in 0..20 {
            assert!(int.ready());
            int.push(IqSample::new(-60, 60));
            while let Some(s) = int.pop() {
                outs.push(s);
                int.tick();
            }
        }
        assert_eq!(outs.len(), 80);
        assert_eq!(outs[79], IqSample::new(-60, 60));
    }
}
