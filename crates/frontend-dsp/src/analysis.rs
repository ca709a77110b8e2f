//! Calibration sweep: frequency response of a chain measured with NCO test tones.
//!
//! For every tone the chain is reset, fed the tone until enough output has
//! been collected, and the first `skip_periods` output periods are discarded
//! while the filters settle. The tone power in the remaining period is read
//! from a Hann-windowed FFT around its peak bin.

use std::f64::consts::PI;
use std::sync::Arc;

use frontend_config::CfgSweep;
use frontend_core::{BuildErr, IqSample, QFormat};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::Chain;
use crate::components::Nco;

/// Phase accumulator width of the sweep oscillator
const SWEEP_PHASE_WIDTH: u32 = 16;
/// Bins on each side of the peak counted as tone power
const TONE_HALF_WIDTH: usize = 3;
/// Upper bound on chain steps per collected output sample
const MAX_STEPS_PER_OUTPUT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub phase_step: u16,
    /// Tone frequency in cycles per input sample
    pub frequency: f64,
    /// Output tone power relative to the input tone power
    pub gain_db: f64,
}

/// Windowed FFT power meter for a fixed period
pub struct ToneMeter {
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    window_energy: f64,
    scratch: Vec<Complex64>,
}

impl ToneMeter {
    pub fn new(period: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(period);
        let window: Vec<f64> = (0..period)
            .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f64 / period as f64).cos())
            .collect();
        let window_energy: f64 = window.iter().map(|w| w * w).sum();
        let scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            window,
            window_energy,
            scratch,
        }
    }

    pub fn period(&self) -> usize {
        self.window.len()
    }

    /// Mean power of the strongest tone in `samples`, in full-scale units squared.
    /// `samples` must hold exactly one period.
    pub fn tone_power(&mut self, samples: &[Complex64]) -> f64 {
        let n = self.period();
        assert_eq!(samples.len(), n);
        let mut buf: Vec<Complex64> = samples.iter().zip(&self.window).map(|(s, w)| *s * *w).collect();
        self.fft.process_with_scratch(&mut buf, &mut self.scratch);

        let peak = buf
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm_sqr().total_cmp(&b.1.norm_sqr()))
            .map(|(k, _)| k)
            .unwrap_or(0);
        let half = TONE_HALF_WIDTH.min(n / 2 - 1);
        let band: f64 = (0..=2 * half)
            .map(|d| buf[(peak + n + d - half) % n].norm_sqr())
            .sum();
        band / (n as f64 * self.window_energy)
    }
}

fn to_complex(samples: &[IqSample], fmt: QFormat) -> Vec<Complex64> {
    samples.iter().map(|s| s.to_complex(fmt)).collect()
}

/// Phase steps of the sweep, evenly spaced from DC up to the positive band edge
pub fn sweep_steps(steps: usize) -> Vec<u16> {
    let half_turn = 1u64 << (SWEEP_PHASE_WIDTH - 1);
    (0..steps as u64).map(|k| (k * half_turn / steps as u64) as u16).collect()
}

/// Measures the response of `chain` at every sweep frequency.
/// The chain keeps its applied controls; it is reset before each tone.
pub fn run_sweep(chain: &mut Chain, shape_in: QFormat, cfg: &CfgSweep) -> Result<Vec<SweepPoint>, BuildErr> {
    let Some(shape_out) = chain.shape_out() else {
        return Err(BuildErr::Inconsistency {
            field: "sweep",
            reason: "chain declares no output format",
        });
    };
    frontend_core::assert_warn!(
        cfg.period.is_power_of_two(),
        "sweep period {} is not a power of two, the FFT takes a slower path",
        cfg.period
    );
    let mut meter = ToneMeter::new(cfg.period);
    let mut nco = Nco::new(SWEEP_PHASE_WIDTH, shape_in.width())?;
    if nco.output_format() != shape_in {
        return Err(BuildErr::Inconsistency {
            field: "sweep",
            reason: "input format is not a pure fraction",
        });
    }
    let amplitude = nco.output_format().to_f64(nco.output_format().max_raw());
    let input_power = amplitude * amplitude;

    let needed = (cfg.skip_periods + 1) * cfg.period;
    let mut points = vec![];
    for step in sweep_steps(cfg.steps) {
        chain.reset();
        nco.reset();
        nco.set_step(step as u64);

        let mut collected = Vec::with_capacity(needed);
        let mut pending: Option<IqSample> = None;
        let mut budget = needed * MAX_STEPS_PER_OUTPUT;
        while collected.len() < needed && budget > 0 {
            let sample = *pending.get_or_insert_with(|| nco.next());
            let (accepted, out) = chain.step(Some(sample), true);
            if accepted {
                pending = None;
            }
            collected.extend(out);
            budget -= 1;
        }

        let frequency = step as f64 / (1u64 << SWEEP_PHASE_WIDTH) as f64;
        let gain_db = if collected.len() < needed {
            tracing::warn!("sweep: chain produced only {} of {} samples at step {}", collected.len(), needed, step);
            f64::NEG_INFINITY
        } else {
            let period = to_complex(&collected[cfg.skip_periods * cfg.period..needed], shape_out);
            10.0 * (meter.tone_power(&period) / input_power).log10()
        };
        tracing::debug!("sweep: step {} f={:.4} gain {:.2} dB", step, frequency, gain_db);
        points.push(SweepPoint {
            phase_step: step,
            frequency,
            gain_db,
        });
    }
    Ok(points)
}
