//! Numerically controlled oscillator and the DAC test-tone override.

use std::f64::consts::FRAC_PI_4;

use frontend_config::ControlRegs;
use frontend_core::{BuildErr, IqSample, QFormat};

use crate::Stage;

/// Phase accumulator driving an eighth-wave (cos, sin) table.
///
/// Only the first octant is stored. The top three phase bits (sign, quadrant,
/// octant) select how the table entry is reflected into the full circle.
#[derive(Debug, Clone)]
pub struct Nco {
    phase_width: u32,
    addr_width: u32,
    phase: u64,
    step: u64,
    lut: Vec<(i64, i64)>,
    fmt: QFormat,
}

impl Nco {
    pub fn new(phase_width: u32, output_width: u32) -> Result<Self, BuildErr> {
        frontend_core::expect_param!(output_width, (3..=16).contains(&output_width))?;
        let addr_width = output_width - 2;
        frontend_core::expect_param!(phase_width, phase_width >= addr_width + 3 && phase_width <= 32)?;

        let depth = 1usize << addr_width;
        let scale = ((1i64 << (output_width - 1)) - 1) as f64;
        // Entries sit at the centre of each table step
        let lut = (0..depth)
            .map(|k| {
                let x = (k as f64 + 0.5) * FRAC_PI_4 / depth as f64;
                ((scale * x.cos()).round() as i64, (scale * x.sin()).round() as i64)
            })
            .collect();

        tracing::debug!("Nco: {}-bit phase, {}-bit output, {} table entries", phase_width, output_width, depth);
        Ok(Self {
            phase_width,
            addr_width,
            phase: 0,
            step: 0,
            lut,
            fmt: QFormat::sq(0, output_width - 1),
        })
    }

    pub fn output_format(&self) -> QFormat {
        self.fmt
    }

    pub fn phase(&self) -> u64 {
        self.phase
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    fn phase_mask(&self) -> u64 {
        (1u64 << self.phase_width) - 1
    }

    pub fn set_phase(&mut self, phase: u64) {
        self.phase = phase & self.phase_mask();
    }

    /// Sets the per-sample phase increment. Steps wrap modulo the accumulator
    /// width, so a negative step is its two's complement.
    pub fn set_step(&mut self, step: u64) {
        self.step = step & self.phase_mask();
    }

    /// (cos, sin) of `phase` as I and Q
    pub fn lookup(&self, phase: u64) -> IqSample {
        let pw = self.phase_width;
        let bit = |n: u32| (phase >> n) & 1 == 1;
        let (s, q, o) = (bit(pw - 1), bit(pw - 2), bit(pw - 3));

        let depth_mask = (1u64 << self.addr_width) - 1;
        let mut addr = (phase >> (pw - 3 - self.addr_width)) & depth_mask;
        if o {
            addr ^= depth_mask;
        }
        let (c, sn) = self.lut[addr as usize];

        let (c, sn) = if q ^ o { (sn, c) } else { (c, sn) };
        let c = if s ^ q { -c } else { c };
        let sn = if s { -sn } else { sn };
        IqSample::new(c, sn)
    }

    /// Returns the output for the current phase, then advances by one step
    pub fn next(&mut self) -> IqSample {
        let out = self.lookup(self.phase);
        self.phase = (self.phase + self.step) & self.phase_mask();
        out
    }

    pub fn reset(&mut self) {
        self.phase = 0;
    }
}

/// Replaces the transmit stream with the NCO tone while `nco_enable` is set.
/// The upstream chain is drained and its samples discarded meanwhile.
pub struct ToneOverride {
    nco: Nco,
    enable: bool,
    shape_in: QFormat,
    out: Option<IqSample>,
}

impl ToneOverride {
    pub fn new(nco: Nco, shape_in: QFormat) -> Result<Self, BuildErr> {
        if nco.output_format() != shape_in {
            return Err(BuildErr::Inconsistency {
                field: "tone override",
                reason: "tone and stream formats differ",
            });
        }
        Ok(Self {
            nco,
            enable: false,
            shape_in,
            out: None,
        })
    }

    pub fn nco(&self) -> &Nco {
        &self.nco
    }

    pub fn set_enable(&mut self, enable: bool) {
        if enable != self.enable {
            tracing::info!("ToneOverride: tone {}", if enable { "on" } else { "off" });
        }
        self.enable = enable;
    }
}

impl Stage for ToneOverride {
    fn ready(&self) -> bool {
        self.enable || self.out.is_none()
    }

    fn push(&mut self, sample: IqSample) {
        if self.enable {
            tracing::trace!("ToneOverride: dropping {:?}", sample);
        } else {
            self.out = Some(sample);
        }
    }

    fn peek(&self) -> Option<IqSample> {
        if self.enable { Some(self.nco.lookup(self.nco.phase())) } else { self.out }
    }

    fn pop(&mut self) -> Option<IqSample> {
        if self.enable { Some(self.nco.next()) } else { self.out.take() }
    }

    fn reset(&mut self) {
        self.nco.reset();
        self.out = None;
    }

    fn configure(&mut self, regs: &ControlRegs) {
        self.set_enable(regs.nco_enable);
        self.nco.set_step(regs.phase_step as u64);
    }

    fn shape_out(&self) -> Option<QFormat> {
        Some(self.shape_in)
    }
}
