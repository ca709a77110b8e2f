//! Serial multiply-accumulate FIR.
//!
//! One multiplier per engine is time-shared across taps: for every accepted
//! sample, a modulo counter walks the coefficient ROM and the sample window,
//! accumulating one product per step. Symmetric taps are folded by pre-adding
//! mirrored window samples, halving the number of products. If one engine
//! cannot cover all taps within `overclock` steps, the taps are split into
//! ranges over several engines whose partial sums are added at the end.

use std::collections::VecDeque;

use frontend_core::{BuildErr, IqSample, ModCounter, QFormat};

use super::coeffs::Taps;
use super::fir::ArmKernel;

/// 16x16 multiplier, the shared multiply resource of the MAC kernels
#[derive(Debug, Clone, Copy)]
pub struct Multiplier16 {
    a_fmt: QFormat,
    b_fmt: QFormat,
}

impl Multiplier16 {
    pub const MAX_WIDTH: u32 = 16;

    pub fn new(a_fmt: QFormat, b_fmt: QFormat) -> Result<Self, BuildErr> {
        frontend_core::expect_width!(a_fmt.width(), Self::MAX_WIDTH, "multiplier operand a")?;
        frontend_core::expect_width!(b_fmt.width(), Self::MAX_WIDTH, "multiplier operand b")?;
        Ok(Self { a_fmt, b_fmt })
    }

    pub fn product_format(&self) -> QFormat {
        self.a_fmt.mul_format(&self.b_fmt)
    }

    #[inline]
    pub fn multiply(&self, a: i64, b: i64) -> i64 {
        debug_assert!(self.a_fmt.contains(a) && self.b_fmt.contains(b));
        a * b
    }
}

#[derive(Debug, Clone)]
struct MacEngine {
    /// First ROM entry handled by this engine
    start: usize,
    end: usize,
    acc: [i64; 2],
}

/// Serial MAC FIR kernel
pub struct MacFir {
    /// Coefficient ROM, folded to the first half for symmetric taps
    rom: Vec<i64>,
    len: usize,
    symmetric: bool,
    engines: Vec<MacEngine>,
    counter: ModCounter,
    mult: Multiplier16,
    /// Newest sample first
    window: VecDeque<IqSample>,
    busy: bool,
    out: Option<IqSample>,
}

impl MacFir {
    pub fn new(taps: &Taps, shape_in: QFormat, overclock: usize) -> Result<Self, BuildErr> {
        frontend_core::expect_param!(overclock, overclock > 0)?;
        let raw = taps.raw();
        let len = raw.len();
        let symmetric = taps.is_symmetric();
        let slots = if symmetric { len.div_ceil(2) } else { len };
        let rom = raw[..slots].to_vec();

        // Folding adds one bit to the multiplier operand
        let operand_fmt = QFormat::from_width(shape_in.width() + symmetric as u32, shape_in.f_width, shape_in.signed);
        let mult = Multiplier16::new(operand_fmt, taps.format())?;

        let engine_count = slots.div_ceil(overclock);
        let per_engine = slots.min(overclock);
        let engines = (0..engine_count)
            .map(|e| MacEngine {
                start: e * overclock,
                end: ((e + 1) * overclock).min(slots),
                acc: [0; 2],
            })
            .collect();

        tracing::debug!(
            "MacFir: {} taps ({} slots{}), {} engines x {} steps, product {}",
            len,
            slots,
            if symmetric { ", folded" } else { "" },
            engine_count,
            per_engine,
            mult.product_format()
        );

        Ok(Self {
            rom,
            len,
            symmetric,
            engines,
            counter: ModCounter::new(per_engine),
            mult,
            window: std::iter::repeat_n(IqSample::ZERO, len).collect(),
            busy: false,
            out: None,
        })
    }

    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    /// Steps between accepting a sample and presenting its result
    pub fn latency(&self) -> usize {
        self.counter.modulus()
    }

    /// Window operand for ROM entry `k`: the sample, or the folded pair
    fn operand(&self, k: usize) -> IqSample {
        let a = self.window[k];
        let mirror = self.len - 1 - k;
        if self.symmetric && mirror != k {
            let b = self.window[mirror];
            IqSample::new(a.i + b.i, a.q + b.q)
        } else {
            a
        }
    }
}

impl ArmKernel for MacFir {
    fn ready(&self) -> bool {
        !self.busy && self.out.is_none()
    }

    fn push(&mut self, x: IqSample, carry: IqSample) {
        self.window.pop_back();
        self.window.push_front(x);
        for (e, engine) in self.engines.iter_mut().enumerate() {
            engine.acc = if e == 0 { carry.as_array() } else { [0; 2] };
        }
        self.counter.reset();
        self.busy = true;
    }

    fn peek(&self) -> Option<IqSample> {
        self.out
    }

    fn pop(&mut self) -> Option<IqSample> {
        self.out.take()
    }

    fn tick(&mut self) {
        if !self.busy {
            return;
        }
        let slot = self.counter.value();
        for e in 0..self.engines.len() {
            let k = self.engines[e].start + slot;
            if k >= self.engines[e].end {
                continue;
            }
            let x = self.operand(k);
            let coeff = self.rom[k];
            let engine = &mut self.engines[e];
            engine.acc[0] += self.mult.multiply(x.i, coeff);
            engine.acc[1] += self.mult.multiply(x.q, coeff);
        }
        if self.counter.incr() {
            let sum = self
                .engines
                .iter()
                .fold([0i64; 2], |s, e| [s[0] + e.acc[0], s[1] + e.acc[1]]);
            self.out = Some(IqSample::from_array(sum));
            self.busy = false;
        }
    }

    fn reset(&mut self) {
        self.window.iter_mut().for_each(|s| *s = IqSample::ZERO);
        self.engines.iter_mut().for_each(|e| e.acc = [0; 2]);
        self.counter.reset();
        self.busy = false;
        self.out = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::fir::TransposedFir;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Pushes `xs` through a kernel one sample at a time, stepping until each result appears
    fn drive(kernel: &mut dyn ArmKernel, xs: &[IqSample]) -> (Vec<IqSample>, Vec<usize>) {
        let mut out = vec![];
        let mut latencies = vec![];
        for &x in xs {
            assert!(kernel.ready());
            kernel.push(x, IqSample::ZERO);
            let mut steps = 0;
            loop {
                kernel.tick();
                steps += 1;
                if let Some(y) = kernel.pop() {
                    out.push(y);
                    break;
                }
                assert!(steps < 100);
            }
            latencies.push(steps);
        }
        (out, latencies)
    }

    fn random_input(n: usize, seed: u64) -> Vec<IqSample> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| IqSample::new(rng.random_range(-2048..2048), rng.random_range(-2048..2048)))
            .collect()
    }

    #[test]
    fn test_mac_matches_transposed() {
        let hb1 = [-2, 5, -10, 18, -30, 53, -101, 323, 323, -101, 53, -30, 18, -10, 5, -2];
        let cases = [
            Taps::from_ints(&hb1, 512).unwrap(),
            Taps::from_ints(&[-1, 0, 6, 0, -1], 8).unwrap(),
            Taps::from_ints(&[3, -7, 11, 4], 16).unwrap(),
        ];
        let xs = random_input(64, 3);
        for taps in cases {
            let mut reference = TransposedFir::new(&taps, QFormat::sq(0, 11));
            let (expected, _) = drive(&mut reference, &xs);
            for overclock in [1, 2, 3, 4, 8, 16] {
                let mut mac = MacFir::new(&taps, QFormat::sq(0, 11), overclock).unwrap();
                let (got, latencies) = drive(&mut mac, &xs);
                assert_eq!(got, expected, "taps {:?} overclock {}", taps.raw(), overclock);
                assert!(latencies.iter().all(|&l| l == mac.latency()));
                assert!(mac.latency() <= overclock);
            }
        }
    }

    #[test]
    fn test_engine_split() {
        let taps = Taps::from_ints(&[-2, 5, -10, 18, -30, 53, -101, 323, 323, -101, 53, -30, 18, -10, 5, -2], 512).unwrap();
        // 8 folded slots
        let mac = MacFir::new(&taps, QFormat::sq(0, 11), 8).unwrap();
        assert_eq!(mac.engine_count(), 1);
        assert_eq!(mac.latency(), 8);
        let mac = MacFir::new(&taps, QFormat::sq(0, 11), 3).unwrap();
        assert_eq!(mac.engine_count(), 3);
        assert_eq!(mac.latency(), 3);
    }

    #[test]
    fn test_carry_is_added() {
        let taps = Taps::from_ints(&[1, 2, 1], 4).unwrap();
        let mut mac = MacFir::new(&taps, QFormat::sq(0, 7), 2).unwrap();
        mac.push(IqSample::new(10, -10), IqSample::new(1000, 7));
        while mac.peek().is_none() {
            mac.tick();
        }
        assert_eq!(mac.pop(), Some(IqSample::new(1010, -3)));
    }

    #[test]
    fn test_width_limits() {
        let taps = Taps::from_ints(&[1, 2, 1], 4).unwrap();
        // Folding a 16-bit input needs a 17-bit operand
        assert_eq!(
            MacFir::new(&taps, QFormat::sq(0, 15), 4).err(),
            Some(BuildErr::WidthExceeded { field: "multiplier operand a", width: 17, max: 16 })
        );
        let wide = Taps::from_ints(&[1, 2, 3], 1 << 20).unwrap();
        assert!(matches!(
            MacFir::new(&wide, QFormat::sq(0, 7), 4),
            Err(BuildErr::WidthExceeded { field: "multiplier operand b", .. })
        ));
        assert!(MacFir::new(&taps, QFormat::sq(0, 7), 0).is_err());
    }
}
