use as_any::AsAny;
use frontend_config::ControlRegs;
use frontend_core::IqSample;
use frontend_dsp::Chain;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::sink::Sink;

const SINK: &str = "sink";
/// Steps without input after which a chain counts as drained
const DRAIN_STEPS: usize = 512;

/// Drives a chain terminated by a [`Sink`]
/// Supports input gaps and stalling sinks
pub struct ChainTest {
    pub chain: Chain,
}

impl ChainTest {
    pub fn new(chain: Chain) -> Self {
        Self::with_sink(chain, Sink::new())
    }

    pub fn with_sink(mut chain: Chain, sink: Sink) -> Self {
        chain.add_stage(SINK, Box::new(sink));
        Self { chain }
    }

    pub fn controls(&mut self, regs: ControlRegs) {
        self.chain.write_controls(regs);
        // Let the registers pass the resynchronization step
        self.chain.step(None, true);
    }

    /// Feeds `inputs`, offering a sample only on steps where `gaps` is false,
    /// then steps until the chain is drained
    pub fn feed(&mut self, inputs: &[IqSample], mut gaps: impl FnMut(usize) -> bool) {
        let mut pending = inputs.iter().peekable();
        let mut step = 0;
        while let Some(&&sample) = pending.peek() {
            let offer = if gaps(step) { None } else { Some(sample) };
            let (accepted, _) = self.chain.step(offer, true);
            if accepted {
                pending.next();
            }
            step += 1;
        }
        for _ in 0..DRAIN_STEPS {
            self.chain.step(None, true);
        }
    }

    pub fn run(&mut self, inputs: &[IqSample]) -> Vec<IqSample> {
        self.feed(inputs, |_| false);
        self.take_output()
    }

    pub fn take_output(&mut self) -> Vec<IqSample> {
        let Some(stage) = self.chain.get_stage(SINK) else {
            panic!("chain has no sink");
        };
        stage
            .as_any_mut()
            .downcast_mut::<Sink>()
            .map(Sink::take_samples)
            .unwrap_or_default()
    }
}

/// Bell-shaped noise scaled so its largest magnitude is `2^(width-1) - 1`
pub fn gaussian_input(n: usize, width: u32, seed: u64) -> Vec<i64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let raw: Vec<f64> = (0..n)
        .map(|_| (0..4).map(|_| rng.random_range(-1.0f64..1.0)).sum())
        .collect();
    let peak = raw.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let full = ((1i64 << (width - 1)) - 1) as f64;
    raw.iter().map(|v| (v / peak * full).round() as i64).collect()
}

/// Random on/off pattern, true with probability `p`
pub fn stall_pattern(len: usize, p: f64, seed: u64) -> Vec<bool> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_bool(p)).collect()
}

