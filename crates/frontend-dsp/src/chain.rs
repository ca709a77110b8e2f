use frontend_config::{ControlRegs, SharedConfig};
use frontend_core::{IqSample, QFormat};

use crate::Stage;

/// Consecutive steps without output after which `run` considers the chain drained
const FLUSH_IDLE_STEPS: usize = 256;
/// Upper bound on drain steps. A free-running source such as the tone override never goes idle.
pub const FLUSH_MAX_STEPS: usize = 8192;

struct ChainEntry {
    name: String,
    stage: Box<dyn Stage>,
}

/// Linear pipeline of stages driven by a single step.
///
/// Within a step, transfers are resolved from the output end towards the
/// input, so a stage that hands its sample downstream can accept a new one
/// in the same step. Control registers pass through a one-step
/// resynchronization register before the stages see them.
pub struct Chain {
    name: &'static str,
    stages: Vec<ChainEntry>,

    /// Control registers as last written by the host side
    controls_d: Option<ControlRegs>,
    /// Control registers currently applied to the stages
    controls_q: Option<ControlRegs>,

    steps: u64,
}

impl Chain {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stages: vec![],
            controls_d: None,
            controls_q: None,
            steps: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Appends a stage at the output end of the chain
    pub fn add_stage(&mut self, name: &str, stage: Box<dyn Stage>) {
        tracing::debug!("{}: add_stage {} at {}", self.name, name, self.stages.len());
        assert!(self.get_stage(name).is_none(), "Stage already exists: {}", name);
        self.stages.push(ChainEntry { name: name.to_string(), stage });
    }

    /// Builder flavour of `add_stage`
    pub fn with_stage<S: Stage + 'static>(mut self, name: &str, stage: S) -> Self {
        self.add_stage(name, Box::new(stage));
        self
    }

    /// Returns a mut ref to the stage registered under `name`
    pub fn get_stage(&mut self, name: &str) -> Option<&mut dyn Stage> {
        self.stages
            .iter_mut()
            .find(|e| e.name == name)
            .map(|e| e.stage.as_mut())
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Output format of the last stage that declares one
    pub fn shape_out(&self) -> Option<QFormat> {
        self.stages.iter().rev().find_map(|e| e.stage.shape_out())
    }

    /// Posts new control register contents. They reach the stages at the start of the next step.
    pub fn write_controls(&mut self, regs: ControlRegs) {
        self.controls_d = Some(regs);
    }

    /// Posts the current contents of the shared control registers
    pub fn sync_controls(&mut self, config: &SharedConfig) {
        self.write_controls(config.controls());
    }

    fn apply_controls(&mut self) {
        let Some(regs) = self.controls_d else {
            return;
        };
        if self.controls_q == Some(regs) {
            return;
        }
        tracing::info!(step = self.steps, "{}: applying controls {:?}", self.name, regs);
        for entry in self.stages.iter_mut() {
            entry.stage.configure(&regs);
        }
        self.controls_q = Some(regs);
    }

    /// Whether the chain accepts an input sample in the current step
    pub fn ready(&self) -> bool {
        self.stages.first().is_some_and(|e| e.stage.ready())
    }

    /// Advances the chain by one step.
    /// Returns whether `input` was accepted, and the sample taken from the output if `out_ready`.
    pub fn step(&mut self, input: Option<IqSample>, out_ready: bool) -> (bool, Option<IqSample>) {
        self.apply_controls();

        let Some(last) = self.stages.last_mut() else {
            return (false, None);
        };
        let output = if out_ready { last.stage.pop() } else { None };
        if let Some(s) = output {
            tracing::trace!(step = self.steps, "<- {}: {:?}", self.name, s);
        }

        // Downstream first
        for i in (1..self.stages.len()).rev() {
            let (up, down) = self.stages.split_at_mut(i);
            let up = &mut up[i - 1];
            let down = &mut down[0];
            if up.stage.peek().is_none() || !down.stage.ready() {
                continue;
            }
            if let Some(s) = up.stage.pop() {
                tracing::trace!(step = self.steps, "{} -> {}: {:?}", up.name, down.name, s);
                down.stage.push(s);
            }
        }

        let mut accepted = false;
        if let Some(s) = input {
            if self.stages[0].stage.ready() {
                tracing::trace!(step = self.steps, "-> {}: {:?}", self.name, s);
                self.stages[0].stage.push(s);
                accepted = true;
            }
        }

        for entry in self.stages.iter_mut() {
            entry.stage.tick();
        }
        self.steps += 1;

        (accepted, output)
    }

    /// Feeds all `inputs` with the output always ready, then drains the chain
    pub fn run(&mut self, inputs: impl IntoIterator<Item = IqSample>) -> Vec<IqSample> {
        self.run_with_stalls(inputs, |_| true)
    }

    /// Like `run`, but the output is only ready on steps where `out_ready(step)` holds
    pub fn run_with_stalls(
        &mut self,
        inputs: impl IntoIterator<Item = IqSample>,
        mut out_ready: impl FnMut(u64) -> bool,
    ) -> Vec<IqSample> {
        let mut outputs = vec![];
        let mut pending = inputs.into_iter().peekable();

        while let Some(&sample) = pending.peek() {
            let (accepted, out) = self.step(Some(sample), out_ready(self.steps));
            if accepted {
                pending.next();
            }
            outputs.extend(out);
        }

        let mut idle = 0;
        let mut flushed = 0;
        while idle < FLUSH_IDLE_STEPS {
            if flushed == FLUSH_MAX_STEPS {
                tracing::warn!("{}: still producing output after {} drain steps, stopping", self.name, flushed);
                break;
            }
            let (_, out) = self.step(None, out_ready(self.steps));
            match out {
                Some(s) => {
                    outputs.push(s);
                    idle = 0;
                }
                None => idle += 1,
            }
            flushed += 1;
        }
        tracing::debug!("{}: run produced {} samples in {} steps", self.name, outputs.len(), self.steps);
        outputs
    }

    /// Resets every stage. Applied controls are kept.
    pub fn reset(&mut self) {
        tracing::debug!("{}: reset", self.name);
        for entry in self.stages.iter_mut() {
            entry.stage.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use as_any::AsAny;
    use frontend_core::stream::SkidBuffer;

    /// Stage that counts configure calls and negates samples
    struct Negate {
        out: Option<IqSample>,
        configured: usize,
    }

    impl Stage for Negate {
        fn ready(&self) -> bool {
            self.out.is_none()
        }
        fn push(&mut self, sample: IqSample) {
            self.out = Some(sample.map(|v| -v));
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
        fn configure(&mut self, _regs: &ControlRegs) {
            self.configured += 1;
        }
    }

    fn build() -> Chain {
        Chain::new("test")
            .with_stage("neg", Negate { out: None, configured: 0 })
            .with_stage("skid", SkidBuffer::<IqSample>::new())
    }

    #[test]
    fn test_chain_order_and_latency() {
        let mut chain = build();
        let input: Vec<IqSample> = (0..10).map(|v| IqSample::new(v, 2 * v)).collect();
        let out = chain.run(input.clone());
        let expected: Vec<IqSample> = input.iter().map(|s| s.map(|v| -v)).collect();
        assert_eq!(out, expected);

        // One step per stage before the first sample appears
        let mut chain = build();
        assert_eq!(chain.step(Some(IqSample::new(1, 1)), true), (true, None));
        assert_eq!(chain.step(None, true), (false, None));
        assert_eq!(chain.step(None, true), (false, Some(IqSample::new(-1, -1))));
    }

    #[test]
    fn test_controls_applied_once_per_change() {
        let mut chain = build();
        let regs = ControlRegs { rx_decim: 2, ..Default::default() };
        chain.write_controls(regs);
        chain.step(None, true);
        chain.write_controls(regs);
        chain.step(None, true);
        chain.write_controls(ControlRegs::default());
        chain.step(None, true);

        let stage = chain.get_stage("neg").unwrap();
        let neg = stage.as_any_mut().downcast_mut::<Negate>().unwrap();
        assert_eq!(neg.configured, 2);
    }

    #[test]
    fn test_stalled_output_is_lossless() {
        let mut chain = build();
        let input: Vec<IqSample> = (0..50).map(|v| IqSample::new(v, 0)).collect();
        let out = chain.run_with_stalls(input, |step| step % 3 == 0);
        assert_eq!(out.len(), 50);
        assert!(out.iter().enumerate().all(|(n, s)| s.i == -(n as i64)));
    }
}
