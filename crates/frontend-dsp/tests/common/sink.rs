use frontend_core::{IqSample, QFormat};
use frontend_dsp::Stage;

/// A chain stage for testing purposes
/// Collects all received samples for later inspection, optionally refusing
/// input on selected steps to emulate a stalling consumer
pub struct Sink {
    samples: Vec<IqSample>,
    stalls: Vec<bool>,
    step: usize,
}

impl Sink {
    pub fn new() -> Self {
        Self {
            samples: vec![],
            stalls: vec![],
            step: 0,
        }
    }

    /// Refuses input on every step where `stalls[step % len]` is set
    pub fn with_stalls(stalls: Vec<bool>) -> Self {
        Self {
            samples: vec![],
            stalls,
            step: 0,
        }
    }

    pub fn take_samples(&mut self) -> Vec<IqSample> {
        std::mem::take(&mut self.samples)
    }
}

impl Stage for Sink {
    fn ready(&self) -> bool {
        self.stalls.is_empty() || !self.stalls[self.step % self.stalls.len()]
    }

    fn push(&mut self, sample: IqSample) {
        tracing::trace!("sink: {:?}", sample);
        self.samples.push(sample);
    }

    fn peek(&self) -> Option<IqSample> {
        None
    }

    fn pop(&mut self) -> Option<IqSample> {
        None
    }

    fn tick(&mut self) {
        self.step += 1;
    }

    fn reset(&mut self) {
        self.samples.clear();
        self.step = 0;
    }

    fn shape_out(&self) -> Option<QFormat> {
        None
    }
}
