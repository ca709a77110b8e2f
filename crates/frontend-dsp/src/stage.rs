use as_any::AsAny;
use frontend_config::ControlRegs;
use frontend_core::stream::{DomainBridge, SkidBuffer, StreamStage};
use frontend_core::{IqSample, QFormat};

/// Decodes a stage setting from the control registers
pub type ControlFn<T> = Box<dyn Fn(&ControlRegs) -> T + Send>;

/// Trait for IQ stages
/// Used by Chain for stepping stages and moving samples between them
pub trait Stage: Send + AsAny {
    /// Whether the stage accepts a sample in the current step
    fn ready(&self) -> bool;

    /// Accepts a sample. Only valid when `ready()` returned true this step.
    fn push(&mut self, sample: IqSample);

    /// The sample currently offered on the output, if any
    fn peek(&self) -> Option<IqSample>;

    /// Takes the offered sample
    fn pop(&mut self) -> Option<IqSample>;

    /// Called at the end of each step
    fn tick(&mut self) {}

    /// Drops all samples in flight and clears internal state
    fn reset(&mut self);

    /// Applies freshly latched control registers (optional)
    fn configure(&mut self, _regs: &ControlRegs) {}

    /// Output sample format, for stages that define one
    fn shape_out(&self) -> Option<QFormat> {
        None
    }
}

impl Stage for SkidBuffer<IqSample> {
    fn ready(&self) -> bool {
        StreamStage::ready(self)
    }
    fn push(&mut self, sample: IqSample) {
        StreamStage::push(self, sample)
    }
    fn peek(&self) -> Option<IqSample> {
        StreamStage::peek(self).copied()
    }
    fn pop(&mut self) -> Option<IqSample> {
        StreamStage::pop(self)
    }
    fn tick(&mut self) {
        StreamStage::tick(self)
    }
    fn reset(&mut self) {
        self.clear();
    }
}

impl Stage for DomainBridge<IqSample> {
    fn ready(&self) -> bool {
        StreamStage::ready(self)
    }
    fn push(&mut self, sample: IqSample) {
        StreamStage::push(self, sample)
    }
    fn peek(&self) -> Option<IqSample> {
        StreamStage::peek(self).copied()
    }
    fn pop(&mut self) -> Option<IqSample> {
        StreamStage::pop(self)
    }
    fn tick(&mut self) {
        StreamStage::tick(self)
    }
    fn reset(&mut self) {
        self.clear();
    }
}
