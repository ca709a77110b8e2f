//! Valid/ready stream transport.
//!
//! A stream moves one payload from a producer to a consumer when the producer
//! holds a payload (`peek` is `Some`) and the consumer is `ready` in the same
//! step. The producer keeps its payload until it is taken, so any number of
//! stall steps neither drops nor duplicates data.

pub mod bridge;
pub mod mux;
pub mod skid;

pub use bridge::{BridgeReader, BridgeWriter, DomainBridge};
pub use mux::{StreamDemux, StreamMux};
pub use skid::SkidBuffer;

/// A stage with one input stream and one output stream
pub trait StreamStage {
    type In;
    type Out;

    /// Whether the stage accepts a payload in the current step
    fn ready(&self) -> bool;

    /// Accepts a payload. Only valid when `ready()` returned true this step.
    fn push(&mut self, item: Self::In);

    /// The payload currently offered on the output, if any
    fn peek(&self) -> Option<&Self::Out>;

    /// Takes the offered payload
    fn pop(&mut self) -> Option<Self::Out>;

    /// End-of-step update of registered state
    fn tick(&mut self) {}
}

/// Moves one payload from `up` to `down` if both sides agree.
/// Returns true if a transfer happened.
pub fn transfer<U, D>(up: &mut U, down: &mut D) -> bool
where
    U: StreamStage + ?Sized,
    D: StreamStage<In = U::Out> + ?Sized,
{
    if up.peek().is_none() || !down.ready() {
        return false;
    }
    match up.pop() {
        Some(item) => {
            down.push(item);
            true
        }
        None => false,
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::{Collector, Source};
    use super::*;

    #[test]
    fn test_transfer_requires_both_sides() {
        let mut src = Source::new([1, 2]);
        let mut dst = Collector::new();
        dst.ready = false;
        src.offer();
        assert!(!transfer(&mut src, &mut dst));
        assert_eq!(src.peek(), Some(&1));
        dst.ready = true;
        assert!(transfer(&mut src, &mut dst));
        assert!(!transfer(&mut src, &mut dst));
        assert_eq!(dst.items, vec![1]);
    }
}
