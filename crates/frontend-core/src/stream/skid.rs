use std::collections::VecDeque;

use super::StreamStage;

/// Skid buffer: breaks the combinational ready path between two stages.
///
/// Ready is registered, i.e. computed at the end of the previous step. The
/// producer may therefore push once more after the consumer stalls; that
/// payload lands in the extra slot and is drained first when the consumer
/// resumes.
pub struct SkidBuffer<T> {
    buf: VecDeque<T>,
    ready_q: bool,
}

impl<T> SkidBuffer<T> {
    const SLOTS: usize = 2;

    pub fn new() -> Self {
        Self {
            buf: VecDeque::with_capacity(Self::SLOTS),
            ready_q: true,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.ready_q = true;
    }
}

impl<T> Default for SkidBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StreamStage for SkidBuffer<T> {
    type In = T;
    type Out = T;

    fn ready(&self) -> bool {
        self.ready_q
    }

    fn push(&mut self, item: T) {
        debug_assert!(self.ready_q, "SkidBuffer: push while not ready");
        if self.buf.len() >= Self::SLOTS {
            tracing::warn!("SkidBuffer: overflow, payload dropped");
            return;
        }
        self.buf.push_back(item);
    }

    fn peek(&self) -> Option<&T> {
        self.buf.front()
    }

    fn pop(&mut self) -> Option<T> {
        self.buf.pop_front()
    }

    fn tick(&mut self) {
        self.ready_q = self.buf.len() < Self::SLOTS;
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{Collector, Source};
    use super::super::transfer;
    use super::*;

    /// Runs src -> skid -> dst with a ready pattern on dst, downstream first
    fn run(pattern: impl Fn(usize) -> bool, n: usize) -> (Vec<u32>, usize) {
        let mut src = Source::new(0..n as u32);
        let mut skid = SkidBuffer::new();
        let mut dst = Collector::new();
        let mut max_len = 0;
        for step in 0..10 * n {
            src.offer();
            dst.ready = pattern(step);
            transfer(&mut skid, &mut dst);
            transfer(&mut src, &mut skid);
            max_len = max_len.max(skid.len());
            skid.tick();
            if dst.items.len() == n {
                break;
            }
        }
        (dst.items, max_len)
    }

    #[test]
    fn test_skid_full_throughput() {
        let (items, max_len) = run(|_| true, 100);
        assert_eq!(items, (0..100).collect::<Vec<_>>());
        assert!(max_len <= 1);
    }

    #[test]
    fn test_skid_lossless_under_stalls() {
        let (items, max_len) = run(|step| step % 3 != 1 && step % 7 != 0, 200);
        assert_eq!(items, (0..200).collect::<Vec<_>>());
        assert!(max_len <= 2);
    }

    #[test]
    fn test_skid_registered_ready() {
        let mut skid = SkidBuffer::new();
        skid.push(1);
        skid.push(2);
        // Ready only drops at the end of the step
        assert!(skid.ready());
        skid.tick();
        assert!(!skid.ready());
        assert_eq!(skid.pop(), Some(1));
        assert!(!skid.ready());
        skid.tick();
        assert!(skid.ready());
        assert_eq!(skid.pop(), Some(2));
    }
}
