use super::StreamStage;

/// Serializes `[T; N]` payloads into `T`, emitting slots in index order.
/// A new array is accepted only after every slot of the previous one was taken.
pub struct StreamMux<T, const N: usize> {
    buf: Option<[T; N]>,
    idx: usize,
}

impl<T: Clone, const N: usize> StreamMux<T, N> {
    pub fn new() -> Self {
        assert!(N > 0);
        Self { buf: None, idx: 0 }
    }

    /// Index of the slot currently offered
    pub fn slot(&self) -> usize {
        self.idx
    }

    pub fn clear(&mut self) {
        self.buf = None;
        self.idx = 0;
    }
}

impl<T: Clone, const N: usize> Default for StreamMux<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, const N: usize> StreamStage for StreamMux<T, N> {
    type In = [T; N];
    type Out = T;

    fn ready(&self) -> bool {
        self.buf.is_none()
    }

    fn push(&mut self, item: [T; N]) {
        debug_assert!(self.buf.is_none(), "StreamMux: push while not ready");
        self.buf = Some(item);
        self.idx = 0;
    }

    fn peek(&self) -> Option<&T> {
        self.buf.as_ref().map(|arr| &arr[self.idx])
    }

    fn pop(&mut self) -> Option<T> {
        let item = self.buf.as_ref()?[self.idx].clone();
        self.idx += 1;
        if self.idx == N {
            self.buf = None;
            self.idx = 0;
        }
        Some(item)
    }
}

/// Collects `N` consecutive payloads into one `[T; N]`.
/// An array is emitted only when every slot has been filled.
pub struct StreamDemux<T, const N: usize> {
    slots: Vec<T>,
    out: Option<[T; N]>,
}

impl<T, const N: usize> StreamDemux<T, N> {
    pub fn new() -> Self {
        assert!(N > 0);
        Self {
            slots: Vec::with_capacity(N),
            out: None,
        }
    }

    /// Number of slots filled towards the next array
    pub fn filled(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.out = None;
    }
}

impl<T, const N: usize> Default for StreamDemux<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> StreamStage for StreamDemux<T, N> {
    type In = T;
    type Out = [T; N];

    fn ready(&self) -> bool {
        self.out.is_none() || self.slots.len() + 1 < N
    }

    fn push(&mut self, item: T) {
        debug_assert!(self.ready(), "StreamDemux: push while not ready");
        self.slots.push(item);
        if self.slots.len() == N {
            let full = std::mem::replace(&mut self.slots, Vec::with_capacity(N));
            if let Ok(arr) = <[T; N]>::try_from(full) {
                self.out = Some(arr);
            }
        }
    }

    fn peek(&self) -> Option<&[T; N]> {
        self.out.as_ref()
    }

    fn pop(&mut self) -> Option<[T; N]> {
        self.out.take()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{Collector, Source};
    use super::super::transfer;
    use super::*;

    #[test]
    fn test_mux_order() {
        let mut src = Source::new([[1, 2, 3], [4, 5, 6]]);
        let mut mux: StreamMux<i32, 3> = StreamMux::new();
        let mut dst = Collector::new();
        for step in 0..20 {
            src.offer();
            dst.ready = step % 2 == 0;
            transfer(&mut mux, &mut dst);
            transfer(&mut src, &mut mux);
        }
        assert_eq!(dst.items, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_mux_accepts_only_when_drained() {
        let mut mux: StreamMux<i32, 2> = StreamMux::new();
        mux.push([7, 8]);
        assert!(!mux.ready());
        assert_eq!(mux.pop(), Some(7));
        assert!(!mux.ready());
        assert_eq!(mux.slot(), 1);
        assert_eq!(mux.pop(), Some(8));
        assert!(mux.ready());
        assert_eq!(mux.pop(), None);
    }

    #[test]
    fn test_demux_roundtrip_with_stalls() {
        let mut src = Source::new(0..12);
        let mut demux: StreamDemux<i32, 4> = StreamDemux::new();
        let mut mux: StreamMux<i32, 4> = StreamMux::new();
        let mut dst = Collector::new();
        for step in 0..100 {
            src.offer();
            dst.ready = step % 5 < 2;
            transfer(&mut mux, &mut dst);
            transfer(&mut demux, &mut mux);
            transfer(&mut src, &mut demux);
        }
        assert_eq!(dst.items, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_demux_holds_partial() {
        let mut demux: StreamDemux<i32, 2> = StreamDemux::new();
        demux.push(1);
        assert!(demux.peek().is_none());
        assert_eq!(demux.filled(), 1);
        demux.push(2);
        assert_eq!(demux.peek(), Some(&[1, 2]));
        // One more slot can be filled while the array waits
        assert!(demux.ready());
        demux.push(3);
        assert!(!demux.ready());
        assert_eq!(demux.pop(), Some([1, 2]));
        assert!(demux.ready());
    }
}
