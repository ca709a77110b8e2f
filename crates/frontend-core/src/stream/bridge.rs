use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded};
use std::time::Duration;

use super::StreamStage;
use crate::BuildErr;

/// Depth-bounded FIFO between two independently timed domains.
///
/// A write succeeds iff the FIFO is not full and a read iff it is not empty,
/// so a saturated bridge shows up as backpressure on the writing side. The
/// bridge can be used as a plain stage inside one domain, or split into a
/// writer and a reader living in different threads.
pub struct DomainBridge<T> {
    writer: BridgeWriter<T>,
    reader: BridgeReader<T>,
}

impl<T> DomainBridge<T> {
    pub fn new(depth: usize) -> Result<Self, BuildErr> {
        crate::expect_param!(depth, depth > 0)?;
        let (tx, rx) = bounded(depth);
        Ok(Self {
            writer: BridgeWriter { tx, depth },
            reader: BridgeReader { rx, out: None },
        })
    }

    pub fn depth(&self) -> usize {
        self.writer.depth
    }

    /// Number of payloads in flight, including the reader's output register
    pub fn len(&self) -> usize {
        self.reader.rx.len() + self.reader.out.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards everything in flight
    pub fn clear(&mut self) {
        self.reader.out = None;
        while self.reader.rx.try_recv().is_ok() {}
    }

    pub fn split(self) -> (BridgeWriter<T>, BridgeReader<T>) {
        (self.writer, self.reader)
    }
}

impl<T> StreamStage for DomainBridge<T> {
    type In = T;
    type Out = T;

    fn ready(&self) -> bool {
        self.writer.ready()
    }

    fn push(&mut self, item: T) {
        if !self.writer.push(item) {
            tracing::warn!("DomainBridge: push while full, payload dropped");
        }
    }

    fn peek(&self) -> Option<&T> {
        self.reader.peek()
    }

    fn pop(&mut self) -> Option<T> {
        self.reader.pop()
    }

    fn tick(&mut self) {
        self.reader.fill();
    }
}

/// Writing half of a bridge
pub struct BridgeWriter<T> {
    tx: Sender<T>,
    depth: usize,
}

impl<T> BridgeWriter<T> {
    pub fn ready(&self) -> bool {
        !self.tx.is_full()
    }

    /// Non-blocking write. Returns false if the bridge was full or the reader is gone.
    pub fn push(&mut self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("BridgeWriter: reader disconnected");
                false
            }
        }
    }

    /// Blocking write, waits while the bridge is full. Fails once the reader is dropped.
    pub fn send(&self, item: T) -> Result<(), T> {
        self.tx.send(item).map_err(|e| e.into_inner())
    }
}

/// Reading half of a bridge. Holds one payload in an output register.
pub struct BridgeReader<T> {
    rx: Receiver<T>,
    out: Option<T>,
}

impl<T> BridgeReader<T> {
    /// Refills the output register from the FIFO if it is empty.
    /// Returns false once the writer is gone and nothing is left.
    pub fn fill(&mut self) -> bool {
        if self.out.is_some() {
            return true;
        }
        match self.rx.try_recv() {
            Ok(item) => {
                self.out = Some(item);
                true
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => false,
        }
    }

    /// Waits up to `timeout` for a payload to arrive in the output register.
    /// Returns false once the writer is gone and nothing is left.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if self.out.is_some() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(item) => {
                self.out = Some(item);
                true
            }
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    pub fn peek(&self) -> Option<&T> {
        self.out.as_ref()
    }

    pub fn pop(&mut self) -> Option<T> {
        self.out.take()
    }
}
