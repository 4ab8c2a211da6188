//! Intake queue — bounded FIFO between stream handlers and the batch cutter.
//!
//! Many handlers hold an `IntakeSender`; exactly one `IntakeReceiver` exists
//! and belongs to the cutter. A full queue makes `submit` wait, which is the
//! only backpressure the orderer applies to clients.

use bytes::Bytes;
use tokio::sync::mpsc;

/// Returned by `submit` once the cutter has stopped consuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("intake queue is closed")]
pub struct IntakeClosed;

#[derive(Clone)]
pub struct IntakeSender {
    tx: mpsc::Sender<Bytes>,
}

pub struct IntakeReceiver {
    rx: mpsc::Receiver<Bytes>,
}

/// Create a queue holding at most `capacity` payloads (minimum 1).
pub fn intake(capacity: usize) -> (IntakeSender, IntakeReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (IntakeSender { tx }, IntakeReceiver { rx })
}

impl IntakeSender {
    /// Enqueue a payload, waiting while the queue is full.
    pub async fn submit(&self, payload: Bytes) -> Result<(), IntakeClosed> {
        self.tx.send(payload).await.map_err(|_| IntakeClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Payloads currently waiting for the cutter.
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

impl IntakeReceiver {
    /// Next payload in FIFO order. `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}
