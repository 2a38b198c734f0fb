//! Bounded message queue used to hand work to background tasks.

use std::sync::Arc;

use crate::{FlowdeckError, Result};

/// Bounded MPMC (multi-producer, multi-consumer) queue.
///
/// Messages are consumed by exactly one receiver.
/// Backed by flume for high-performance message passing.
pub struct Queue<T> {
    receiver: flume::Receiver<T>,
    sender: flume::Sender<T>,
}

impl<T> Queue<T> {
    /// create a new queue
    pub fn new(cap: usize) -> Arc<Self> {
        let (tx, rx) = flume::bounded(cap);

        Arc::new(Self {
            receiver: rx,
            sender: tx,
        })
    }

    /// send a message without waiting, failing when the queue is full
    pub fn try_send(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.try_send(msg).map_err(|e| FlowdeckError::Queue(e.to_string()))
    }

    /// take a message if one is already waiting
    pub fn try_next(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// receive a message from the queue asynchronously
    pub async fn next_async(&self) -> Option<T> {
        self.receiver.recv_async().await.ok()
    }
}
