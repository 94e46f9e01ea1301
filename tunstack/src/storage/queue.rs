use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::layer::{Error, Result};

/// A bounded FIFO between two pipeline tasks.
///
/// Both ends live in the same structure so the channel itself never reports closure. Shutdown is
/// signalled only through the cancellation token passed to each operation, which every blocking
/// push and pop observes.
#[derive(Debug)]
pub struct Queue<T> {
    sender: mpsc::Sender<T>,
    receiver: Mutex<mpsc::Receiver<T>>,
    capacity: usize,
}

impl<T> Queue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    /// This function panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Queue {
            sender,
            receiver: Mutex::new(receiver),
            capacity,
        }
    }

    /// Append an item, waiting while the queue is full.
    ///
    /// Fails with `Error::Closed` once `token` is cancelled, the item is dropped in that case.
    pub async fn push(&self, item: T, token: &CancellationToken) -> Result<()> {
        if token.is_cancelled() {
            return Err(Error::Closed);
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Closed),
            sent = self.sender.send(item) => sent.map_err(|_| Error::Closed),
        }
    }

    /// Take the oldest item, waiting while the queue is empty.
    ///
    /// Fails with `Error::Closed` once `token` is cancelled, even if items remain queued.
    pub async fn pop(&self, token: &CancellationToken) -> Result<T> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Closed),
            item = self.recv() => item.ok_or(Error::Closed),
        }
    }

    async fn recv(&self) -> Option<T> {
        self.receiver.lock().await.recv().await
    }

    /// Drop all currently queued items.
    ///
    /// Does nothing while a consumer is waiting in `pop`, that consumer observes the cancellation
    /// that precedes a discard instead.
    pub fn discard(&self) {
        if let Ok(mut receiver) = self.receiver.try_lock() {
            while receiver.try_recv().is_ok() {}
        }
    }

    /// The number of items currently queued.
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    /// If no item is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
