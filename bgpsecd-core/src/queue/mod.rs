//! Bounded receive/send queues decoupling socket I/O from processing (§4.4).
//!
//! The source describes a mutex + condition-variable queue with a worker
//! thread, a one-second liveness-check timeout, and a `running` flag cleared
//! on shutdown. A `tokio::sync::mpsc::channel` already blocks producers when
//! full and preserves submission order; pairing it with a
//! `tokio_util::sync::CancellationToken` gives the same bounded, FIFO,
//! cleanly-stoppable queue without hand-rolling the condvar dance.

mod receive;
mod send;

pub use receive::{ReceiveItem, ReceiveQueue};
pub use send::{SendItem, SendQueue};

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("queue has shut down")]
pub struct QueueClosed;

/// Generic engine shared by [`ReceiveQueue`] and [`SendQueue`]: a bounded
/// channel plus a worker task that calls `process` for every item until
/// cancelled, then drains what's left.
pub struct BoundedQueue<T> {
    sender: mpsc::Sender<T>,
}

impl<T: Send + 'static> BoundedQueue<T> {
    pub fn spawn<F, Fut>(
        capacity: usize,
        token: CancellationToken,
        mut process: F,
    ) -> (Self, JoinHandle<()>)
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (sender, mut receiver) = mpsc::channel(capacity);
        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("queue worker observed shutdown signal");
                        break;
                    }
                    item = receiver.recv() => {
                        match item {
                            Some(item) => process(item).await,
                            None => break,
                        }
                    }
                }
            }
            while let Ok(item) = receiver.try_recv() {
                process(item).await;
            }
        });
        (BoundedQueue { sender }, worker)
    }

    /// Blocks until the item is accepted; never drops (§7: "queue full:
    /// block producer, never drop PDUs").
    pub async fn push(&self, item: T) -> Result<(), QueueClosed> {
        self.sender.send(item).await.map_err(|_| QueueClosed)
    }

    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn processes_items_in_submission_order() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_worker = seen.clone();
        let token = CancellationToken::new();
        let (queue, handle) = BoundedQueue::spawn(4, token.clone(), move |item: u32| {
            let seen_worker = seen_worker.clone();
            async move {
                seen_worker.lock().unwrap().push(item);
            }
        });

        for i in 0..5 {
            queue.push(i).await.unwrap();
        }
        drop(queue);
        handle.await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        let _ = token;
    }

    #[tokio::test]
    async fn cancellation_stops_the_worker() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_worker = counter.clone();
        let token = CancellationToken::new();
        let (queue, handle) = BoundedQueue::spawn(4, token.clone(), move |_: u32| {
            let counter_worker = counter_worker.clone();
            async move {
                counter_worker.fetch_add(1, Ordering::SeqCst);
            }
        });
        queue.push(1).await.unwrap();
        token.cancel();
        handle.await.unwrap();
        assert!(counter.load(Ordering::SeqCst) >= 1);
    }
}
