//! FIFO work channel shared by the worker pool, plus the completion barrier.
//!
//! The barrier is reached only once the producer has closed the queue *and* every
//! enqueued item has been acknowledged with [`WorkReceiver::task_done`]. An empty
//! channel alone is not enough: a dequeued item may still be in flight.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Notify};

use crate::types::PendingPort;

#[derive(Debug, Default)]
struct Pending {
    outstanding: AtomicUsize,
    closed: AtomicBool,
    notify: Notify,
}

impl Pending {
    fn is_drained(&self) -> bool {
        self.closed.load(Ordering::SeqCst) && self.outstanding.load(Ordering::SeqCst) == 0
    }

    fn wake_if_drained(&self) {
        if self.is_drained() {
            self.notify.notify_waiters();
        }
    }
}

/// Create a bounded work queue holding at most `capacity` undelivered items.
pub fn channel(capacity: usize) -> (WorkSender, WorkReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pending = Arc::new(Pending::default());
    (
        WorkSender {
            tx,
            pending: pending.clone(),
        },
        WorkReceiver {
            rx: Arc::new(Mutex::new(rx)),
            pending,
        },
    )
}

/// Producer half. Dropped or [`close`](WorkSender::close)d once enqueueing ends.
#[derive(Debug)]
pub struct WorkSender {
    tx: mpsc::Sender<PendingPort>,
    pending: Arc<Pending>,
}

impl WorkSender {
    /// Enqueue one item, waiting while the queue is full. Returns the item back if
    /// every receiver is gone.
    ///
    /// Cancel safe: the item is only counted once a slot is reserved.
    pub async fn send(&self, item: PendingPort) -> Result<(), PendingPort> {
        let Ok(permit) = self.tx.reserve().await else {
            return Err(item);
        };
        self.pending.outstanding.fetch_add(1, Ordering::SeqCst);
        permit.send(item);
        Ok(())
    }

    /// Number of items enqueued but not yet acknowledged.
    pub fn outstanding(&self) -> usize {
        self.pending.outstanding.load(Ordering::SeqCst)
    }

    /// Signal that no more work is coming. Receivers drain what is queued and then
    /// see `None`.
    pub fn close(self) -> Barrier {
        let pending = self.pending.clone();
        drop(self.tx);
        pending.closed.store(true, Ordering::SeqCst);
        pending.wake_if_drained();
        Barrier { pending }
    }
}

/// Consumer half, cloned into every worker.
#[derive(Debug, Clone)]
pub struct WorkReceiver {
    rx: Arc<Mutex<mpsc::Receiver<PendingPort>>>,
    pending: Arc<Pending>,
}

impl WorkReceiver {
    /// Wait for the next item. `None` once the queue is closed and empty.
    ///
    /// Cancel safe: dropping the future never loses an item.
    pub async fn next(&self) -> Option<PendingPort> {
        self.rx.lock().await.recv().await
    }

    /// Guard that acknowledges one dequeued item when dropped, on every exit path.
    pub fn ack_on_drop(&self) -> TaskDone<'_> {
        TaskDone { queue: self }
    }

    /// Acknowledge one dequeued item as fully handled.
    pub fn task_done(&self) {
        let prev = self.pending.outstanding.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "task_done called more times than items were sent");
        if prev == 1 {
            self.pending.wake_if_drained();
        }
    }
}

/// See [`WorkReceiver::ack_on_drop`].
#[must_use = "the item is acknowledged as soon as the guard is dropped"]
pub struct TaskDone<'a> {
    queue: &'a WorkReceiver,
}

impl Drop for TaskDone<'_> {
    fn drop(&mut self) {
        self.queue.task_done();
    }
}

/// Completion barrier returned by [`WorkSender::close`].
#[derive(Debug, Clone)]
pub struct Barrier {
    pending: Arc<Pending>,
}

impl Barrier {
    pub fn is_reached(&self) -> bool {
        self.pending.is_drained()
    }

    /// Resolve once every enqueued item has been acknowledged.
    pub async fn wait(&self) {
        loop {
            let notified = self.pending.notify.notified();
            if self.pending.is_drained() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time;

    fn item(port: u16) -> PendingPort {
        PendingPort::new(Arc::from("localhost"), port)
    }

    #[tokio::test]
    async fn delivers_in_fifo_order_then_none() {
        let (tx, rx) = channel(8);
        for p in [3, 1, 2] {
            tx.send(item(p)).await.unwrap();
        }
        let _barrier = tx.close();

        let mut got = Vec::new();
        while let Some(next) = rx.next().await {
            got.push(next.port());
            rx.task_done();
        }
        assert_eq!(got, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn barrier_waits_for_in_flight_not_empty_queue() {
        let (tx, rx) = channel(4);
        tx.send(item(1)).await.unwrap();
        let barrier = tx.close();

        let taken = rx.next().await.unwrap();
        assert_eq!(taken.port(), 1);
        // Queue is empty but the item is still in flight.
        assert!(!barrier.is_reached());
        assert!(time::timeout(Duration::from_millis(50), barrier.wait())
            .await
            .is_err());

        rx.task_done();
        time::timeout(Duration::from_millis(500), barrier.wait())
            .await
            .expect("barrier reached after task_done");
    }

    #[tokio::test]
    async fn ack_guard_acknowledges_on_drop() {
        let (tx, rx) = channel(2);
        tx.send(item(7)).await.unwrap();
        let barrier = tx.close();
        {
            let _taken = rx.next().await.unwrap();
            let _ack = rx.ack_on_drop();
            assert!(!barrier.is_reached());
        }
        assert!(barrier.is_reached());
    }

    #[tokio::test]
    async fn closing_empty_queue_reaches_barrier() {
        let (tx, _rx) = channel(1);
        let barrier = tx.close();
        assert!(barrier.is_reached());
        barrier.wait().await;
    }

    #[tokio::test]
    async fn send_fails_when_receivers_gone() {
        let (tx, rx) = channel(1);
        drop(rx);
        let back = tx.send(item(9)).await.unwrap_err();
        assert_eq!(back.port(), 9);
        assert_eq!(tx.outstanding(), 0);
    }
}
