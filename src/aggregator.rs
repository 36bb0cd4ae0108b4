use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::types::{PortRecord, Progress};

#[derive(Debug, Default)]
struct Inner {
    total: AtomicU64,
    scanned: AtomicU64,
    open: AtomicU64,
    records: Mutex<Vec<PortRecord>>,
}

/// Thread-safe collector of resolved records and running counters.
///
/// Clones share the same state, so a clone can be handed to a progress display
/// while workers submit into another.
#[derive(Clone, Debug, Default)]
pub struct Aggregator {
    inner: Arc<Inner>,
}

impl Aggregator {
    pub fn new(total: u64) -> Self {
        let agg = Self::default();
        agg.inner.total.store(total, Ordering::SeqCst);
        agg
    }

    /// Append one resolved record. The append and counter updates happen under the
    /// same lock, so concurrent submissions never lose updates.
    pub fn submit(&self, record: PortRecord) {
        let open = record.is_open();
        let mut records = self.lock();
        records.push(record);
        // scanned before open, paired with the reverse read order in `progress`.
        self.inner.scanned.fetch_add(1, Ordering::SeqCst);
        if open {
            self.inner.open.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Lock-free view of the live counters.
    pub fn progress(&self) -> Progress {
        let open = self.inner.open.load(Ordering::SeqCst);
        let scanned = self.inner.scanned.load(Ordering::SeqCst);
        let total = self.inner.total.load(Ordering::SeqCst);
        Progress {
            total,
            scanned,
            open,
        }
    }

    pub fn total_open(&self) -> u64 {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Take every submitted record, leaving the collection empty. Called once the
    /// workers have stopped; the counters keep their final values.
    pub fn freeze(&self) -> (Vec<PortRecord>, u64) {
        let mut records = self.lock();
        let taken = std::mem::take(&mut *records);
        (taken, self.inner.open.load(Ordering::SeqCst))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PortRecord>> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Live view of whichever run its scanner started most recently.
#[derive(Clone, Debug)]
pub struct ProgressHandle {
    current: watch::Receiver<Aggregator>,
}

impl ProgressHandle {
    pub(crate) fn new(current: watch::Receiver<Aggregator>) -> Self {
        Self { current }
    }

    pub fn progress(&self) -> Progress {
        self.current.borrow().progress()
    }
}
