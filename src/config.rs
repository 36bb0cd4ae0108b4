use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 20;
/// Default per-probe connect timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);
/// Upper bound on pool width.
pub const MAX_WORKERS: usize = 5_000;

/// What happens to probes already running when a scan is cancelled.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InFlightPolicy {
    /// Let running probes complete and keep their records.
    #[default]
    Finish,
    /// Drop running probes (closing their sockets) and discard their records.
    Abandon,
}

/// Tunables for one scan session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    pub workers: usize,
    #[serde(with = "millis")]
    pub timeout: Duration,
    /// Work channel capacity; `None` means twice the pool width.
    pub queue_capacity: Option<usize>,
    pub in_flight: InFlightPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout: DEFAULT_TIMEOUT,
            queue_capacity: None,
            in_flight: InFlightPolicy::default(),
        }
    }
}

impl ScanConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_in_flight(mut self, policy: InFlightPolicy) -> Self {
        self.in_flight = policy;
        self
    }

    pub fn pool_width(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }

    pub fn channel_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or_else(|| self.pool_width() * 2)
            .max(1)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
