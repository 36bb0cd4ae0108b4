use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::range::PortRange;

/// Outcome of probing one port.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PortStatus {
    Open,
    #[default]
    Closed,
}

impl PortStatus {
    pub fn is_open(self) -> bool {
        matches!(self, PortStatus::Open)
    }
}

impl From<bool> for PortStatus {
    fn from(open: bool) -> Self {
        if open {
            PortStatus::Open
        } else {
            PortStatus::Closed
        }
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortStatus::Open => f.pad("open"),
            PortStatus::Closed => f.pad("closed"),
        }
    }
}

/// A port that has been enqueued but not yet picked up by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPort {
    host: Arc<str>,
    port: u16,
}

impl PendingPort {
    pub fn new(host: Arc<str>, port: u16) -> Self {
        Self { host, port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Take the port into the probing state, stamping the scan time.
    pub fn begin(self) -> ProbingPort {
        ProbingPort {
            host: self.host,
            port: self.port,
            scanned_at: OffsetDateTime::now_utc(),
        }
    }
}

/// A port a worker is currently probing. Owned by exactly that worker.
#[derive(Debug)]
pub struct ProbingPort {
    host: Arc<str>,
    port: u16,
    scanned_at: OffsetDateTime,
}

impl ProbingPort {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn scanned_at(&self) -> OffsetDateTime {
        self.scanned_at
    }

    /// Record the probe outcome. Consumes the in-flight state so a status can only
    /// be written once.
    pub fn resolve(self, open: bool) -> PortRecord {
        PortRecord {
            host: self.host.to_string(),
            port: self.port,
            scanned_at: self.scanned_at,
            status: PortStatus::from(open),
        }
    }
}

/// One resolved scan unit.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PortRecord {
    host: String,
    port: u16,
    #[serde(with = "time::serde::rfc3339")]
    scanned_at: OffsetDateTime,
    status: PortStatus,
}

impl PortRecord {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn scanned_at(&self) -> OffsetDateTime {
        self.scanned_at
    }

    pub fn status(&self) -> PortStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}

/// Live progress counters. Every observation satisfies `open <= scanned <= total`.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub total: u64,
    pub scanned: u64,
    pub open: u64,
}

/// Final, port-ordered result of one scan session.
#[derive(Serialize, Debug, Clone)]
pub struct ScanReport {
    pub host: String,
    pub range: PortRange,
    /// Strictly increasing by port.
    pub records: Vec<PortRecord>,
    pub total_open: u64,
    /// True when the scan was cancelled before every port in `range` resolved.
    pub interrupted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
}

impl ScanReport {
    pub fn open_ports(&self) -> impl Iterator<Item = &PortRecord> + '_ {
        self.records.iter().filter(|r| r.is_open())
    }

    pub fn scanned(&self) -> usize {
        self.records.len()
    }
}
