//! Library crate for port-sweep-rs: a bounded-concurrency TCP connect port scanner.
pub mod aggregator;
pub mod config;
pub mod emit;
pub mod error;
pub mod logging;
pub mod pool;
pub mod probe;
pub mod queue;
pub mod range;
pub mod scanner;
pub mod sink;
pub mod types;

pub use config::{InFlightPolicy, ScanConfig};
pub use error::{ScanError, SinkError};
pub use range::PortRange;
pub use scanner::{run_scan, ScanOutcome, Scanner};
pub use types::{PortRecord, PortStatus, Progress, ScanReport};
