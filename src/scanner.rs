use std::net::IpAddr;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::net::lookup_host;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::aggregator::{Aggregator, ProgressHandle};
use crate::config::ScanConfig;
use crate::emit::{emit, Frozen};
use crate::error::{ScanError, SinkError};
use crate::pool::{WorkerContext, WorkerPool};
use crate::probe::{Prober, TcpConnectProbe};
use crate::queue;
use crate::range::PortRange;
use crate::sink::RecordSink;
use crate::types::{PendingPort, Progress, ScanReport};

/// Scan `start..=end` on `host` with default settings and no output sink.
///
/// Bounds are validated before anything touches the network; see [`PortRange::new`].
pub async fn run_scan(host: &str, start: u32, end: u32) -> Result<ScanReport, ScanError> {
    let range = PortRange::new(start, end)?;
    let outcome = Scanner::new(host, ScanConfig::default()).run(range).await?;
    Ok(outcome.report)
}

/// Result of one session: the sorted report, plus the sink failure if persisting
/// it went wrong.
#[derive(Debug)]
pub struct ScanOutcome {
    pub report: ScanReport,
    pub sink_error: Option<SinkError>,
}

/// Scan settings for a fixed host. Every [`run`](Self::run) is an independent
/// session with its own result collector, so runs may overlap.
pub struct Scanner {
    host: String,
    config: ScanConfig,
    prober: Arc<dyn Prober>,
    sink: Option<Arc<dyn RecordSink>>,
    current: watch::Sender<Aggregator>,
}

impl Scanner {
    pub fn new(host: impl Into<String>, config: ScanConfig) -> Self {
        Self {
            host: host.into(),
            config,
            prober: Arc::new(TcpConnectProbe),
            sink: None,
            current: watch::channel(Aggregator::default()).0,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Handle for observing live counters of the most recently started run.
    pub fn progress_handle(&self) -> ProgressHandle {
        ProgressHandle::new(self.current.subscribe())
    }

    pub fn progress(&self) -> Progress {
        self.current.borrow().progress()
    }

    pub async fn run(&self, range: PortRange) -> Result<ScanOutcome, ScanError> {
        self.run_with_cancel(range, CancellationToken::new()).await
    }

    /// Scan `range`, stopping early if `cancel` fires.
    ///
    /// On cancellation the producer stops enqueueing and the call returns without
    /// waiting for the queue to drain. What happens to probes already running is
    /// governed by [`ScanConfig::in_flight`]. The returned report only ever holds
    /// resolved records.
    pub async fn run_with_cancel(
        &self,
        range: PortRange,
        cancel: CancellationToken,
    ) -> Result<ScanOutcome, ScanError> {
        let target = resolve_target(&self.host).await?;
        let started_at = OffsetDateTime::now_utc();
        let width = self.config.pool_width();
        info!(
            host = %self.host,
            %target,
            ports = %range,
            workers = width,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "starting scan"
        );

        let results = Aggregator::new(range.len() as u64);
        self.current.send_replace(results.clone());
        let (tx, rx) = queue::channel(self.config.channel_capacity());
        let pool = WorkerPool::spawn(
            width,
            rx,
            WorkerContext {
                target,
                timeout: self.config.timeout,
                prober: self.prober.clone(),
                results: results.clone(),
                cancel: cancel.clone(),
                in_flight: self.config.in_flight,
            },
        );

        let host: Arc<str> = Arc::from(self.host.as_str());
        for port in range {
            let send = tx.send(PendingPort::new(host.clone(), port));
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                res = send => res.is_ok(),
            };
            if !sent {
                debug!(port, "enqueue stopped");
                break;
            }
        }

        let barrier = tx.close();
        tokio::select! {
            _ = barrier.wait() => {}
            _ = cancel.cancelled() => debug!("scan cancelled before queue drained"),
        }
        let resolved = pool.join().await;

        let (records, total_open) = results.freeze();
        debug_assert_eq!(records.len(), resolved);
        let (report, sink_error) = emit(
            Frozen {
                host: self.host.clone(),
                range,
                records,
                total_open,
                started_at,
            },
            self.sink.as_deref(),
        );
        info!(
            host = %report.host,
            scanned = report.scanned(),
            open = report.total_open,
            interrupted = report.interrupted,
            "scan finished"
        );
        Ok(ScanOutcome { report, sink_error })
    }
}

/// Resolve `host` once per session. IP literals resolve without a lookup.
pub async fn resolve_target(host: &str) -> Result<IpAddr, ScanError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let mut addrs = lookup_host((host, 0))
        .await
        .map_err(|source| ScanError::Resolve {
            host: host.to_string(),
            source,
        })?;
    addrs
        .next()
        .map(|a| a.ip())
        .ok_or_else(|| ScanError::NoAddress(host.to_string()))
}
