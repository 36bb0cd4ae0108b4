use time::OffsetDateTime;
use tracing::{info, warn};

use crate::error::SinkError;
use crate::range::PortRange;
use crate::sink::{RecordSink, HEADERS};
use crate::types::{PortRecord, ScanReport};

/// Order a frozen record set by port. Ports are unique within a scan, so the order
/// is total.
pub fn sort_records(mut records: Vec<PortRecord>) -> Vec<PortRecord> {
    records.sort_by_key(PortRecord::port);
    records
}

/// Inputs for building the final report once the workers have stopped.
pub struct Frozen {
    pub host: String,
    pub range: PortRange,
    pub records: Vec<PortRecord>,
    pub total_open: u64,
    pub started_at: OffsetDateTime,
}

/// Sort the frozen records into a report and hand them to the sink, if any.
///
/// A sink failure is returned next to the report; the report itself is unaffected.
pub fn emit(frozen: Frozen, sink: Option<&dyn RecordSink>) -> (ScanReport, Option<SinkError>) {
    let records = sort_records(frozen.records);
    let interrupted = records.len() < frozen.range.len();
    let report = ScanReport {
        host: frozen.host,
        range: frozen.range,
        records,
        total_open: frozen.total_open,
        interrupted,
        started_at: frozen.started_at,
        finished_at: OffsetDateTime::now_utc(),
    };

    let sink_error = sink.and_then(|sink| match sink.write(&report.records, &HEADERS) {
        Ok(()) => {
            info!(
                destination = %sink.destination().display(),
                rows = report.records.len(),
                "scan written"
            );
            None
        }
        Err(e) => {
            warn!(error = %e, "failed to persist scan results");
            Some(e)
        }
    });

    (report, sink_error)
}
