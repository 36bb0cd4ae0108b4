use thiserror::Error;

/// Failures surfaced to the caller of a scan.
///
/// Connection failures against individual ports are not errors; they resolve the
/// port as closed.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid port range {start}-{end} (expected 1 <= start <= end <= 65535)")]
    InvalidRange { start: u32, end: u32 },
    #[error("invalid port range `{0}`")]
    MalformedRange(String),
    #[error("failed to resolve target `{host}`")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("resolver returned no address for `{0}`")]
    NoAddress(String),
}

/// Failures of the persistence collaborator. Reported next to the report, never in
/// place of it.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write csv output to {path}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write json output to {path}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to open output {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
