use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;

use crate::error::SinkError;
use crate::types::PortRecord;

/// Column schema handed to every sink.
pub const HEADERS: [&str; 3] = ["host", "port", "status"];

/// Persistence collaborator receiving the final, port-ordered record set.
pub trait RecordSink: Send + Sync {
    /// Write one row per record, in the given order, with the given columns.
    fn write(&self, records: &[PortRecord], headers: &[&str]) -> Result<(), SinkError>;

    /// Where the sink writes, for display.
    fn destination(&self) -> &Path;
}

/// Pick a sink from the destination's extension: `.json` gets JSON, anything else
/// CSV.
pub fn sink_for_path(path: impl Into<PathBuf>) -> Arc<dyn RecordSink> {
    let path = path.into();
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        Arc::new(JsonSink::new(path))
    } else {
        Arc::new(CsvSink::new(path))
    }
}

/// Header row followed by one row per record. `status` is written `true`/`false`.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSink for CsvSink {
    fn write(&self, records: &[PortRecord], headers: &[&str]) -> Result<(), SinkError> {
        if is_blank(&self.path) {
            return Ok(());
        }
        let wrap = |source| SinkError::Csv {
            path: self.path.display().to_string(),
            source,
        };
        let mut wtr = csv::Writer::from_path(&self.path).map_err(wrap)?;
        wtr.write_record(headers).map_err(wrap)?;
        for r in records {
            let row: Vec<String> = headers.iter().map(|h| field_text(r, h)).collect();
            wtr.write_record(&row).map_err(wrap)?;
        }
        wtr.flush().map_err(|e| wrap(e.into()))?;
        Ok(())
    }

    fn destination(&self) -> &Path {
        &self.path
    }
}

/// Pretty JSON array, one object per record keyed by the header names.
#[derive(Debug, Clone)]
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSink for JsonSink {
    fn write(&self, records: &[PortRecord], headers: &[&str]) -> Result<(), SinkError> {
        if is_blank(&self.path) {
            return Ok(());
        }
        let path = self.path.display().to_string();
        let file = File::create(&self.path).map_err(|source| SinkError::Io {
            path: path.clone(),
            source,
        })?;
        let rows: Vec<Value> = records
            .iter()
            .map(|r| {
                let obj: Map<String, Value> = headers
                    .iter()
                    .map(|h| (h.to_string(), field_value(r, h)))
                    .collect();
                Value::Object(obj)
            })
            .collect();
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, &rows).map_err(|source| SinkError::Json {
            path: path.clone(),
            source,
        })?;
        w.flush()
            .map_err(|source| SinkError::Io { path, source })?;
        Ok(())
    }

    fn destination(&self) -> &Path {
        &self.path
    }
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().is_empty()
}

fn field_text(r: &PortRecord, name: &str) -> String {
    match name {
        "host" => r.host().to_string(),
        "port" => r.port().to_string(),
        "status" => r.is_open().to_string(),
        "scanned_at" => r.scanned_at().format(&Rfc3339).unwrap_or_default(),
        _ => String::new(),
    }
}

fn field_value(r: &PortRecord, name: &str) -> Value {
    match name {
        "port" => Value::from(r.port()),
        "status" => Value::from(r.is_open()),
        "host" | "scanned_at" => Value::from(field_text(r, name)),
        _ => Value::Null,
    }
}
