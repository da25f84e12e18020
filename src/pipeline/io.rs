//! CSV reading and writing for pipeline tables.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Pipeline I/O errors.
#[derive(Debug)]
pub enum PipelineError {
    /// File could not be opened or written
    Io(String),
    /// A row could not be read or written; `line` is 1-based when known
    Csv { line: Option<u64>, message: String },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Io(e) => write!(f, "IO error: {e}"),
            PipelineError::Csv {
                line: Some(line),
                message,
            } => write!(f, "CSV error at line {line}: {message}"),
            PipelineError::Csv { line: None, message } => write!(f, "CSV error: {message}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<csv::Error> for PipelineError {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            return PipelineError::Io(e.to_string());
        }
        PipelineError::Csv {
            line: e.position().map(|pos| pos.line()),
            message: e.to_string(),
        }
    }
}

/// Read every row of a headed CSV table from `reader`.
pub fn read_rows<T, R>(reader: R) -> Result<Vec<T>, PipelineError>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for row in csv_reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Write rows as a headed CSV table to `writer`.
pub fn write_rows<T, W>(writer: W, rows: &[T]) -> Result<(), PipelineError>
where
    T: Serialize,
    W: Write,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer
        .flush()
        .map_err(|e| PipelineError::Io(e.to_string()))
}

/// Read a CSV file.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PipelineError> {
    let file = File::open(path)
        .map_err(|e| PipelineError::Io(format!("Failed to open {path:?}: {e}")))?;
    let rows = read_rows(file)?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "Read CSV table");
    Ok(rows)
}

/// Write a CSV file, creating parent directories.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::Io(e.to_string()))?;
        }
    }
    let file = File::create(path)
        .map_err(|e| PipelineError::Io(format!("Failed to create {path:?}: {e}")))?;
    write_rows(file, rows)?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "Wrote CSV table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::records::{AdEvent, KeyedEvent};

    #[test]
    fn test_read_raw_events_with_nulls() {
        let input = "user_id,ad_id,impression_ts,click_ts,purchase_value\n\
                     12,3,2025-12-01 08:00:00,2025-12-01 08:05:00,-10.0\n\
                     13,999,,,\n";

        let rows: Vec<AdEvent> = read_rows(input.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, "12");
        assert_eq!(rows[0].purchase_value, Some(-10.0));
        assert!(rows[0].click_ts.is_some());
        assert_eq!(rows[1].ad_id, 999);
        assert!(rows[1].impression_ts.is_none());
        assert!(rows[1].purchase_value.is_none());
    }

    #[test]
    fn test_bad_timestamp_reports_line() {
        let input = "user_id,timestamp\nu1,2025-12-01 08:00:00\nu2,not-a-time\n";

        let err = read_rows::<KeyedEvent, _>(input.as_bytes()).unwrap_err();

        match err {
            PipelineError::Csv { line, .. } => assert_eq!(line, Some(3)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_leaves_nulls_empty() {
        let rows = vec![AdEvent {
            user_id: "1".to_string(),
            ad_id: 2,
            impression_ts: None,
            click_ts: None,
            purchase_value: None,
        }];
        let mut out = Vec::new();

        write_rows(&mut out, &rows).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "user_id,ad_id,impression_ts,click_ts,purchase_value\n1,2,,,\n"
        );
    }
}
