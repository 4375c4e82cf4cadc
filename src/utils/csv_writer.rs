//! Tabular writer: one CSV file per object

use super::rest_api::{Record, ATTRIBUTES_KEY};
use crate::config::is_valid_object_name;
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Invalid object name for a file: '{0}'")]
    InvalidObjectName(String),

    #[error("Failed to create output directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write CSV {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Columns of a record set: union of keys in first-seen order, without the
/// reserved metadata key.
pub fn collect_columns(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();

    for record in records {
        for key in record.keys() {
            if key != ATTRIBUTES_KEY && seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }

    columns
}

/// Render one cell. Missing and null values become empty cells; nested
/// values (compound fields, relationship rows) are kept as compact JSON.
pub fn cell_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Write `records` to `{output_dir}/{object}.csv` and return the file path.
///
/// The directory is created if needed, so repeated writes into the same run
/// directory are fine.
pub fn write_object(object: &str, records: &[Record], output_dir: &Path) -> Result<PathBuf, WriteError> {
    if !is_valid_object_name(object) {
        return Err(WriteError::InvalidObjectName(object.to_string()));
    }

    fs::create_dir_all(output_dir).map_err(|source| WriteError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let path = output_dir.join(format!("{}.csv", object));
    let file = File::create(&path).map_err(|source| WriteError::Io {
        path: path.clone(),
        source,
    })?;

    let csv_err = |source: csv::Error| WriteError::Csv {
        path: path.clone(),
        source,
    };

    let columns = collect_columns(records);
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    writer.write_record(&columns).map_err(csv_err)?;
    for record in records {
        let row: Vec<String> = columns.iter().map(|c| cell_value(record.get(c))).collect();
        writer.write_record(&row).map_err(csv_err)?;
    }

    let mut inner = writer.into_inner().map_err(|e| WriteError::Io {
        path: path.clone(),
        source: e.into_error(),
    })?;
    inner.flush().map_err(|source| WriteError::Io {
        path: path.clone(),
        source,
    })?;

    debug!("Wrote {} rows to {:?}", records.len(), path);

    Ok(path)
}
