//! Result set serialization.
//!
//! Two sink shapes: delimited text (header row of field names, one row per
//! record, minimal quoting) and indented JSON (an array of field mappings in
//! declaration order). A run may write either, both, or neither.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::extract::ResultSet;
use crate::plan::SinkSpec;

/// Errors raised while writing output sinks.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode records as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write one sink. The header always comes from the plan's declared field
/// names so an empty result set still produces a well-formed file.
pub fn write_sink(
    results: &ResultSet,
    field_names: &[String],
    sink: &SinkSpec,
) -> Result<(), SerializeError> {
    match sink {
        SinkSpec::Delimited {
            path,
            delimiter,
            include_index,
        } => {
            let file = create(path)?;
            let mut writer = BufWriter::new(file);
            write_delimited(&mut writer, results, field_names, *delimiter, *include_index)
                .and_then(|_| writer.flush())
                .map_err(|source| SerializeError::Io {
                    path: path.clone(),
                    source,
                })
        }
        SinkSpec::Json { path } => {
            let file = create(path)?;
            let mut writer = BufWriter::new(file);
            write_json(&mut writer, results).and_then(|_| {
                writer.flush().map_err(|source| SerializeError::Io {
                    path: path.clone(),
                    source,
                })
            })
        }
    }
}

fn create(path: &Path) -> Result<File, SerializeError> {
    File::create(path).map_err(|source| SerializeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Render the delimited form to a string (used by tests and previews).
pub fn delimited_to_string(
    results: &ResultSet,
    field_names: &[String],
    delimiter: char,
    include_index: bool,
) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let _ = write_delimited(&mut buf, results, field_names, delimiter, include_index);
    match String::from_utf8(buf) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(&err.into_bytes()).into_owned(),
    }
}

/// Write the delimited form: header, then one row per record in order.
pub fn write_delimited<W: Write>(
    mut writer: W,
    results: &ResultSet,
    field_names: &[String],
    delimiter: char,
    include_index: bool,
) -> io::Result<()> {
    let mut header: Vec<&str> = Vec::with_capacity(field_names.len() + 1);
    if include_index {
        // Positional index column carries an empty header cell.
        header.push("");
    }
    header.extend(field_names.iter().map(String::as_str));
    write_row(&mut writer, &header, delimiter)?;

    let mut index_buf = String::new();
    for (index, record) in results.iter().enumerate() {
        let mut row: Vec<&str> = Vec::with_capacity(record.len() + 1);
        if include_index {
            index_buf = index.to_string();
            row.push(&index_buf);
        }
        row.extend(record.values());
        write_row(&mut writer, &row, delimiter)?;
    }

    Ok(())
}

fn needs_quotes(cell: &str, delimiter: char) -> bool {
    cell.contains(delimiter) || cell.contains('"') || cell.contains('\n') || cell.contains('\r')
}

fn write_row<W: Write>(mut writer: W, row: &[&str], delimiter: char) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(writer, "{}", delimiter)?;
        } else {
            first = false;
        }
        if needs_quotes(cell, delimiter) {
            let escaped = cell.replace('"', "\"\"");
            write!(writer, "\"{}\"", escaped)?;
        } else {
            write!(writer, "{}", cell)?;
        }
    }
    writeln!(writer)
}

/// Write the result set as a JSON array of field mappings, 4-space indented.
pub fn write_json<W: Write>(writer: W, results: &ResultSet) -> Result<(), SerializeError> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
    results.serialize(&mut serializer)?;
    Ok(())
}

/// Render the JSON form to a string.
pub fn json_to_string(results: &ResultSet) -> Result<String, SerializeError> {
    let mut buf: Vec<u8> = Vec::new();
    write_json(&mut buf, results)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
