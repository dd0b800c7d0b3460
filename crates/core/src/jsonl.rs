//! Turn record files: one JSON record per line.
//!
//! ```jsonl
//! {"node_id":"n1","timestamp":"...","user_message":"hi","status":"VALID"}
//! {"node_id":"n2","parent_node_id":"n1","timestamp":"...","agent_message":"hello","status":"VALID"}
//! ```
//!
//! Blank lines are skipped. Records may appear in any order; the tree builder
//! does not depend on it.

use crate::record::TurnRecord;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum JsonlError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error at line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
}

/// Write records, one per line.
pub fn write_records<W: Write>(records: &[TurnRecord], mut writer: W) -> Result<(), JsonlError> {
    for (i, record) in records.iter().enumerate() {
        serde_json::to_writer(&mut writer, record).map_err(|e| JsonlError::Json {
            line: i + 1,
            source: e,
        })?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Records as a JSONL string.
pub fn to_jsonl_string(records: &[TurnRecord]) -> Result<String, JsonlError> {
    let mut buf = Vec::new();
    write_records(records, &mut buf)?;
    String::from_utf8(buf).map_err(|e| JsonlError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Read every record from a JSONL reader.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<TurnRecord>, JsonlError> {
    let mut records = Vec::new();
    for (i, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        let record: TurnRecord = serde_json::from_str(&line).map_err(|e| JsonlError::Json {
            line: i + 1,
            source: e,
        })?;
        records.push(record);
    }
    Ok(records)
}

pub fn from_jsonl_str(s: &str) -> Result<Vec<TurnRecord>, JsonlError> {
    read_records(s.as_bytes())
}

/// Load a record file. A missing file is an empty conversation.
pub fn load_records(path: &Path) -> Result<Vec<TurnRecord>, JsonlError> {
    match File::open(path) {
        Ok(file) => read_records(BufReader::new(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Append records to a file, creating it when needed. A missing final
/// newline is added before the first new record.
pub fn append_records(path: &Path, records: &[TurnRecord]) -> Result<(), JsonlError> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    if file.metadata()?.len() > 0 {
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            file.write_all(b"\n")?;
        }
    }
    write_records(records, BufWriter::new(file))
}
