//! Text persistence for trace record collections.
//!
//! One line per record:
//! `<moved_byte_position> <16 decimal plaintext bytes> {<quad> <count>}*`
//! where a quad serializes its four components joined by `|` and the
//! collided placeholder keeps its legacy `999` encoding. Encoding a
//! decoded file reproduces it byte for byte.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::hitmap::{HitMap, Quad, TraceRecord};

/// Errors raised while saving or loading trace files. All of them are
/// non-fatal to the attack: a failed restore just leaves the record
/// collection empty.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to access trace file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed trace file, line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

impl PersistError {
    fn parse(line: usize, reason: impl Into<String>) -> Self {
        PersistError::Parse { line, reason: reason.into() }
    }
}

/// Encodes a record collection into the line-oriented trace format.
pub fn encode_records(records: &[TraceRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let _ = write!(out, "{}", record.moved_pos);
        for byte in record.plaintext {
            let _ = write!(out, " {}", byte);
        }
        for (quad, count) in &record.map {
            let _ = write!(out, " {} {}", quad, count);
        }
        out.push('\n');
    }
    out
}

/// Decodes a record collection from the line-oriented trace format.
/// Blank lines are ignored; anything else malformed is an error.
pub fn decode_records(text: &str) -> Result<Vec<TraceRecord>, PersistError> {
    let mut records = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        let line_no = line_idx + 1;
        let mut tokens = line.split_whitespace();
        let first = match tokens.next() {
            Some(token) => token,
            None => continue,
        };

        let moved_pos: usize = first
            .parse()
            .map_err(|_| PersistError::parse(line_no, format!("bad byte position {:?}", first)))?;
        if moved_pos > 15 {
            return Err(PersistError::parse(line_no, format!("byte position {} out of range", moved_pos)));
        }

        let mut plaintext = [0u8; 16];
        for slot in plaintext.iter_mut() {
            let token = tokens
                .next()
                .ok_or_else(|| PersistError::parse(line_no, "truncated plaintext"))?;
            *slot = token
                .parse()
                .map_err(|_| PersistError::parse(line_no, format!("bad plaintext byte {:?}", token)))?;
        }

        let mut map = HitMap::new();
        while let Some(quad_token) = tokens.next() {
            let quad: Quad = quad_token
                .parse()
                .map_err(|e: crate::hitmap::QuadParseError| PersistError::parse(line_no, e.0))?;
            let count_token = tokens
                .next()
                .ok_or_else(|| PersistError::parse(line_no, format!("quad {:?} has no counter", quad_token)))?;
            let count: u64 = count_token
                .parse()
                .map_err(|_| PersistError::parse(line_no, format!("bad counter {:?}", count_token)))?;
            map.insert(quad, count);
        }

        records.push(TraceRecord { moved_pos, plaintext, map });
    }
    Ok(records)
}

/// Writes a record collection to `path`.
pub fn save_records(path: impl AsRef<Path>, records: &[TraceRecord]) -> Result<(), PersistError> {
    let path = path.as_ref();
    std::fs::write(path, encode_records(records)).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a record collection from `path`.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<TraceRecord>, PersistError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_records(&text)
}
