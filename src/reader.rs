//! Lazy CSV → `Record` reader.
//!
//! The first row is a header and is skipped by position. Blank lines are
//! ignored. Rows narrower than the minimum column count are logged and
//! skipped. An I/O failure ends the stream with one error.

use crate::error::RowError;
use crate::schema::{Record, DEFAULT_MIN_COLUMNS};
use crate::util::{open_with_backoff, IO_DELAY_MS, IO_TRIES};
use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Parsing knobs for input files.
#[derive(Clone, Debug)]
pub struct ReaderOptions {
    pub delimiter: u8,
    pub min_columns: usize,
    pub read_buffer_bytes: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self { delimiter: b',', min_columns: DEFAULT_MIN_COLUMNS, read_buffer_bytes: 256 * 1024 }
    }
}

/// Per-file row accounting. Neither the header nor blank lines count as data rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub data_rows: u64,
    pub accepted: u64,
    pub short: u64,
}

pub struct RecordReader {
    rdr: csv::Reader<BufReader<File>>,
    row: ByteRecord,
    source: String,
    min_columns: usize,
    position: u64,
    stats: ReadStats,
    done: bool,
}

impl RecordReader {
    /// Open `path`; records are tagged with `path` as their source.
    pub fn open(path: &Path, opts: &ReaderOptions) -> Result<Self> {
        let f = open_with_backoff(path, IO_TRIES, IO_DELAY_MS)
            .with_context(|| format!("open {}", path.display()))?;
        let rdr = ReaderBuilder::new()
            .delimiter(opts.delimiter)
            .has_headers(false)
            .flexible(true)
            .quoting(true)
            .from_reader(BufReader::with_capacity(opts.read_buffer_bytes.max(8 * 1024), f));
        Ok(Self {
            rdr,
            row: ByteRecord::new(),
            source: path.display().to_string(),
            min_columns: opts.min_columns,
            position: 0,
            stats: ReadStats::default(),
            done: false,
        })
    }

    pub fn stats(&self) -> ReadStats {
        self.stats
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Bytes of input consumed so far.
    pub fn byte_offset(&self) -> u64 {
        self.rdr.position().byte()
    }

    fn to_record(&self) -> Record {
        Record::from_row(self.row.iter().map(decode_ignoring_invalid), self.source.as_str())
    }
}

impl Iterator for RecordReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let pos = self.position;
            match self.rdr.read_byte_record(&mut self.row) {
                Ok(false) => self.done = true,
                Ok(true) => {
                    // Blank lines never reach here; the csv reader drops them.
                    self.position += 1;
                    if pos == 0 {
                        continue;
                    }
                    self.stats.data_rows += 1;
                    if self.row.len() < self.min_columns {
                        let e = RowError::TooFewColumns { row: pos, found: self.row.len(), min: self.min_columns };
                        tracing::warn!(source = %self.source, "{e}");
                        self.stats.short += 1;
                        continue;
                    }
                    self.stats.accepted += 1;
                    return Some(Ok(self.to_record()));
                }
                // Flexible byte records only fail on I/O.
                Err(e) => {
                    self.done = true;
                    return Some(Err(anyhow::Error::new(e).context(format!("read {}", self.source))));
                }
            }
        }
        None
    }
}

/// UTF-8 decode that drops invalid byte sequences instead of replacing them.
fn decode_ignoring_invalid(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.utf8_chunks().map(|c| c.valid()).collect(),
    }
}
