use crate::util::{append_with_backoff, create_with_backoff, open_with_backoff, replace_file_atomic_backoff, IO_DELAY_MS, IO_TRIES};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Buffered NDJSON line reader. Trailing `\r?\n` is stripped.
pub struct NdjsonReader {
    rdr: BufReader<File>,
}

impl NdjsonReader {
    pub fn open(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = open_with_backoff(path, IO_TRIES, IO_DELAY_MS)?;
        Ok(Self { rdr: BufReader::with_capacity(buf_bytes.max(8 * 1024), f) })
    }

    /// Read the next line into `buf`. Returns the number of bytes consumed (0 on EOF).
    pub fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        buf.clear();
        let n = self.rdr.read_line(buf)?;
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') { buf.pop(); }
        }
        Ok(n)
    }
}

/// Buffered NDJSON writer: truncating, appending, or staged on a temp path.
pub struct NdjsonWriter {
    path: PathBuf,
    w: BufWriter<File>,
}

impl NdjsonWriter {
    pub fn create(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = create_with_backoff(path, IO_TRIES, IO_DELAY_MS)?;
        Ok(Self::wrap(path, f, buf_bytes))
    }

    pub fn append(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = append_with_backoff(path, IO_TRIES, IO_DELAY_MS)?;
        Ok(Self::wrap(path, f, buf_bytes))
    }

    fn wrap(path: &Path, f: File, buf_bytes: usize) -> Self {
        Self { path: path.to_path_buf(), w: BufWriter::with_capacity(buf_bytes.max(8 * 1024), f) }
    }

    #[inline]
    pub fn write_line(&mut self, s: &str) -> io::Result<()> {
        self.w.write_all(s.as_bytes())?;
        self.w.write_all(b"\n")
    }

    /// Write pre-encoded bytes (one or more complete lines) in a single call.
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.w.write_all(bytes)
    }

    pub fn finish(mut self) -> Result<()> {
        self.w.flush().with_context(|| format!("flush {}", self.path.display()))
    }

    /// Flush, then promote this (temp) file to `final_path`.
    pub fn finish_atomic(mut self, final_path: &Path) -> Result<()> {
        self.w.flush().with_context(|| format!("flush {}", self.path.display()))?;
        let NdjsonWriter { path, w } = self;
        drop(w);
        replace_file_atomic_backoff(&path, final_path)
    }
}
