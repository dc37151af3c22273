//! Store → CSV export in schema order.

use crate::schema::FIELDS;
use crate::store::{RecordStore, ScanOptions};
use crate::util::{create_with_backoff, IO_DELAY_MS, IO_TRIES};
use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use indicatif::ProgressBar;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const DEFAULT_EXPORT_CAP: u64 = 100_000;
pub const DEFAULT_FLUSH_EVERY: u64 = 10_000;

#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Maximum data rows written (`None` = every stored record).
    pub cap: Option<u64>,
    /// Read records in random order (a random sample when capped).
    pub randomize: bool,
    /// Flush the file every N rows.
    pub flush_every: u64,
    pub write_buffer_bytes: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            cap: Some(DEFAULT_EXPORT_CAP),
            randomize: false,
            flush_every: DEFAULT_FLUSH_EVERY,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: u64,
}

/// Write stored records to `out_path`: a header of schema labels, then one
/// fully quoted row per record. Store identifiers and derived fields are
/// never written.
///
/// The file is written in place; if the export fails midway the rows already
/// flushed stay on disk and the file handle is closed on the way out.
pub fn export_csv(
    store: &mut dyn RecordStore,
    out_path: &Path,
    opts: &ExportOptions,
    pb: Option<ProgressBar>,
) -> Result<ExportSummary> {
    if let Some(dir) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    tracing::info!(path = %out_path.display(), "Write start");
    let started = Instant::now();

    let file = create_with_backoff(out_path, IO_TRIES, IO_DELAY_MS)
        .with_context(|| format!("create {}", out_path.display()))?;
    let mut w = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(BufWriter::with_capacity(opts.write_buffer_bytes.max(8 * 1024), file));
    w.write_record(FIELDS)?;

    let flush_every = opts.flush_every.max(1);
    let scan = ScanOptions { cap: opts.cap, randomize: opts.randomize };
    let mut rows = 0u64;
    store
        .for_each_record(&scan, &mut |stored| {
            w.write_record(stored.record.values())?;
            rows += 1;
            if let Some(pb) = &pb { pb.inc(1); }
            if rows % flush_every == 0 {
                w.flush()?;
                tracing::info!("Writing: {rows} rows.");
            }
            Ok(())
        })
        .with_context(|| format!("export to {}", out_path.display()))?;
    w.flush().with_context(|| format!("flush {}", out_path.display()))?;

    if let Some(pb) = pb { pb.finish_with_message("export done"); }
    tracing::info!(
        path = %out_path.display(),
        rows,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Write finish"
    );
    Ok(ExportSummary { path: out_path.to_path_buf(), rows })
}
