//! One-pass file ingestion: CSV reader → batch writer → store, with progress.

use crate::batch::{BatchStats, BatchWriter};
use crate::reader::{ReadStats, ReaderOptions, RecordReader};
use crate::store::RecordStore;
use anyhow::Result;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};

/// What one input file contributed.
#[derive(Clone, Debug)]
pub struct FileSummary {
    pub path: PathBuf,
    pub read: ReadStats,
    pub written: BatchStats,
}

/// Stream `path` into `store` in batches of `capacity`.
///
/// Batches flushed before a failure stay persisted. On failure the store is
/// asked to roll back any open write and the error is returned for the caller
/// to log; the caller moves on to the next file.
pub fn ingest_file(
    store: &mut dyn RecordStore,
    path: &Path,
    reader_opts: &ReaderOptions,
    capacity: usize,
    pb: Option<&ProgressBar>,
) -> Result<FileSummary> {
    tracing::info!("=== Start processing: {} ===", path.display());
    let mut reader = RecordReader::open(path, reader_opts)?;

    let outcome = {
        let mut writer = BatchWriter::new(&mut *store, capacity)?;
        pump(&mut reader, &mut writer, pb).and_then(|()| writer.finish())
    };

    match outcome {
        Ok(written) => {
            let read = reader.stats();
            tracing::info!(
                accepted = read.accepted,
                short = read.short,
                flushed = written.records,
                batches = written.batches,
                "=== Finish processing: {} ===",
                path.display()
            );
            Ok(FileSummary { path: path.to_path_buf(), read, written })
        }
        Err(e) => {
            if let Err(rb) = store.rollback() {
                tracing::warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

fn pump(reader: &mut RecordReader, writer: &mut BatchWriter<'_>, pb: Option<&ProgressBar>) -> Result<()> {
    let mut last = reader.byte_offset();
    while let Some(item) = reader.next() {
        writer.push(item?)?;
        if let Some(pb) = pb {
            let now = reader.byte_offset();
            pb.inc(now.saturating_sub(last));
            last = now;
        }
    }
    if let Some(pb) = pb {
        pb.inc(reader.byte_offset().saturating_sub(last));
    }
    Ok(())
}
