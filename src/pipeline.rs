use crate::config::{DedupeSchedule, ETLOptions, StoreTarget};
use crate::dedupe::{remove_duplicates, DedupeSummary};
use crate::export::{export_csv, ExportOptions, ExportSummary};
use crate::paths::{discover_inputs, export_file_name, total_size, with_csv_extension};
use crate::progress::{make_count_progress, make_progress_bar_labeled};
use crate::reader::ReaderOptions;
use crate::store::{DocumentStore, RecordStore, SqliteStore};
use crate::streaming::{ingest_file, FileSummary};
use crate::util::init_tracing_once;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Clone, Default)]
pub struct PlacesETL {
    pub(crate) opts: ETLOptions,
}

/// Totals for a multi-file load.
#[derive(Clone, Debug, Default)]
pub struct LoadSummary {
    pub files: Vec<FileSummary>,
    /// Files abandoned because of a file-level or store error.
    pub failed: Vec<(PathBuf, String)>,
    pub records_flushed: u64,
    pub duplicates_deleted: u64,
}

impl PlacesETL {
    pub fn new() -> Self {
        Self { opts: ETLOptions::default() }
    }

    pub fn with_options(opts: ETLOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &ETLOptions {
        &self.opts
    }

    // -------- Builder methods --------
    pub fn input_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_input_dir(dir); self }
    pub fn file_suffix(mut self, suffix: impl AsRef<str>) -> Self { self.opts = self.opts.with_file_suffix(suffix); self }
    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_output_dir(dir); self }
    pub fn store(mut self, target: StoreTarget) -> Self { self.opts = self.opts.with_store(target); self }
    pub fn document_store(self, dir: impl AsRef<Path>, collection: impl Into<String>) -> Self {
        self.store(StoreTarget::Document { dir: dir.as_ref().to_path_buf(), collection: collection.into() })
    }
    pub fn sqlite_store(self, path: impl AsRef<Path>, table: impl Into<String>) -> Self {
        self.store(StoreTarget::Relational { path: path.as_ref().to_path_buf(), table: table.into() })
    }
    pub fn batch_capacity(mut self, n: usize) -> Self { self.opts = self.opts.with_batch_capacity(n); self }
    pub fn min_columns(mut self, n: usize) -> Self { self.opts = self.opts.with_min_columns(n); self }
    pub fn delimiter(mut self, d: u8) -> Self { self.opts = self.opts.with_delimiter(d); self }
    pub fn dedupe(mut self, schedule: DedupeSchedule) -> Self { self.opts = self.opts.with_dedupe(schedule); self }
    pub fn export_cap(mut self, cap: Option<u64>) -> Self { self.opts = self.opts.with_export_cap(cap); self }
    pub fn randomize_export(mut self, yes: bool) -> Self { self.opts = self.opts.with_randomize_export(yes); self }
    pub fn export_flush_every(mut self, rows: u64) -> Self { self.opts = self.opts.with_export_flush_every(rows); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn log_file(mut self, path: impl AsRef<Path>) -> Self { self.opts = self.opts.with_log_file(path); self }
    pub fn io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self { self.opts = self.opts.with_io_buffers(read_bytes, write_bytes); self }

    // -------- Operations --------

    /// Validate the options and open the configured store. Failing here is the
    /// one error a run cannot skip past.
    pub fn open_store(&self) -> Result<Box<dyn RecordStore>> {
        init_tracing_once(self.opts.log_file.as_deref());
        self.opts.validate()?;
        match &self.opts.store {
            StoreTarget::Document { dir, collection } => {
                let store = DocumentStore::open(dir, collection)
                    .with_context(|| format!("open document store {}/{collection}", dir.display()))?
                    .with_io_buffers(self.opts.read_buffer_bytes, self.opts.write_buffer_bytes);
                Ok(Box::new(store))
            }
            StoreTarget::Relational { path, table } => {
                let store = SqliteStore::open(path, table)
                    .with_context(|| format!("open sqlite store {}", path.display()))?;
                Ok(Box::new(store))
            }
        }
    }

    /// Load every matching file in the input directory, one file at a time.
    /// File and store failures are logged and the run continues.
    pub fn load(&self) -> Result<LoadSummary> {
        init_tracing_once(self.opts.log_file.as_deref());
        let files = discover_inputs(&self.opts.input_dir, &self.opts.file_suffix);
        if files.is_empty() {
            tracing::warn!(dir = %self.opts.input_dir.display(), "No input files found. Check input_dir and file_suffix.");
        } else {
            tracing::info!("Planned {} files for loading.", files.len());
        }
        let mut store = self.open_store()?;
        Ok(self.load_files(store.as_mut(), &files))
    }

    /// Load a single file. A path without a `.csv` extension gets one appended.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<LoadSummary> {
        init_tracing_once(self.opts.log_file.as_deref());
        let path = with_csv_extension(path.as_ref());
        let mut store = self.open_store()?;
        Ok(self.load_files(store.as_mut(), &[path]))
    }

    /// Ingest `files` into an already-open store, applying the dedupe schedule.
    pub fn load_files(&self, store: &mut dyn RecordStore, files: &[PathBuf]) -> LoadSummary {
        let reader_opts = ReaderOptions {
            delimiter: self.opts.delimiter,
            min_columns: self.opts.min_columns,
            read_buffer_bytes: self.opts.read_buffer_bytes,
        };
        let capacity = self.opts.effective_batch_capacity();
        let schedule = self.opts.effective_dedupe();

        let pb = if self.opts.progress {
            Some(make_progress_bar_labeled(total_size(files), self.opts.progress_label.as_deref()))
        } else {
            None
        };

        let mut summary = LoadSummary::default();
        for path in files {
            tracing::info!("Processing CSV: {}", path.display());
            match ingest_file(store, path, &reader_opts, capacity, pb.as_ref()) {
                Ok(fs) => {
                    summary.records_flushed += fs.written.records;
                    summary.files.push(fs);
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), "Error when process data: {e:#}");
                    summary.failed.push((path.clone(), format!("{e:#}")));
                }
            }
            if schedule == DedupeSchedule::PerFile {
                summary.duplicates_deleted += dedupe_logged(store).deleted;
            }
        }
        if schedule == DedupeSchedule::AfterLoad && !files.is_empty() {
            summary.duplicates_deleted += dedupe_logged(store).deleted;
        }

        if let Some(pb) = pb { pb.finish_with_message("done"); }
        tracing::info!(
            files = summary.files.len(),
            failed = summary.failed.len(),
            flushed = summary.records_flushed,
            deleted = summary.duplicates_deleted,
            "load finished"
        );
        summary
    }

    /// One duplicate-removal pass over the configured store.
    pub fn remove_duplicates(&self) -> Result<DedupeSummary> {
        let mut store = self.open_store()?;
        remove_duplicates(store.as_mut())
    }

    /// Export to `<output_dir>/<index>_output.csv`.
    pub fn export(&self, index: usize) -> Result<ExportSummary> {
        let out = export_file_name(&self.opts.output_dir, index);
        self.export_to(&out)
    }

    /// Export to an explicit file; `.csv` is appended when missing.
    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<ExportSummary> {
        let out = with_csv_extension(path.as_ref());
        let mut store = self.open_store()?;
        self.export_from(store.as_mut(), &out)
    }

    /// Export from an already-open store.
    pub fn export_from(&self, store: &mut dyn RecordStore, out: &Path) -> Result<ExportSummary> {
        let opts = ExportOptions {
            cap: self.opts.export_cap,
            randomize: self.opts.effective_randomize_export(),
            flush_every: self.opts.export_flush_every,
            write_buffer_bytes: self.opts.write_buffer_bytes,
        };
        let pb = if self.opts.progress {
            let stored = store.count().context("count stored records")?;
            let total = opts.cap.map_or(stored, |c| c.min(stored));
            Some(make_count_progress(total, self.opts.progress_label.as_deref().unwrap_or("Export")))
        } else {
            None
        };
        export_csv(store, out, &opts, pb)
    }
}

/// Dedupe inside a load: failures are logged, never fatal.
fn dedupe_logged(store: &mut dyn RecordStore) -> DedupeSummary {
    match remove_duplicates(store) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Error when remove duplicates. Details: {e:#}");
            DedupeSummary::default()
        }
    }
}
