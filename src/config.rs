use crate::error::ConfigError;
use crate::export::{DEFAULT_EXPORT_CAP, DEFAULT_FLUSH_EVERY};
use crate::schema::DEFAULT_MIN_COLUMNS;
use crate::store::StoreKind;
use std::path::{Path, PathBuf};

/// Where records are persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreTarget {
    /// NDJSON collection at `<dir>/<collection>.ndjson`.
    Document { dir: PathBuf, collection: String },
    /// SQLite database file with one table.
    Relational { path: PathBuf, table: String },
}

impl StoreTarget {
    pub fn document() -> Self {
        StoreTarget::Document { dir: PathBuf::from("./data"), collection: "items".to_string() }
    }

    pub fn relational() -> Self {
        StoreTarget::Relational { path: PathBuf::from("./data/data.sqlite"), table: "csv_data".to_string() }
    }

    pub fn kind(&self) -> StoreKind {
        match self {
            StoreTarget::Document { .. } => StoreKind::Document,
            StoreTarget::Relational { .. } => StoreKind::Relational,
        }
    }
}

/// When the duplicate resolver runs during a load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DedupeSchedule {
    /// After every input file.
    PerFile,
    /// Once, after the last input file.
    AfterLoad,
    Never,
}

/// User-facing options with defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct ETLOptions {
    pub input_dir: PathBuf,
    pub file_suffix: String,          // matched case-insensitively, without the dot
    pub output_dir: PathBuf,
    pub store: StoreTarget,
    pub batch_capacity: Option<usize>, // None = store default
    pub min_columns: usize,
    pub delimiter: u8,
    pub dedupe: Option<DedupeSchedule>, // None = store default
    pub export_cap: Option<u64>,      // None = no cap
    pub randomize_export: Option<bool>, // None = store default
    pub export_flush_every: u64,
    pub progress: bool,
    pub progress_label: Option<String>,
    pub log_file: Option<PathBuf>,

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
}

impl Default for ETLOptions {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./csv_data"),
            file_suffix: "csv".to_string(),
            output_dir: PathBuf::from("./output_csv"),
            store: StoreTarget::document(),
            batch_capacity: None,
            min_columns: DEFAULT_MIN_COLUMNS,
            delimiter: b',',
            dedupe: None,
            export_cap: Some(DEFAULT_EXPORT_CAP),
            randomize_export: None,
            export_flush_every: DEFAULT_FLUSH_EVERY,
            progress: true,
            progress_label: None,
            log_file: None,

            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl ETLOptions {
    pub fn with_input_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.input_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_file_suffix(mut self, suffix: impl AsRef<str>) -> Self {
        self.file_suffix = suffix.as_ref().trim().trim_start_matches('.').to_string();
        self
    }
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_store(mut self, store: StoreTarget) -> Self {
        self.store = store;
        self
    }
    pub fn with_batch_capacity(mut self, n: usize) -> Self {
        self.batch_capacity = Some(n);
        self
    }
    pub fn with_min_columns(mut self, n: usize) -> Self {
        self.min_columns = n;
        self
    }
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
    pub fn with_dedupe(mut self, schedule: DedupeSchedule) -> Self {
        self.dedupe = Some(schedule);
        self
    }
    pub fn with_export_cap(mut self, cap: Option<u64>) -> Self {
        self.export_cap = cap;
        self
    }
    pub fn with_randomize_export(mut self, yes: bool) -> Self {
        self.randomize_export = Some(yes);
        self
    }
    pub fn with_export_flush_every(mut self, rows: u64) -> Self {
        self.export_flush_every = rows.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
    pub fn with_log_file(mut self, path: impl AsRef<Path>) -> Self {
        self.log_file = Some(path.as_ref().to_path_buf());
        self
    }

    // IO buffers tuning
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }

    // -------- resolved values (explicit setting, else store default) --------

    /// Reject settings no store operation can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_capacity == Some(0) {
            return Err(ConfigError::ZeroBatchCapacity);
        }
        Ok(())
    }

    pub fn effective_batch_capacity(&self) -> usize {
        self.batch_capacity.unwrap_or_else(|| self.store.kind().default_batch_capacity())
    }

    /// Document stores dedupe after every file by default; relational stores do not.
    pub fn effective_dedupe(&self) -> DedupeSchedule {
        self.dedupe.unwrap_or(match self.store.kind() {
            StoreKind::Document => DedupeSchedule::PerFile,
            StoreKind::Relational => DedupeSchedule::Never,
        })
    }

    /// Relational exports default to random order, document exports to store order.
    pub fn effective_randomize_export(&self) -> bool {
        self.randomize_export.unwrap_or(self.store.kind() == StoreKind::Relational)
    }
}
