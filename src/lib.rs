mod config;
mod error;
mod paths;
mod progress;
mod util;

mod schema;
mod key_extractor;
mod reader;
mod batch;
mod ndjson;
mod store;
mod streaming;
mod dedupe;
mod export;
mod pipeline;

pub use crate::config::{DedupeSchedule, ETLOptions, StoreTarget};
pub use crate::error::{ConfigError, RowError};
pub use crate::pipeline::{LoadSummary, PlacesETL};

// Record schema and key derivation.
pub use crate::schema::{field_index, Record, ADDRESS_FIELD, DEFAULT_MIN_COLUMNS, FIELDS, HASH_FIELD, NAME_FIELD, SOURCE_FIELD};
pub use crate::key_extractor::{derive_key, derive_key_opt};

// Pipeline stages, usable on their own against any `RecordStore`.
pub use crate::reader::{ReadStats, ReaderOptions, RecordReader};
pub use crate::batch::{BatchStats, BatchWriter};
pub use crate::streaming::{ingest_file, FileSummary};
pub use crate::dedupe::{plan_deletions, remove_duplicates, DedupeSummary};
pub use crate::export::{export_csv, ExportOptions, ExportSummary, DEFAULT_EXPORT_CAP, DEFAULT_FLUSH_EVERY};

// Stores.
pub use crate::store::{DocumentStore, DuplicateGroup, RecordId, RecordStore, ScanOptions, SqliteStore, StoreKind, StoredRecord};

// Path helpers and logging setup for binaries.
pub use crate::paths::{discover_inputs, export_file_name, with_csv_extension};
pub use crate::util::init_tracing_once;
