//! Persistent stores the pipeline loads into, dedupes and exports from.
//!
//! `RecordStore` is the seam: the batch writer, duplicate resolver and exporter
//! only see this trait. Two backends ship with the crate:
//!  - `DocumentStore`: one NDJSON collection file, documents carry `_id`,
//!    every schema field, `hash` and `source`.
//!  - `SqliteStore`: one SQLite table with an integer `id` and a TEXT column
//!    per schema field.

mod document;
mod relational;

pub use document::DocumentStore;
pub use relational::SqliteStore;

use crate::schema::Record;
use anyhow::Result;

/// Identifier assigned by the store (`_id` / `id`).
pub type RecordId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Document,
    Relational,
}

impl StoreKind {
    /// Records buffered before one bulk insert.
    pub fn default_batch_capacity(self) -> usize {
        match self {
            StoreKind::Document => 1_000,
            StoreKind::Relational => 10_000,
        }
    }
}

/// Identifiers sharing one dedup key, in the order the store enumerated them.
#[derive(Clone, Debug)]
pub struct DuplicateGroup {
    pub key: String,
    pub ids: Vec<RecordId>,
}

/// How `for_each_record` walks the store.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanOptions {
    /// Stop after this many records (`None` = all).
    pub cap: Option<u64>,
    /// Visit records in random order (a random sample when capped). The
    /// document store buffers the sample, so an uncapped random scan holds
    /// the whole collection in memory.
    pub randomize: bool,
}

/// A record as read back from a store.
#[derive(Clone, Debug)]
pub struct StoredRecord {
    pub id: RecordId,
    pub record: Record,
}

pub trait RecordStore {
    fn kind(&self) -> StoreKind;

    /// Persist `batch` as one write. An empty batch is a no-op.
    fn bulk_insert(&mut self, batch: &[Record]) -> Result<()>;

    /// Group every stored identifier by dedup key, keeping groups with at
    /// least `min_size` members.
    fn duplicate_groups(&mut self, min_size: usize) -> Result<Vec<DuplicateGroup>>;

    /// Delete `ids` in one operation; returns how many were removed.
    /// An empty slice is a no-op.
    fn bulk_delete(&mut self, ids: &[RecordId]) -> Result<u64>;

    /// Stream stored records into `f`; returns how many were visited.
    fn for_each_record(
        &mut self,
        scan: &ScanOptions,
        f: &mut dyn FnMut(StoredRecord) -> Result<()>,
    ) -> Result<u64>;

    fn count(&mut self) -> Result<u64>;

    /// Undo whatever write is still open after a failure.
    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keep groups of at least `min_size`, preserving member order.
pub(crate) fn collect_groups(
    groups: ahash::AHashMap<String, Vec<RecordId>>,
    min_size: usize,
) -> Vec<DuplicateGroup> {
    groups
        .into_iter()
        .filter(|(_, ids)| ids.len() >= min_size.max(1))
        .map(|(key, ids)| DuplicateGroup { key, ids })
        .collect()
}
