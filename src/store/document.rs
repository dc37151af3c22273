use super::{collect_groups, DuplicateGroup, RecordId, RecordStore, ScanOptions, StoreKind, StoredRecord};
use crate::error::ConfigError;
use crate::key_extractor::derive_key_opt;
use crate::ndjson::{NdjsonReader, NdjsonWriter};
use crate::schema::{Record, SOURCE_FIELD};
use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const ID_FIELD: &str = "_id";

/// A document collection kept as a single NDJSON file (`<dir>/<collection>.ndjson`).
///
/// Inserts append; deletes rewrite the collection through a staged temp file
/// that replaces the original once complete. Identifiers are assigned
/// monotonically from the highest `_id` found on open.
pub struct DocumentStore {
    path: PathBuf,
    next_id: RecordId,
    read_buf: usize,
    write_buf: usize,
}

#[derive(Serialize)]
struct Document<'a> {
    #[serde(rename = "_id")]
    id: RecordId,
    #[serde(flatten)]
    record: &'a Record,
}

/// Just enough of a document to group it. Extra fields are ignored by serde.
#[derive(Deserialize)]
struct KeyView {
    #[serde(rename = "_id")]
    id: RecordId,
    hash: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    full_address: Option<String>,
}

#[derive(Deserialize)]
struct IdView {
    #[serde(rename = "_id")]
    id: RecordId,
}

impl DocumentStore {
    pub fn open(dir: &Path, collection: &str) -> Result<Self> {
        if collection.is_empty() || collection.contains(['/', '\\']) || collection.starts_with('.') {
            return Err(ConfigError::InvalidCollectionName(collection.to_string()).into());
        }
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join(format!("{collection}.ndjson"));
        if !path.exists() {
            NdjsonWriter::create(&path, 8 * 1024)
                .with_context(|| format!("create {}", path.display()))?
                .finish()?;
        }

        let mut store = Self { path, next_id: 1, read_buf: 256 * 1024, write_buf: 256 * 1024 };
        let mut max_id: RecordId = 0;
        store.scan_lines(|line| {
            if let Ok(v) = serde_json::from_str::<IdView>(line) {
                max_id = max_id.max(v.id);
            }
            Ok(true)
        })?;
        store.next_id = max_id + 1;
        tracing::debug!(path = %store.path.display(), next_id = store.next_id, "document store opened");
        Ok(store)
    }

    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buf = read_bytes;
        self.write_buf = write_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Feed every non-blank line to `f` until it returns `false`.
    fn scan_lines(&self, mut f: impl FnMut(&str) -> Result<bool>) -> Result<()> {
        let mut rdr = NdjsonReader::open(&self.path, self.read_buf)
            .with_context(|| format!("open {}", self.path.display()))?;
        let mut buf = String::with_capacity(4 * 1024);
        while rdr.read_line(&mut buf)? > 0 {
            if buf.trim().is_empty() { continue; }
            if !f(&buf)? { break; }
        }
        Ok(())
    }

    /// Decode one stored line; documents without a numeric `_id` are skipped.
    fn decode(line: &str) -> Option<StoredRecord> {
        let map: Map<String, Value> = match serde_json::from_str(line) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable document");
                return None;
            }
        };
        let id = map.get(ID_FIELD).and_then(Value::as_i64)?;
        let source = map.get(SOURCE_FIELD).and_then(value_text).unwrap_or_default();
        let record = Record::from_lookup(source, |field| map.get(field).and_then(value_text));
        Some(StoredRecord { id, record })
    }
}

/// Documents written by other tools may hold numbers or booleans.
fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl RecordStore for DocumentStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Document
    }

    fn bulk_insert(&mut self, batch: &[Record]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        // Encode first so the append is a single write.
        let mut encoded = Vec::with_capacity(batch.len() * 1024);
        let mut id = self.next_id;
        for record in batch {
            serde_json::to_writer(&mut encoded, &Document { id, record })?;
            encoded.push(b'\n');
            id += 1;
        }

        let mut w = NdjsonWriter::append(&self.path, self.write_buf)
            .with_context(|| format!("open {} for append", self.path.display()))?;
        w.write_raw(&encoded)?;
        w.finish()?;
        self.next_id = id;
        Ok(())
    }

    fn duplicate_groups(&mut self, min_size: usize) -> Result<Vec<DuplicateGroup>> {
        let mut groups: ahash::AHashMap<String, Vec<RecordId>> = ahash::AHashMap::with_capacity(64_000);
        self.scan_lines(|line| {
            match serde_json::from_str::<KeyView>(line) {
                Ok(v) => {
                    let key = v.hash.unwrap_or_else(|| derive_key_opt(v.name.as_deref(), v.full_address.as_deref()));
                    groups.entry(key).or_default().push(v.id);
                }
                Err(e) => tracing::warn!(error = %e, "document without usable _id left out of grouping"),
            }
            Ok(true)
        })?;
        Ok(collect_groups(groups, min_size))
    }

    fn bulk_delete(&mut self, ids: &[RecordId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let doomed: ahash::AHashSet<RecordId> = ids.iter().copied().collect();
        let tmp = self.path.with_extension("ndjson.inprogress");
        let mut w = NdjsonWriter::create(&tmp, self.write_buf)
            .with_context(|| format!("create {}", tmp.display()))?;

        let mut deleted = 0u64;
        self.scan_lines(|line| {
            let drop_it = serde_json::from_str::<IdView>(line)
                .map(|v| doomed.contains(&v.id))
                .unwrap_or(false);
            if drop_it {
                deleted += 1;
            } else {
                w.write_line(line)?;
            }
            Ok(true)
        })?;
        w.finish_atomic(&self.path)?;
        Ok(deleted)
    }

    fn for_each_record(
        &mut self,
        scan: &ScanOptions,
        f: &mut dyn FnMut(StoredRecord) -> Result<()>,
    ) -> Result<u64> {
        let cap = scan.cap.unwrap_or(u64::MAX);
        if cap == 0 {
            return Ok(0);
        }

        if !scan.randomize {
            let mut visited = 0u64;
            self.scan_lines(|line| {
                if let Some(rec) = Self::decode(line) {
                    f(rec)?;
                    visited += 1;
                }
                Ok(visited < cap)
            })?;
            return Ok(visited);
        }

        // Reservoir sample of `cap` documents, then shuffle the sample.
        // Without a cap the sample is the whole collection, held in memory.
        let mut rng = rand::thread_rng();
        let mut sample: Vec<StoredRecord> = Vec::new();
        let mut seen = 0u64;
        self.scan_lines(|line| {
            if let Some(rec) = Self::decode(line) {
                if seen < cap {
                    sample.push(rec);
                } else {
                    let j = rng.gen_range(0..=seen);
                    if j < cap {
                        sample[j as usize] = rec;
                    }
                }
                seen += 1;
            }
            Ok(true)
        })?;
        sample.shuffle(&mut rng);

        let visited = sample.len() as u64;
        for rec in sample {
            f(rec)?;
        }
        Ok(visited)
    }

    /// Documents `for_each_record` would visit; lines without a numeric `_id` are not counted.
    fn count(&mut self) -> Result<u64> {
        let mut n = 0u64;
        self.scan_lines(|line| {
            if serde_json::from_str::<IdView>(line).is_ok() {
                n += 1;
            }
            Ok(true)
        })?;
        Ok(n)
    }
}
