#![allow(dead_code)]

use anyhow::Result;
use places_etl::{
    derive_key, DuplicateGroup, Record, RecordId, RecordStore, ScanOptions, StoreKind, StoredRecord,
};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Header row as it appears in the scraped exports (never parsed, only skipped).
pub fn header() -> Vec<String> {
    places_etl::FIELDS.iter().map(|s| s.to_string()).collect()
}

/// The sample row: 38 columns, `Name = "Joe's Cafe"`, `full_address = "12 Main St, Springfield"`.
pub fn joes_cafe_row() -> Vec<String> {
    let mut row = place_row("Joe's Cafe", "12 Main St, Springfield");
    row.truncate(38);
    row
}

/// A full-width row with the given name and address; the other fields get
/// recognisable filler.
pub fn place_row(name: &str, address: &str) -> Vec<String> {
    places_etl::FIELDS
        .iter()
        .enumerate()
        .map(|(i, f)| match *f {
            "Name" => name.to_string(),
            "full_address" => address.to_string(),
            _ => format!("{f}-{i}"),
        })
        .collect()
}

/// Write `rows` (header first) as a fully quoted CSV file.
pub fn write_csv(path: &Path, rows: &[Vec<String>]) {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).unwrap();
    }
    let mut w = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .flexible(true)
        .from_path(path)
        .unwrap();
    for r in rows {
        w.write_record(r).unwrap();
    }
    w.flush().unwrap();
}

/// Header plus `n` distinct places named `Place {i}`.
pub fn write_places_csv(path: &Path, n: usize) {
    let mut rows = vec![header()];
    rows.extend((0..n).map(|i| place_row(&format!("Place {i}"), &format!("{i} Elm St"))));
    write_csv(path, &rows);
}

/// Read a text file line-by-line into strings (skips empty lines).
pub fn read_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let r = BufReader::new(f);
    r.lines().map(|l| l.unwrap()).filter(|s| !s.is_empty()).collect()
}

/// Read an exported CSV back as (header, rows).
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path).unwrap();
    let header = rdr.headers().unwrap().iter().map(str::to_string).collect();
    let rows = rdr
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

/// In-memory store that records every call it gets.
#[derive(Default)]
pub struct CountingStore {
    pub records: Vec<(RecordId, Record)>,
    pub insert_calls: usize,
    pub batch_sizes: Vec<usize>,
    pub delete_calls: usize,
    pub rollbacks: usize,
    /// Fail the n-th insert call (1-based).
    pub fail_insert_on: Option<usize>,
    next_id: RecordId,
}

impl CountingStore {
    pub fn new() -> Self {
        Self { next_id: 1, ..Default::default() }
    }

    pub fn failing_on(n: usize) -> Self {
        Self { fail_insert_on: Some(n), ..Self::new() }
    }

    pub fn keys(&self) -> Vec<String> {
        self.records.iter().map(|(_, r)| r.dedup_key().to_string()).collect()
    }
}

impl RecordStore for CountingStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Document
    }

    fn bulk_insert(&mut self, batch: &[Record]) -> Result<()> {
        self.insert_calls += 1;
        if self.fail_insert_on == Some(self.insert_calls) {
            anyhow::bail!("insert {} refused", self.insert_calls);
        }
        self.batch_sizes.push(batch.len());
        for r in batch {
            self.records.push((self.next_id, r.clone()));
            self.next_id += 1;
        }
        Ok(())
    }

    fn duplicate_groups(&mut self, min_size: usize) -> Result<Vec<DuplicateGroup>> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<RecordId>> = HashMap::new();
        for (id, r) in &self.records {
            let key = derive_key(r.name(), r.full_address());
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(*id);
        }
        Ok(order
            .into_iter()
            .filter_map(|key| {
                let ids = groups.remove(&key)?;
                (ids.len() >= min_size).then_some(DuplicateGroup { key, ids })
            })
            .collect())
    }

    fn bulk_delete(&mut self, ids: &[RecordId]) -> Result<u64> {
        self.delete_calls += 1;
        let before = self.records.len();
        self.records.retain(|(id, _)| !ids.contains(id));
        Ok((before - self.records.len()) as u64)
    }

    fn for_each_record(
        &mut self,
        scan: &ScanOptions,
        f: &mut dyn FnMut(StoredRecord) -> Result<()>,
    ) -> Result<u64> {
        let cap = scan.cap.unwrap_or(u64::MAX) as usize;
        let mut n = 0u64;
        for (id, record) in self.records.iter().take(cap) {
            f(StoredRecord { id: *id, record: record.clone() })?;
            n += 1;
        }
        Ok(n)
    }

    fn count(&mut self) -> Result<u64> {
        Ok(self.records.len() as u64)
    }

    fn rollback(&mut self) -> Result<()> {
        self.rollbacks += 1;
        Ok(())
    }
}

/// Wraps a `CountingStore` whose scans fail after `fail_after` records.
pub struct FailingScanStore {
    pub inner: CountingStore,
    pub fail_after: u64,
}

impl RecordStore for FailingScanStore {
    fn kind(&self) -> StoreKind {
        self.inner.kind()
    }

    fn bulk_insert(&mut self, batch: &[Record]) -> Result<()> {
        self.inner.bulk_insert(batch)
    }

    fn duplicate_groups(&mut self, min_size: usize) -> Result<Vec<DuplicateGroup>> {
        self.inner.duplicate_groups(min_size)
    }

    fn bulk_delete(&mut self, ids: &[RecordId]) -> Result<u64> {
        self.inner.bulk_delete(ids)
    }

    fn for_each_record(
        &mut self,
        scan: &ScanOptions,
        f: &mut dyn FnMut(StoredRecord) -> Result<()>,
    ) -> Result<u64> {
        let fail_after = self.fail_after;
        let mut seen = 0u64;
        self.inner.for_each_record(scan, &mut |rec| {
            if seen == fail_after {
                anyhow::bail!("scan interrupted after {seen} records");
            }
            seen += 1;
            f(rec)
        })
    }

    fn count(&mut self) -> Result<u64> {
        self.inner.count()
    }
}
