#[path = "common/mod.rs"]
mod common;

use common::*;
use places_etl::{ingest_file, BatchWriter, ReaderOptions, Record};

fn records(n: usize) -> Vec<Record> {
    (0..n).map(|i| Record::from_row(place_row(&format!("P{i}"), "Addr"), "mem")).collect()
}

/// N = k * capacity records produce exactly k inserts, all full.
#[test]
fn exact_multiple_flushes_k_times() {
    let mut store = CountingStore::new();
    let mut w = BatchWriter::new(&mut store, 4).unwrap();
    for r in records(12) {
        w.push(r).unwrap();
    }
    let stats = w.finish().unwrap();

    assert_eq!(stats.records, 12);
    assert_eq!(stats.batches, 3);
    assert_eq!(store.insert_calls, 3);
    assert_eq!(store.batch_sizes, vec![4, 4, 4]);
}

/// A partial tail is flushed once at the end.
#[test]
fn remainder_is_flushed_at_end() {
    let mut store = CountingStore::new();
    let mut w = BatchWriter::new(&mut store, 4).unwrap();
    for r in records(10) {
        w.push(r).unwrap();
    }
    assert_eq!(w.pending(), 2);
    w.finish().unwrap();

    assert_eq!(store.batch_sizes, vec![4, 4, 2]);
    assert_eq!(store.records.len(), 10);
}

/// No records means no store call at all.
#[test]
fn empty_input_makes_no_calls() {
    let mut store = CountingStore::new();
    let mut w = BatchWriter::new(&mut store, 4).unwrap();
    w.flush().unwrap();
    let stats = w.finish().unwrap();

    assert_eq!(stats.batches, 0);
    assert_eq!(store.insert_calls, 0);
}

#[test]
fn zero_capacity_is_rejected() {
    let mut store = CountingStore::new();
    assert!(BatchWriter::new(&mut store, 0).is_err());
}

#[test]
fn default_capacity_follows_store_kind() {
    let mut store = CountingStore::new();
    let w = BatchWriter::with_default_capacity(&mut store);
    assert_eq!(w.capacity(), 1_000);
}

/// Flushed count equals data rows minus short rows.
#[test]
fn ingest_counts_match_accepted_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.csv");
    let mut rows = vec![header()];
    for i in 0..7 {
        rows.push(place_row(&format!("Good {i}"), "1 St"));
    }
    for i in 0..2 {
        let mut short = place_row(&format!("Short {i}"), "2 St");
        short.truncate(5);
        rows.push(short);
    }
    write_csv(&path, &rows);

    let mut store = CountingStore::new();
    let summary = ingest_file(&mut store, &path, &ReaderOptions::default(), 3, None).unwrap();

    assert_eq!(summary.read.data_rows, 9);
    assert_eq!(summary.read.short, 2);
    assert_eq!(summary.written.records, 7);
    assert_eq!(store.batch_sizes, vec![3, 3, 1]);
}

/// A failed insert stops the file; earlier batches stay and the store is rolled back.
#[test]
fn failed_insert_keeps_earlier_batches() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ten.csv");
    write_places_csv(&path, 10);

    let mut store = CountingStore::failing_on(2);
    let res = ingest_file(&mut store, &path, &ReaderOptions::default(), 4, None);

    assert!(res.is_err());
    assert_eq!(store.records.len(), 4);
    assert_eq!(store.rollbacks, 1);
}
