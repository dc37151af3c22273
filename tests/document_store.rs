#[path = "common/mod.rs"]
mod common;

use common::*;
use places_etl::{
    ingest_file, remove_duplicates, DocumentStore, Record, ReaderOptions, RecordStore, ScanOptions,
};
use std::collections::HashSet;

fn all_keys(store: &mut DocumentStore) -> Vec<String> {
    let mut keys = Vec::new();
    store
        .for_each_record(&ScanOptions::default(), &mut |s| {
            keys.push(s.record.dedup_key().to_string());
            Ok(())
        })
        .unwrap();
    keys
}

/// Documents keep every schema field plus `hash`, `source` and `_id`.
#[test]
fn inserted_documents_carry_derived_fields() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DocumentStore::open(dir.path(), "items").unwrap();
    store
        .bulk_insert(&[Record::from_row(joes_cafe_row(), "in/joes.csv")])
        .unwrap();

    let lines = read_lines(store.path());
    assert_eq!(lines.len(), 1);
    let doc: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(doc["_id"], 1);
    assert_eq!(doc["Name"], "Joe's Cafe");
    assert_eq!(doc["hash"], "joe's cafe12 main st, springfield");
    assert_eq!(doc["source"], "in/joes.csv");
    assert_eq!(doc["site_keywords"], "");
}

/// Loading the same file twice and deduping leaves one record per key.
#[test]
fn load_twice_then_dedupe_keeps_one_per_key() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("in").join("places.csv");
    let mut rows = vec![header()];
    rows.push(place_row("Joe's Cafe", "12 Main St"));
    rows.push(place_row("  JOE'S CAFE ", "12 MAIN ST  "));
    rows.push(place_row("Corner Deli", "3 Oak Ave"));
    write_csv(&csv, &rows);

    let mut store = DocumentStore::open(&dir.path().join("db"), "items").unwrap();
    for _ in 0..2 {
        ingest_file(&mut store, &csv, &ReaderOptions::default(), 2, None).unwrap();
    }
    assert_eq!(store.count().unwrap(), 6);

    let summary = remove_duplicates(&mut store).unwrap();
    assert_eq!(summary.groups, 2);
    assert_eq!(summary.deleted, 4);
    assert_eq!(store.count().unwrap(), 2);

    let keys = all_keys(&mut store);
    let unique: HashSet<_> = keys.iter().collect();
    assert_eq!(keys.len(), unique.len());
    assert!(unique.contains(&"joe's cafe12 main st".to_string()));
}

/// The first stored record of each group survives.
#[test]
fn survivor_is_first_inserted() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DocumentStore::open(dir.path(), "items").unwrap();
    store
        .bulk_insert(&[
            Record::from_row(place_row("Dup", "1 St"), "first.csv"),
            Record::from_row(place_row("Other", "2 St"), "first.csv"),
            Record::from_row(place_row("dup", "1 st"), "second.csv"),
        ])
        .unwrap();

    remove_duplicates(&mut store).unwrap();
    let mut sources = Vec::new();
    store
        .for_each_record(&ScanOptions::default(), &mut |s| {
            sources.push((s.id, s.record.source().to_string()));
            Ok(())
        })
        .unwrap();
    assert_eq!(sources, vec![(1, "first.csv".to_string()), (2, "first.csv".to_string())]);
}

/// Empty or all-distinct stores delete nothing.
#[test]
fn nothing_to_delete() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DocumentStore::open(dir.path(), "items").unwrap();
    assert_eq!(remove_duplicates(&mut store).unwrap().deleted, 0);

    store
        .bulk_insert(&[
            Record::from_row(place_row("A", "1 St"), "x.csv"),
            Record::from_row(place_row("B", "1 St"), "x.csv"),
        ])
        .unwrap();
    let summary = remove_duplicates(&mut store).unwrap();
    assert_eq!(summary.groups, 0);
    assert_eq!(summary.deleted, 0);
    assert_eq!(store.count().unwrap(), 2);
    assert_eq!(store.bulk_delete(&[]).unwrap(), 0);
}

/// Identifiers keep increasing across reopen, even after deletes.
#[test]
fn ids_continue_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = DocumentStore::open(dir.path(), "items").unwrap();
        store
            .bulk_insert(&[
                Record::from_row(place_row("A", "1"), "x"),
                Record::from_row(place_row("B", "2"), "x"),
                Record::from_row(place_row("C", "3"), "x"),
            ])
            .unwrap();
        assert_eq!(store.bulk_delete(&[1]).unwrap(), 1);
    }
    let mut store = DocumentStore::open(dir.path(), "items").unwrap();
    store.bulk_insert(&[Record::from_row(place_row("D", "4"), "y")]).unwrap();

    let mut ids = Vec::new();
    store
        .for_each_record(&ScanOptions::default(), &mut |s| {
            ids.push(s.id);
            Ok(())
        })
        .unwrap();
    assert_eq!(ids, vec![2, 3, 4]);
}

/// Random scans return a capped sample of distinct stored records.
#[test]
fn randomized_scan_respects_cap() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DocumentStore::open(dir.path(), "items").unwrap();
    let batch: Vec<Record> = (0..50)
        .map(|i| Record::from_row(place_row(&format!("P{i}"), "St"), "x"))
        .collect();
    store.bulk_insert(&batch).unwrap();

    let mut ids = HashSet::new();
    let n = store
        .for_each_record(&ScanOptions { cap: Some(10), randomize: true }, &mut |s| {
            ids.insert(s.id);
            Ok(())
        })
        .unwrap();
    assert_eq!(n, 10);
    assert_eq!(ids.len(), 10);
    assert!(ids.iter().all(|id| (1..=50).contains(id)));
}

/// Documents written without `hash` are grouped by the key derived from their fields.
#[test]
fn groups_documents_without_hash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("items.ndjson");
    std::fs::write(
        &path,
        concat!(
            r#"{"_id":1,"Name":"Bar","full_address":"5 Rd"}"#,
            "\n",
            r#"{"_id":2,"Name":"BAR ","full_address":" 5 rd","rating":4.5}"#,
            "\n"
        ),
    )
    .unwrap();

    let mut store = DocumentStore::open(dir.path(), "items").unwrap();
    let groups = store.duplicate_groups(2).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].key, "bar5 rd");
    assert_eq!(groups[0].ids, vec![1, 2]);
}

#[test]
fn rejects_bad_collection_name() {
    let dir = tempfile::tempdir().unwrap();
    assert!(DocumentStore::open(dir.path(), "").is_err());
    assert!(DocumentStore::open(dir.path(), "../escape").is_err());
}

/// An uncapped random scan visits every document exactly once.
#[test]
fn randomized_scan_without_cap_visits_all() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DocumentStore::open(dir.path(), "items").unwrap();
    let batch: Vec<Record> = (0..25)
        .map(|i| Record::from_row(place_row(&format!("P{i}"), "St"), "x"))
        .collect();
    store.bulk_insert(&batch).unwrap();

    let mut ids = Vec::new();
    let n = store
        .for_each_record(&ScanOptions { cap: None, randomize: true }, &mut |s| {
            ids.push(s.id);
            Ok(())
        })
        .unwrap();
    assert_eq!(n, 25);
    ids.sort();
    assert_eq!(ids, (1..=25).collect::<Vec<_>>());
}

/// `count` agrees with what a scan visits: lines without a numeric `_id` are left out.
#[test]
fn count_skips_undecodable_lines() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("items.ndjson"),
        concat!(
            r#"{"_id":1,"Name":"Kept","full_address":"1 St"}"#,
            "\n",
            "not json at all\n",
            r#"{"Name":"No id"}"#,
            "\n",
            r#"{"_id":"7","Name":"Text id"}"#,
            "\n",
            r#"{"_id":2,"Name":"Also kept"}"#,
            "\n"
        ),
    )
    .unwrap();

    let mut store = DocumentStore::open(dir.path(), "items").unwrap();
    let visited = store.for_each_record(&ScanOptions::default(), &mut |_| Ok(())).unwrap();
    assert_eq!(visited, 2);
    assert_eq!(store.count().unwrap(), visited);
}
