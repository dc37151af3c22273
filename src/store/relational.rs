use super::{collect_groups, DuplicateGroup, RecordId, RecordStore, ScanOptions, StoreKind, StoredRecord};
use crate::error::ConfigError;
use crate::key_extractor::derive_key_opt;
use crate::schema::{Record, ADDRESS_FIELD, FIELDS, NAME_FIELD};
use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::{params, params_from_iter, Connection};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Records stored in one SQLite table: `id INTEGER PRIMARY KEY` plus one TEXT
/// column per schema field. Derived fields are not persisted; the dedup key is
/// re-derived from `Name` and `full_address` when grouping.
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
    table: String,
    insert_sql: String,
    select_sql: String,
}

fn table_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static table-name pattern"))
}

fn quoted_columns() -> String {
    FIELDS.iter().map(|f| format!("\"{f}\"")).collect::<Vec<_>>().join(", ")
}

impl SqliteStore {
    /// Open (or create) `path` and make sure `table` exists.
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        if !table_name_re().is_match(table) {
            return Err(ConfigError::InvalidTableName(table.to_string()).into());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let conn = Connection::open(path).with_context(|| format!("open sqlite {}", path.display()))?;
        let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get(0))?;
        tracing::trace!(journal_mode = %mode, "sqlite journal mode");

        let column_defs = FIELDS.iter().map(|f| format!("\"{f}\" TEXT NOT NULL DEFAULT ''")).collect::<Vec<_>>().join(",\n    ");
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (\n    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    {column_defs}\n);"
        ))
        .with_context(|| format!("create table {table}"))?;

        let placeholders = (1..=FIELDS.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
        let insert_sql = format!("INSERT INTO \"{table}\" ({}) VALUES ({placeholders})", quoted_columns());
        let select_sql = format!("SELECT id, {} FROM \"{table}\"", quoted_columns());

        tracing::debug!(path = %path.display(), table, "sqlite store opened");
        Ok(Self { conn, path: path.to_path_buf(), table: table.to_string(), insert_sql, select_sql })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl RecordStore for SqliteStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Relational
    }

    /// One transaction per batch, committed before returning. A failure drops
    /// the transaction, which rolls it back.
    fn bulk_insert(&mut self, batch: &[Record]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&self.insert_sql)?;
            for record in batch {
                stmt.execute(params_from_iter(record.values().iter()))?;
            }
        }
        tx.commit().context("commit batch")?;
        Ok(())
    }

    fn duplicate_groups(&mut self, min_size: usize) -> Result<Vec<DuplicateGroup>> {
        let sql = format!(
            "SELECT id, \"{NAME_FIELD}\", \"{ADDRESS_FIELD}\" FROM \"{}\" ORDER BY id",
            self.table
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut groups: ahash::AHashMap<String, Vec<RecordId>> = ahash::AHashMap::with_capacity(64_000);
        while let Some(row) = rows.next()? {
            let id: RecordId = row.get(0)?;
            let name: Option<String> = row.get(1)?;
            let address: Option<String> = row.get(2)?;
            groups
                .entry(derive_key_opt(name.as_deref(), address.as_deref()))
                .or_default()
                .push(id);
        }
        Ok(collect_groups(groups, min_size))
    }

    fn bulk_delete(&mut self, ids: &[RecordId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut deleted = 0u64;
        {
            let mut stmt = tx.prepare(&format!("DELETE FROM \"{}\" WHERE id = ?1", self.table))?;
            for id in ids {
                deleted += stmt.execute(params![id])? as u64;
            }
        }
        tx.commit().context("commit delete")?;
        Ok(deleted)
    }

    fn for_each_record(
        &mut self,
        scan: &ScanOptions,
        f: &mut dyn FnMut(StoredRecord) -> Result<()>,
    ) -> Result<u64> {
        let order = if scan.randomize { "ORDER BY random()" } else { "ORDER BY id" };
        let sql = format!("{} {order} LIMIT ?1", self.select_sql);
        // SQLite treats a negative LIMIT as "no limit".
        let limit: i64 = scan.cap.map(|c| i64::try_from(c).unwrap_or(i64::MAX)).unwrap_or(-1);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![limit])?;
        let mut visited = 0u64;
        while let Some(row) = rows.next()? {
            let id: RecordId = row.get(0)?;
            let mut values = Vec::with_capacity(FIELDS.len());
            for i in 0..FIELDS.len() {
                let v: Option<String> = row.get(i + 1)?;
                values.push(v.unwrap_or_default());
            }
            f(StoredRecord { id, record: Record::from_row(values, "") })?;
            visited += 1;
        }
        Ok(visited)
    }

    fn count(&mut self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", self.table), [], |r| r.get(0))?;
        Ok(n as u64)
    }

    /// Rolls back a transaction left open on the connection. `bulk_insert` and
    /// `bulk_delete` roll their own transaction back when it is dropped, so
    /// after their failures this finds nothing open and does nothing.
    fn rollback(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK").context("rollback")?;
            tracing::warn!(table = %self.table, "rolled back open transaction");
        }
        Ok(())
    }
}
