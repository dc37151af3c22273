use crate::store::{DuplicateGroup, RecordId, RecordStore};
use anyhow::{Context, Result};
use std::time::Instant;

/// Outcome of one duplicate-removal pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DedupeSummary {
    /// Keys with more than one stored record.
    pub groups: u64,
    /// Identifiers submitted for deletion.
    pub scheduled: u64,
    /// Records the store reports as deleted.
    pub deleted: u64,
}

/// Everything but the first member of each group.
pub fn plan_deletions(groups: &[DuplicateGroup]) -> Vec<RecordId> {
    groups
        .iter()
        .flat_map(|g| g.ids.iter().skip(1).copied())
        .collect()
}

/// Group the whole store by dedup key, keep the first identifier the store
/// enumerated for each key, and delete the rest in a single bulk delete.
///
/// The bulk delete is issued even when nothing is scheduled; stores treat an
/// empty delete as a no-op. Errors are returned as-is; nothing is retried.
pub fn remove_duplicates(store: &mut dyn RecordStore) -> Result<DedupeSummary> {
    tracing::info!("====== Removing duplicates =======");
    let started = Instant::now();

    let groups = store.duplicate_groups(2).context("group records by dedup key")?;
    let doomed = plan_deletions(&groups);
    let deleted = store.bulk_delete(&doomed).context("bulk delete duplicates")?;

    let summary = DedupeSummary {
        groups: groups.len() as u64,
        scheduled: doomed.len() as u64,
        deleted,
    };
    tracing::info!(
        groups = summary.groups,
        deleted = summary.deleted,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "duplicates removed"
    );
    Ok(summary)
}
