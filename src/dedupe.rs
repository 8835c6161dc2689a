//! Remote duplicate pruning.
//!
//! Older uploads never enforced unique names, so the store can hold several
//! files with the same name. `docsync dedupe` keeps the first listed id for
//! each name and deletes the rest through the regular two-phase delete.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ItemFailure;
use crate::listing::list_remote;
use crate::models::RemoteIndex;
use crate::progress::SyncProgressReporter;
use crate::sync::delete_ids;
use crate::traits::RemoteStore;

/// One name that maps to more than one remote id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub name: String,
    pub kept_id: String,
    pub extra_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupeReport {
    pub vector_store_id: String,
    pub dry_run: bool,
    pub groups: Vec<DuplicateGroup>,
    pub to_delete_ids: Vec<String>,
    pub deleted: Vec<String>,
    pub failed_deletes: Vec<ItemFailure>,
    pub lookup_failures: Vec<ItemFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Duplicate groups in name order.
pub fn find_duplicates(index: &RemoteIndex) -> Vec<DuplicateGroup> {
    index
        .iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(name, ids)| DuplicateGroup {
            name: name.clone(),
            kept_id: ids[0].clone(),
            extra_ids: ids[1..].to_vec(),
        })
        .collect()
}

pub async fn run_dedupe(
    store: &dyn RemoteStore,
    dry_run: bool,
    batch_size: usize,
    progress: &dyn SyncProgressReporter,
) -> Result<DedupeReport> {
    let started_at = Utc::now();
    let listing = list_remote(store, progress).await?;
    let groups = find_duplicates(&listing.index);
    let to_delete_ids: Vec<String> = groups
        .iter()
        .flat_map(|g| g.extra_ids.iter().cloned())
        .collect();

    tracing::info!(
        groups = groups.len(),
        extra_files = to_delete_ids.len(),
        "found duplicate names in remote store"
    );

    let (deleted, failed_deletes) = if dry_run {
        (Vec::new(), Vec::new())
    } else {
        delete_ids(store, &to_delete_ids, batch_size, progress).await
    };

    Ok(DedupeReport {
        vector_store_id: store.store_id().to_string(),
        dry_run,
        groups,
        to_delete_ids,
        deleted,
        failed_deletes,
        lookup_failures: listing.lookup_failures,
        started_at,
        finished_at: Utc::now(),
    })
}
