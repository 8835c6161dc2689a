//! Core data models used throughout docset-sync.
//!
//! These types represent the documents enumerated from a source, the entries
//! listed from the remote store, and the plan and results of a sync run.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ItemFailure;

/// Where a document's bytes can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRef {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// An item in a SharePoint drive, downloaded only when uploaded.
    DriveItem { drive_id: String, item_id: String },
}

/// One authoritative document, keyed by `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub name: String,
    pub content_ref: ContentRef,
    pub size: Option<u64>,
}

impl DocumentRecord {
    /// Human-readable origin used in log lines.
    pub fn location(&self) -> String {
        match &self.content_ref {
            ContentRef::Path(p) => p.display().to_string(),
            ContentRef::DriveItem { drive_id, item_id } => {
                format!("drive:{}/item:{}", drive_id, item_id)
            }
        }
    }
}

/// Result of one enumeration pass over a source.
///
/// Records keep traversal order. A name is accepted once; later records
/// with the same name end up in `duplicates_ignored`.
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    records: Vec<DocumentRecord>,
    by_name: HashMap<String, usize>,
    pub duplicates_ignored: Vec<String>,
}

impl Enumeration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record unless its name was already taken. Returns `false` for
    /// an ignored duplicate.
    pub fn push(&mut self, record: DocumentRecord) -> bool {
        if self.by_name.contains_key(&record.name) {
            tracing::warn!(
                name = %record.name,
                location = %record.location(),
                "duplicate document name, keeping the first occurrence"
            );
            self.duplicates_ignored.push(record.name);
            return false;
        }
        self.by_name.insert(record.name.clone(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn get(&self, name: &str) -> Option<&DocumentRecord> {
        self.by_name.get(name).map(|&i| &self.records[i])
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<DocumentRecord> for Enumeration {
    fn from_iter<I: IntoIterator<Item = DocumentRecord>>(iter: I) -> Self {
        let mut enumeration = Enumeration::new();
        for record in iter {
            enumeration.push(record);
        }
        enumeration
    }
}

/// One entry of a remote listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub remote_id: String,
    /// Present when the listing payload already carries the filename.
    pub name: Option<String>,
}

/// One page of the remote listing.
#[derive(Debug, Clone, Default)]
pub struct RemotePage {
    pub entries: Vec<RemoteEntry>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Remote contents keyed by name. Ids per name keep listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteIndex {
    entries: BTreeMap<String, Vec<String>>,
}

impl RemoteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, remote_id: impl Into<String>) {
        self.entries
            .entry(name.into())
            .or_default()
            .push(remote_id.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn ids(&self, name: &str) -> &[String] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.entries.iter()
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of remote ids across all names.
    pub fn id_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl<N: Into<String>, I: Into<String>> FromIterator<(N, I)> for RemoteIndex {
    fn from_iter<T: IntoIterator<Item = (N, I)>>(iter: T) -> Self {
        let mut index = RemoteIndex::new();
        for (name, id) in iter {
            index.insert(name, id);
        }
        index
    }
}

/// Add / keep / remove sets computed before any mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub to_add: Vec<String>,
    pub to_keep: Vec<String>,
    pub to_remove: Vec<String>,
    /// Every remote id recorded for the names in `to_remove`.
    pub remove_ids: Vec<String>,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.remove_ids.is_empty()
    }
}

/// Outcome of applying a plan. Lists are appended in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub uploaded: Vec<String>,
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
    pub failed_uploads: Vec<ItemFailure>,
    pub failed_deletes: Vec<ItemFailure>,
    pub duplicates_ignored: Vec<String>,
    pub lookup_failures: Vec<ItemFailure>,
}

impl SyncResult {
    pub fn has_failures(&self) -> bool {
        !self.failed_uploads.is_empty() || !self.failed_deletes.is_empty()
    }
}

/// Everything a sync run reports.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub source: String,
    pub vector_store_id: String,
    pub dry_run: bool,
    pub delete_extra: bool,
    pub to_upload: Vec<String>,
    pub to_delete: Vec<String>,
    pub to_delete_ids: Vec<String>,
    #[serde(flatten)]
    pub result: SyncResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Extension of a file name as matched by the allow-list: lowercase with
/// a leading dot, or `None` when there is no extension.
pub fn extension_key(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
}
