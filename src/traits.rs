//! Extension traits for document sources and remote stores.
//!
//! The sync executor only talks to these two seams, so new origins and new
//! store backends plug in without touching the reconciliation logic.
//!
//! ```text
//! ┌──────────────────┐              ┌──────────────────┐
//! │  DocumentSource  │              │   RemoteStore    │
//! │  local / SP      │              │  OpenAI / memory │
//! └────────┬─────────┘              └────────┬─────────┘
//!          │ enumerate()                     │ list_page() / resolve_name()
//!          ▼                                 ▼
//!     local names ───────▶ reconcile ◀─── remote index
//!                              │
//!                              ▼
//!                   run_sync() → upload() / delete()
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;

use crate::error::{DeleteError, Operation, StoreError};
use crate::models::{DocumentRecord, Enumeration, RemotePage};

/// An origin that enumerates the authoritative document set.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use docset_sync::error::StoreError;
/// use docset_sync::models::{DocumentRecord, Enumeration};
/// use docset_sync::traits::{DocumentSource, StagedContent};
///
/// pub struct EmptySource;
///
/// #[async_trait]
/// impl DocumentSource for EmptySource {
///     fn name(&self) -> &str { "empty" }
///
///     async fn enumerate(&self) -> Result<Enumeration> {
///         Ok(Enumeration::new())
///     }
///
///     async fn stage(&self, record: &DocumentRecord) -> Result<StagedContent, StoreError> {
///         unreachable!("nothing to stage for {}", record.name)
///     }
/// }
/// ```
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Instance name (e.g. `"local"`, `"sharepoint"`).
    fn name(&self) -> &str;

    /// Source type identifier. Custom sources default to `"custom"`.
    fn source_type(&self) -> &str {
        "custom"
    }

    /// Label used in reports: `"{type}:{name}"`.
    fn source_label(&self) -> String {
        format!("{}:{}", self.source_type(), self.name())
    }

    /// Enumerate every document of the origin.
    ///
    /// Errors returned here are configuration-class and abort the run
    /// before anything is mutated.
    async fn enumerate(&self) -> Result<Enumeration>;

    /// Make a record's bytes readable from a local path.
    ///
    /// Remote sources download into a temporary file owned by the returned
    /// [`StagedContent`]; the file is removed when that value is dropped.
    async fn stage(&self, record: &DocumentRecord) -> Result<StagedContent, StoreError>;
}

/// The managed remote collection being kept in sync.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Identifier of the collection (e.g. a vector store id).
    fn store_id(&self) -> &str;

    /// Fetch one listing page starting after `cursor`.
    async fn list_page(&self, cursor: Option<&str>) -> Result<RemotePage, StoreError>;

    /// Look up the display name of a listed entry.
    async fn resolve_name(&self, remote_id: &str) -> Result<String, StoreError>;

    /// Register `content` as a blob named `name` and attach it to the
    /// collection. Returns the new remote id.
    async fn upload(&self, content: Vec<u8>, name: &str) -> Result<String, StoreError>;

    /// Detach `remote_id` from the collection and delete the blob. Both
    /// phases are attempted even when the first fails.
    async fn delete(&self, remote_id: &str) -> Result<(), DeleteError>;
}

/// Document bytes made available on the local filesystem for one upload.
#[derive(Debug)]
pub struct StagedContent {
    path: PathBuf,
    // Deletes the file on drop.
    _temp: Option<tempfile::TempPath>,
}

impl StagedContent {
    /// Content that already lives on disk and must not be removed.
    pub fn in_place(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _temp: None,
        }
    }

    /// Content downloaded into a temporary file.
    pub fn temporary(temp: tempfile::TempPath) -> Self {
        Self {
            path: temp.to_path_buf(),
            _temp: Some(temp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self._temp.is_some()
    }

    /// Read the whole file. The handle is closed before this returns.
    pub async fn read(&self) -> Result<Vec<u8>, StoreError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| StoreError::io(Operation::ReadContent, &self.path, e))
    }
}
