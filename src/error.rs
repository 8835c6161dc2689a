//! Typed errors for per-item operations.
//!
//! Fatal, run-level failures (bad configuration, unreachable source, a
//! listing page that cannot be fetched) travel as [`anyhow::Error`] with
//! context. Everything that happens to a single document or remote id is a
//! [`StoreError`], which the executor turns into an [`ItemFailure`] entry of
//! the report so the run can move on to the next item.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// The remote or local operation an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListPage,
    ResolveName,
    CreateBlob,
    AttachBlob,
    DetachBlob,
    DeleteBlob,
    Download,
    ReadContent,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListPage => "list_page",
            Operation::ResolveName => "resolve_name",
            Operation::CreateBlob => "create_blob",
            Operation::AttachBlob => "attach_blob",
            Operation::DetachBlob => "detach_blob",
            Operation::DeleteBlob => "delete_blob",
            Operation::Download => "download",
            Operation::ReadContent => "read_content",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed operation against the remote store or a document source.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("{operation} request for '{subject}' failed: {source}")]
    Transport {
        operation: Operation,
        subject: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{operation} for '{subject}' returned HTTP {status}: {body}")]
    Status {
        operation: Operation,
        subject: String,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("{operation} for '{subject}' returned an unexpected response: {detail}")]
    Malformed {
        operation: Operation,
        subject: String,
        detail: String,
    },

    /// Local file access failed.
    #[error("{operation} failed at {path}: {source}")]
    Io {
        operation: Operation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target does not exist in the store.
    #[error("{operation}: '{subject}' not found")]
    NotFound {
        operation: Operation,
        subject: String,
    },
}

impl StoreError {
    pub fn operation(&self) -> Operation {
        match self {
            StoreError::Transport { operation, .. }
            | StoreError::Status { operation, .. }
            | StoreError::Malformed { operation, .. }
            | StoreError::Io { operation, .. }
            | StoreError::NotFound { operation, .. } => *operation,
        }
    }

    pub(crate) fn transport(
        operation: Operation,
        subject: impl Into<String>,
        source: reqwest::Error,
    ) -> Self {
        StoreError::Transport {
            operation,
            subject: subject.into(),
            source,
        }
    }

    pub(crate) fn malformed(
        operation: Operation,
        subject: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        StoreError::Malformed {
            operation,
            subject: subject.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn io(operation: Operation, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Failure of the two-phase delete (detach, then delete the blob).
///
/// Both phases are always attempted, so `failures` holds one or two errors.
/// `blob_deleted` is true when only the detach failed and the blob itself
/// is gone.
#[derive(Debug, Error)]
#[error("delete of '{remote_id}' failed: {}", join_failures(.failures))]
pub struct DeleteError {
    pub remote_id: String,
    pub blob_deleted: bool,
    pub failures: Vec<StoreError>,
}

fn join_failures(failures: &[StoreError]) -> String {
    failures
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// One failed item as it appears in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Document name for uploads, remote id for lookups and deletes.
    pub subject: String,
    pub operation: Operation,
    pub error: String,
}

impl ItemFailure {
    pub fn new(subject: impl Into<String>, error: &StoreError) -> Self {
        Self {
            subject: subject.into(),
            operation: error.operation(),
            error: error.to_string(),
        }
    }
}
