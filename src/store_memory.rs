//! In-memory [`RemoteStore`] implementation for testing and embedding.
//!
//! Blobs and collection membership are tracked separately, like the real
//! store: a blob can exist detached. Listing pages never carry names, so
//! callers go through [`RemoteStore::resolve_name`] just as they do against
//! the HTTP API.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{DeleteError, Operation, StoreError};
use crate::models::{RemoteEntry, RemotePage};
use crate::traits::RemoteStore;

struct StoredBlob {
    id: String,
    name: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct State {
    blobs: Vec<StoredBlob>,
    // Attached blob ids in attach order.
    members: Vec<String>,
    mutations: u64,
}

/// In-memory vector store.
pub struct InMemoryStore {
    id: String,
    page_size: usize,
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            page_size: 100,
            state: RwLock::new(State::default()),
        }
    }

    /// Use a smaller page size to exercise pagination.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Insert an attached blob without counting it as a mutation.
    pub fn seed(&self, name: &str, bytes: &[u8]) -> String {
        let mut state = self.state.write().unwrap();
        let id = new_file_id();
        state.blobs.push(StoredBlob {
            id: id.clone(),
            name: name.to_string(),
            bytes: bytes.to_vec(),
        });
        state.members.push(id.clone());
        id
    }

    /// Names of attached blobs, sorted.
    pub fn names(&self) -> Vec<String> {
        let state = self.state.read().unwrap();
        let mut names: Vec<String> = state
            .members
            .iter()
            .filter_map(|id| state.blobs.iter().find(|b| &b.id == id))
            .map(|b| b.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Content of a blob, attached or not.
    pub fn content(&self, remote_id: &str) -> Option<Vec<u8>> {
        let state = self.state.read().unwrap();
        state
            .blobs
            .iter()
            .find(|b| b.id == remote_id)
            .map(|b| b.bytes.clone())
    }

    /// Number of blobs, including detached ones.
    pub fn blob_count(&self) -> usize {
        self.state.read().unwrap().blobs.len()
    }

    /// Number of successful mutating calls (create, attach, detach, delete).
    pub fn mutation_count(&self) -> u64 {
        self.state.read().unwrap().mutations
    }
}

fn new_file_id() -> String {
    format!("file-{}", uuid::Uuid::new_v4().simple())
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    fn store_id(&self) -> &str {
        &self.id
    }

    async fn list_page(&self, cursor: Option<&str>) -> Result<RemotePage, StoreError> {
        let state = self.state.read().unwrap();
        let start = match cursor {
            None => 0,
            Some(after) => match state.members.iter().position(|id| id == after) {
                Some(pos) => pos + 1,
                None => {
                    return Err(StoreError::NotFound {
                        operation: Operation::ListPage,
                        subject: after.to_string(),
                    })
                }
            },
        };

        let end = (start + self.page_size).min(state.members.len());
        let entries: Vec<RemoteEntry> = state.members[start..end]
            .iter()
            .map(|id| RemoteEntry {
                remote_id: id.clone(),
                name: None,
            })
            .collect();
        let next_cursor = entries.last().map(|e| e.remote_id.clone());

        Ok(RemotePage {
            has_more: end < state.members.len(),
            next_cursor,
            entries,
        })
    }

    async fn resolve_name(&self, remote_id: &str) -> Result<String, StoreError> {
        let state = self.state.read().unwrap();
        state
            .blobs
            .iter()
            .find(|b| b.id == remote_id)
            .map(|b| b.name.clone())
            .ok_or_else(|| StoreError::NotFound {
                operation: Operation::ResolveName,
                subject: remote_id.to_string(),
            })
    }

    async fn upload(&self, content: Vec<u8>, name: &str) -> Result<String, StoreError> {
        let mut state = self.state.write().unwrap();
        let id = new_file_id();
        state.blobs.push(StoredBlob {
            id: id.clone(),
            name: name.to_string(),
            bytes: content,
        });
        state.members.push(id.clone());
        state.mutations += 2;
        Ok(id)
    }

    async fn delete(&self, remote_id: &str) -> Result<(), DeleteError> {
        let mut state = self.state.write().unwrap();
        let mut failures = Vec::new();

        match state.members.iter().position(|id| id == remote_id) {
            Some(pos) => {
                state.members.remove(pos);
                state.mutations += 1;
            }
            None => failures.push(StoreError::NotFound {
                operation: Operation::DetachBlob,
                subject: remote_id.to_string(),
            }),
        }

        let blob_deleted = match state.blobs.iter().position(|b| b.id == remote_id) {
            Some(pos) => {
                state.blobs.remove(pos);
                state.mutations += 1;
                true
            }
            None => {
                failures.push(StoreError::NotFound {
                    operation: Operation::DeleteBlob,
                    subject: remote_id.to_string(),
                });
                false
            }
        };

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DeleteError {
                remote_id: remote_id.to_string(),
                blob_deleted,
                failures,
            })
        }
    }
}
