//! Full remote listing built from the page-cursor primitive.
//!
//! [`list_remote`] walks [`RemoteStore::list_page`] until the store reports
//! no more pages, resolving names for entries whose page payload lacks one.
//! A failed name lookup drops that single entry and is recorded; a failed
//! page request aborts the run, since a plan computed from a partial listing
//! would re-upload documents that are already present.

use std::collections::HashSet;

use anyhow::{Context, Result};

use crate::error::ItemFailure;
use crate::models::RemoteIndex;
use crate::progress::{SyncProgressEvent, SyncProgressReporter};
use crate::traits::RemoteStore;

/// Remote contents plus the entries that could not be named.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub index: RemoteIndex,
    pub lookup_failures: Vec<ItemFailure>,
    pub pages: u64,
}

pub async fn list_remote(
    store: &dyn RemoteStore,
    progress: &dyn SyncProgressReporter,
) -> Result<Listing> {
    let mut listing = Listing::default();
    let mut cursor: Option<String> = None;
    let mut seen_cursors: HashSet<String> = HashSet::new();
    let mut entries_seen = 0u64;

    loop {
        let page = store
            .list_page(cursor.as_deref())
            .await
            .with_context(|| format!("Failed to list remote store {}", store.store_id()))?;
        listing.pages += 1;
        entries_seen += page.entries.len() as u64;

        for entry in page.entries {
            let name = match entry.name {
                Some(name) => name,
                None => match store.resolve_name(&entry.remote_id).await {
                    Ok(name) => name,
                    Err(e) => {
                        tracing::warn!(
                            remote_id = %entry.remote_id,
                            error = %e,
                            "could not resolve remote file name, skipping entry"
                        );
                        listing
                            .lookup_failures
                            .push(ItemFailure::new(&entry.remote_id, &e));
                        continue;
                    }
                },
            };
            listing.index.insert(name, entry.remote_id);
        }

        progress.report(SyncProgressEvent::Listing {
            store: store.store_id().to_string(),
            pages: listing.pages,
            entries: entries_seen,
        });

        if !page.has_more {
            break;
        }
        match page.next_cursor {
            None => {
                tracing::warn!(
                    pages = listing.pages,
                    "listing reports more pages but gave no cursor, treating as end"
                );
                break;
            }
            Some(next) if !seen_cursors.insert(next.clone()) => {
                tracing::warn!(
                    cursor = %next,
                    pages = listing.pages,
                    "listing returned a cursor it already gave, treating as end"
                );
                break;
            }
            Some(next) => cursor = Some(next),
        }
    }

    Ok(listing)
}
