//! Three-way diff between the local name set and the remote index.
//!
//! ```text
//! add    = local − remote
//! keep   = local ∩ remote
//! remove = remote − local   (expanded to every remote id of each name)
//! ```
//!
//! Pure and deterministic: every output is sorted by name, and `remove_ids`
//! follows the order of `to_remove`, then listing order within a name.

use std::collections::BTreeSet;

use crate::models::{RemoteIndex, SyncPlan};

pub fn reconcile(local: &BTreeSet<String>, remote: &RemoteIndex) -> SyncPlan {
    let remote_names: BTreeSet<&String> = remote.names().collect();

    let to_add: Vec<String> = local
        .iter()
        .filter(|n| !remote.contains(n))
        .cloned()
        .collect();
    let to_keep: Vec<String> = local
        .iter()
        .filter(|n| remote.contains(n))
        .cloned()
        .collect();
    let to_remove: Vec<String> = remote_names
        .into_iter()
        .filter(|n| !local.contains(*n))
        .cloned()
        .collect();

    let remove_ids = expand_removals(&to_remove, remote);

    SyncPlan {
        to_add,
        to_keep,
        to_remove,
        remove_ids,
    }
}

/// Every remote id recorded for the given names.
pub fn expand_removals(names: &[String], remote: &RemoteIndex) -> Vec<String> {
    names
        .iter()
        .flat_map(|n| remote.ids(n).iter().cloned())
        .collect()
}
