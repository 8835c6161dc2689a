//! Sync execution.
//!
//! Coordinates one run: enumerate the source → list the remote store →
//! reconcile → apply the plan. Uploads and deletes run one item at a time;
//! a failing item is recorded in the report and the run moves on. Nothing is
//! retried within a run: the next run recomputes the plan from the current
//! state and naturally retries whatever is still missing.

use anyhow::{bail, Result};
use chrono::Utc;

use crate::config::Config;
use crate::connector_fs::LocalDirectorySource;
use crate::connector_sharepoint::SharePointSource;
use crate::error::{ItemFailure, StoreError};
use crate::listing::list_remote;
use crate::models::{Enumeration, SyncPlan, SyncReport, SyncResult};
use crate::progress::{ItemState, SyncPhase, SyncProgressEvent, SyncProgressReporter};
use crate::reconcile::reconcile;
use crate::store_openai::OpenAiVectorStore;
use crate::traits::{DocumentSource, RemoteStore};

/// Per-run options. Built from `[sync]` and CLI overrides.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Process the remove set. When false, extra remote files are left alone.
    pub delete_extra: bool,
    /// Compute and report the plan without mutating the store.
    pub dry_run: bool,
    /// Items per progress batch. Has no effect on what gets done.
    pub batch_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            delete_extra: true,
            dry_run: false,
            batch_size: 20,
        }
    }
}

/// Run a full sync of `source` into `store`.
///
/// # Errors
///
/// Only configuration-class failures are returned: the source cannot be
/// enumerated or the store cannot be listed. Per-item failures end up in
/// the report.
pub async fn run_sync(
    source: &dyn DocumentSource,
    store: &dyn RemoteStore,
    options: &SyncOptions,
    progress: &dyn SyncProgressReporter,
) -> Result<SyncReport> {
    let started_at = Utc::now();
    let source_label = source.source_label();

    progress.report(SyncProgressEvent::Enumerating {
        source: source_label.clone(),
    });
    let enumeration = source.enumerate().await?;
    tracing::info!(
        source = %source_label,
        documents = enumeration.len(),
        duplicates = enumeration.duplicates_ignored.len(),
        "enumerated source"
    );

    let listing = list_remote(store, progress).await?;
    tracing::info!(
        store = store.store_id(),
        names = listing.index.len(),
        files = listing.index.id_count(),
        "listed remote store"
    );

    let plan = reconcile(&enumeration.names(), &listing.index);

    let mut result = SyncResult {
        kept: plan.to_keep.clone(),
        duplicates_ignored: enumeration.duplicates_ignored.clone(),
        lookup_failures: listing.lookup_failures,
        ..SyncResult::default()
    };

    if options.dry_run {
        tracing::info!("dry run, no changes made");
    } else {
        let batch_size = options.batch_size.max(1);
        upload_missing(source, store, &enumeration, &plan, batch_size, progress, &mut result)
            .await;
        if options.delete_extra {
            delete_extra(store, &plan.remove_ids, batch_size, progress, &mut result).await;
        }
    }

    let (to_delete, to_delete_ids) = if options.delete_extra {
        (plan.to_remove, plan.remove_ids)
    } else {
        (Vec::new(), Vec::new())
    };

    Ok(SyncReport {
        source: source_label,
        vector_store_id: store.store_id().to_string(),
        dry_run: options.dry_run,
        delete_extra: options.delete_extra,
        to_upload: plan.to_add,
        to_delete,
        to_delete_ids,
        result,
        started_at,
        finished_at: Utc::now(),
    })
}

async fn upload_missing(
    source: &dyn DocumentSource,
    store: &dyn RemoteStore,
    enumeration: &Enumeration,
    plan: &SyncPlan,
    batch_size: usize,
    progress: &dyn SyncProgressReporter,
    result: &mut SyncResult,
) {
    let total = plan.to_add.len() as u64;
    for (batch_no, batch) in plan.to_add.chunks(batch_size).enumerate() {
        for name in batch {
            report_item(progress, SyncPhase::Uploading, name, ItemState::Planned);
            // Every name in to_add came from this enumeration.
            let Some(record) = enumeration.get(name) else {
                continue;
            };

            report_item(progress, SyncPhase::Uploading, name, ItemState::InProgress);
            // `staged` lives until the end of this iteration, so a
            // downloaded temp file is gone before the next item starts.
            let outcome: Result<String, StoreError> = async {
                let staged = source.stage(record).await?;
                let bytes = staged.read().await?;
                store.upload(bytes, name).await
            }
            .await;

            match outcome {
                Ok(remote_id) => {
                    tracing::info!(name = %name, remote_id = %remote_id, "uploaded");
                    result.uploaded.push(remote_id);
                    report_item(progress, SyncPhase::Uploading, name, ItemState::Done);
                }
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "upload failed");
                    result.failed_uploads.push(ItemFailure::new(name, &e));
                    report_item(progress, SyncPhase::Uploading, name, ItemState::Failed);
                }
            }
        }

        progress.report(SyncProgressEvent::Batch {
            phase: SyncPhase::Uploading,
            n: ((batch_no * batch_size + batch.len()) as u64).min(total),
            total,
        });
    }
}

async fn delete_extra(
    store: &dyn RemoteStore,
    remote_ids: &[String],
    batch_size: usize,
    progress: &dyn SyncProgressReporter,
    result: &mut SyncResult,
) {
    let (deleted, failures) = delete_ids(store, remote_ids, batch_size, progress).await;
    result.deleted.extend(deleted);
    result.failed_deletes.extend(failures);
}

/// Delete each id in turn. Returns the deleted ids and the failures.
///
/// An id whose blob was deleted but whose detach failed counts as deleted
/// and also contributes a failure entry.
pub(crate) async fn delete_ids(
    store: &dyn RemoteStore,
    remote_ids: &[String],
    batch_size: usize,
    progress: &dyn SyncProgressReporter,
) -> (Vec<String>, Vec<ItemFailure>) {
    let mut deleted = Vec::new();
    let mut failures = Vec::new();
    let total = remote_ids.len() as u64;
    let batch_size = batch_size.max(1);

    for (batch_no, batch) in remote_ids.chunks(batch_size).enumerate() {
        for remote_id in batch {
            report_item(progress, SyncPhase::Deleting, remote_id, ItemState::Planned);
            report_item(progress, SyncPhase::Deleting, remote_id, ItemState::InProgress);
            match store.delete(remote_id).await {
                Ok(()) => {
                    tracing::info!(remote_id = %remote_id, "deleted");
                    deleted.push(remote_id.clone());
                    report_item(progress, SyncPhase::Deleting, remote_id, ItemState::Done);
                }
                Err(e) => {
                    tracing::warn!(remote_id = %remote_id, error = %e, "delete failed");
                    if e.blob_deleted {
                        deleted.push(remote_id.clone());
                    }
                    failures.extend(e.failures.iter().map(|f| ItemFailure::new(remote_id, f)));
                    report_item(progress, SyncPhase::Deleting, remote_id, ItemState::Failed);
                }
            }
        }

        progress.report(SyncProgressEvent::Batch {
            phase: SyncPhase::Deleting,
            n: ((batch_no * batch_size + batch.len()) as u64).min(total),
            total,
        });
    }

    (deleted, failures)
}

fn report_item(
    progress: &dyn SyncProgressReporter,
    phase: SyncPhase,
    subject: &str,
    state: ItemState,
) {
    progress.report(SyncProgressEvent::Item {
        phase,
        subject: subject.to_string(),
        state,
    });
}

/// Which configured origin to sync from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Origin {
    Local,
    Sharepoint,
}

/// Build the configured source for `origin`.
pub fn build_source(config: &Config, origin: Origin) -> Result<Box<dyn DocumentSource>> {
    let include_ext = config.sync.normalized_extensions();
    match origin {
        Origin::Local => {
            let Some(local) = config.sources.local.clone() else {
                bail!("Local source not configured ([sources.local])");
            };
            Ok(Box::new(LocalDirectorySource::new("local", local, &include_ext)))
        }
        Origin::Sharepoint => {
            let Some(sp) = config.sources.sharepoint.clone() else {
                bail!("SharePoint source not configured ([sources.sharepoint])");
            };
            let credentials = sp.credentials()?;
            Ok(Box::new(SharePointSource::new(
                "sharepoint",
                sp,
                credentials,
                &include_ext,
            )?))
        }
    }
}

/// Build the configured remote store.
pub fn build_store(config: &Config) -> Result<OpenAiVectorStore> {
    let credentials = config.store.credentials()?;
    OpenAiVectorStore::new(&config.store, credentials)
}

/// Config-driven entry point used by the CLI.
pub async fn run_sync_from_config(
    config: &Config,
    origin: Origin,
    options: &SyncOptions,
    progress: &dyn SyncProgressReporter,
) -> Result<SyncReport> {
    let source = build_source(config, origin)?;
    let store = build_store(config)?;
    run_sync(source.as_ref(), &store, options, progress).await
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            delete_extra: config.sync.delete_extra,
            dry_run: config.sync.dry_run,
            batch_size: config.sync.batch_size,
        }
    }
}
