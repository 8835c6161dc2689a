//! # docset-sync
//!
//! Keeps a remote vector-store document collection in step with an
//! authoritative origin: a local directory tree or a SharePoint document
//! library. Documents are identified by file name only.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   names   ┌───────────┐   plan   ┌──────────────┐
//! │   Sources    │──────────▶│ Reconcile │─────────▶│   Executor   │
//! │ local / SP   │           │ add/keep/ │          │ upload/delete│
//! └──────────────┘           │  remove   │          └──────┬───────┘
//!                            └─────▲─────┘                 │
//!                                  │ name → ids            ▼
//!                            ┌─────┴─────────────────────────────┐
//!                            │        Remote store (OpenAI)      │
//!                            └───────────────────────────────────┘
//! ```
//!
//! Every run recomputes the plan from the live state of both sides, so a
//! run that failed halfway is repaired by simply running again.
//!
//! ## Quick Start
//!
//! ```bash
//! docsync sources                       # check configuration
//! docsync sync local --dry-run          # preview
//! docsync sync local                    # apply
//! docsync sync sharepoint --keep-extra  # upload only, never delete
//! docsync dedupe --dry-run              # find same-named remote files
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credentials |
//! | [`models`] | Records, remote index, plan, result |
//! | [`error`] | Typed per-item errors |
//! | [`traits`] | `DocumentSource` and `RemoteStore` seams |
//! | [`connector_fs`] | Local directory source |
//! | [`connector_sharepoint`] | SharePoint (Microsoft Graph) source |
//! | [`store_openai`] | OpenAI vector store backend |
//! | [`store_memory`] | In-memory store |
//! | [`listing`] | Paginated remote listing |
//! | [`reconcile`] | Three-way diff |
//! | [`sync`] | Plan execution |
//! | [`dedupe`] | Remote duplicate pruning |
//! | [`progress`] | Progress reporting |
//! | [`report`] | Report rendering |
//! | [`sources`] | Origin health |

pub mod config;
pub mod connector_fs;
pub mod connector_sharepoint;
pub mod dedupe;
pub mod error;
pub mod listing;
pub mod models;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod sources;
pub mod store_memory;
pub mod store_openai;
pub mod sync;
pub mod traits;
