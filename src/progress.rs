//! Sync progress reporting.
//!
//! Reports observable progress during `docsync sync` and `docsync dedupe`
//! so users see what is being enumerated, how far the listing got, and how
//! many uploads and deletes are left. Progress is emitted on **stderr** so
//! stdout remains parseable for scripts.

use std::io::Write;

use serde::Serialize;

/// Phase of applying a plan.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Uploading,
    Deleting,
}

impl SyncPhase {
    fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Uploading => "uploading",
            SyncPhase::Deleting => "deleting",
        }
    }
}

/// Lifecycle of one planned upload or delete.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Planned,
    InProgress,
    Done,
    Failed,
}

/// A single progress event.
#[derive(Clone, Debug)]
pub enum SyncProgressEvent {
    /// The source is being enumerated. Total unknown.
    Enumerating { source: String },
    /// Listing the remote store; emitted after every page.
    Listing {
        store: String,
        pages: u64,
        entries: u64,
    },
    /// A batch finished: `n` of `total` items processed in this phase.
    Batch {
        phase: SyncPhase,
        n: u64,
        total: u64,
    },
    /// One item changed state.
    Item {
        phase: SyncPhase,
        subject: String,
        state: ItemState,
    },
}

/// Reports sync progress. Implementations write to stderr (human or JSON).
pub trait SyncProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the executor.
    fn report(&self, event: SyncProgressEvent);
}

/// Human-friendly progress on stderr: "sync  uploading  20 / 134 items".
pub struct StderrProgress;

impl SyncProgressReporter for StderrProgress {
    fn report(&self, event: SyncProgressEvent) {
        let line = match &event {
            SyncProgressEvent::Enumerating { source } => {
                format!("sync {}  enumerating...\n", source)
            }
            SyncProgressEvent::Listing {
                store,
                pages,
                entries,
            } => format!(
                "sync {}  listing  {} entries ({} pages)\n",
                store,
                format_number(*entries),
                pages
            ),
            SyncProgressEvent::Batch { phase, n, total } => format!(
                "sync  {}  {} / {} items\n",
                phase.as_str(),
                format_number(*n),
                format_number(*total)
            ),
            // Per-item transitions are too chatty for the terminal.
            SyncProgressEvent::Item { .. } => return,
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SyncProgressReporter for JsonProgress {
    fn report(&self, event: SyncProgressEvent) {
        let obj = match &event {
            SyncProgressEvent::Enumerating { source } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "enumerating"
            }),
            SyncProgressEvent::Listing {
                store,
                pages,
                entries,
            } => serde_json::json!({
                "event": "progress",
                "store": store,
                "phase": "listing",
                "pages": pages,
                "entries": entries
            }),
            SyncProgressEvent::Batch { phase, n, total } => serde_json::json!({
                "event": "progress",
                "phase": phase,
                "n": n,
                "total": total
            }),
            SyncProgressEvent::Item {
                phase,
                subject,
                state,
            } => serde_json::json!({
                "event": "item",
                "phase": phase,
                "subject": subject,
                "state": state
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SyncProgressReporter for NoProgress {
    fn report(&self, _event: SyncProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn SyncProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
