//! Rendering of sync and dedupe reports on stdout.

use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;

use crate::dedupe::DedupeReport;
use crate::error::ItemFailure;
use crate::models::SyncReport;

/// Human-readable summary of a sync run.
pub fn render_sync_summary(report: &SyncReport) -> String {
    let mut out = String::new();
    let r = &report.result;

    let _ = writeln!(out, "sync {}", report.source);
    let _ = writeln!(out, "  vector store: {}", report.vector_store_id);
    let _ = writeln!(out, "  kept ({}): {}", r.kept.len(), join_or_dash(&r.kept));
    let _ = writeln!(
        out,
        "  to upload ({}): {}",
        report.to_upload.len(),
        join_or_dash(&report.to_upload)
    );
    if report.delete_extra {
        let _ = writeln!(
            out,
            "  to delete ({}): {} file(s)",
            report.to_delete.len(),
            report.to_delete_ids.len()
        );
    }
    if !r.duplicates_ignored.is_empty() {
        let _ = writeln!(
            out,
            "  duplicates ignored ({}): {}",
            r.duplicates_ignored.len(),
            r.duplicates_ignored.join(", ")
        );
    }

    if report.dry_run {
        let _ = writeln!(out, "  dry-run mode: no changes were made");
    } else {
        let _ = writeln!(out, "  uploaded: {}", r.uploaded.len());
        if report.delete_extra {
            let _ = writeln!(out, "  deleted: {}", r.deleted.len());
        }
    }

    write_failures(&mut out, "failed upload", &r.failed_uploads);
    write_failures(&mut out, "failed delete", &r.failed_deletes);
    write_failures(&mut out, "unresolved entry", &r.lookup_failures);

    let _ = writeln!(
        out,
        "{}",
        if r.has_failures() {
            "completed with failures"
        } else {
            "ok"
        }
    );
    out
}

pub fn render_dedupe_summary(report: &DedupeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "dedupe {}", report.vector_store_id);
    let _ = writeln!(out, "  duplicate names: {}", report.groups.len());
    for group in &report.groups {
        let _ = writeln!(
            out,
            "    {}: keep {}, remove {}",
            group.name,
            group.kept_id,
            group.extra_ids.join(", ")
        );
    }
    if report.dry_run {
        let _ = writeln!(out, "  dry-run mode: no changes were made");
    } else {
        let _ = writeln!(out, "  deleted: {}", report.deleted.len());
    }
    write_failures(&mut out, "failed delete", &report.failed_deletes);
    write_failures(&mut out, "unresolved entry", &report.lookup_failures);
    let _ = writeln!(
        out,
        "{}",
        if report.failed_deletes.is_empty() {
            "ok"
        } else {
            "completed with failures"
        }
    );
    out
}

/// Pretty JSON for `--json`.
pub fn render_json<T: Serialize>(report: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn join_or_dash(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

fn write_failures(out: &mut String, label: &str, failures: &[ItemFailure]) {
    for f in failures {
        let _ = writeln!(out, "  {} {} ({}): {}", label, f.subject, f.operation, f.error);
    }
}
