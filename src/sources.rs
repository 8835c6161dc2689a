//! Configured origins and their health.

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;

/// Status of one configured origin or of the target store.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub configured: bool,
    pub healthy: bool,
    pub notes: Option<String>,
}

/// Check each origin without making network calls.
pub fn get_sources(config: &Config) -> Vec<SourceStatus> {
    let mut statuses = Vec::new();

    statuses.push(match &config.sources.local {
        Some(local) if local.root.is_dir() => SourceStatus {
            name: "local".to_string(),
            configured: true,
            healthy: true,
            notes: Some(local.root.display().to_string()),
        },
        Some(local) => SourceStatus {
            name: "local".to_string(),
            configured: true,
            healthy: false,
            notes: Some(format!("root is not a directory: {}", local.root.display())),
        },
        None => not_configured("local"),
    });

    statuses.push(match &config.sources.sharepoint {
        Some(sp) => match sp.credentials() {
            Ok(_) => SourceStatus {
                name: "sharepoint".to_string(),
                configured: true,
                healthy: true,
                notes: Some(format!("{}/{}", sp.hostname, sp.site_path)),
            },
            Err(e) => SourceStatus {
                name: "sharepoint".to_string(),
                configured: true,
                healthy: false,
                notes: Some(format!("{:#}", e)),
            },
        },
        None => not_configured("sharepoint"),
    });

    statuses.push(SourceStatus {
        name: "store".to_string(),
        configured: true,
        healthy: config.store.credentials().is_ok(),
        notes: Some(config.store.vector_store_id.clone()),
    });

    statuses
}

fn not_configured(name: &str) -> SourceStatus {
    SourceStatus {
        name: name.to_string(),
        configured: false,
        healthy: false,
        notes: None,
    }
}

pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<12} {:<16} {:<8} NOTES", "ORIGIN", "STATUS", "HEALTHY");
    for s in get_sources(config) {
        let status = if s.configured { "OK" } else { "NOT CONFIGURED" };
        println!(
            "{:<12} {:<16} {:<8} {}",
            s.name,
            status,
            s.healthy,
            s.notes.unwrap_or_default()
        );
    }
    Ok(())
}
