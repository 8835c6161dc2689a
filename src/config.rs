//! TOML configuration parsing.
//!
//! One file describes the target vector store, the default sync options, and
//! the configured origins (`[sources.local]`, `[sources.sharepoint]`).
//! Secrets may be given inline or through a named environment variable; they
//! are resolved once into explicit credential values by
//! [`StoreConfig::credentials`] and [`SharePointSourceConfig::credentials`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub vector_store_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_purpose")]
    pub purpose: String,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_page_limit() -> u32 {
    100
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_purpose() -> String {
    "assistants".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default)]
    pub include_ext: Vec<String>,
    #[serde(default = "default_true")]
    pub delete_extra: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            include_ext: Vec::new(),
            delete_extra: true,
            dry_run: false,
            batch_size: 20,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_batch_size() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    pub local: Option<LocalSourceConfig>,
    pub sharepoint: Option<SharePointSourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalSourceConfig {
    pub root: PathBuf,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SharePointSourceConfig {
    pub tenant_id: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,
    pub hostname: String,
    pub site_path: String,
    #[serde(default)]
    pub folder_path: String,
    #[serde(default)]
    pub drive_id: Option<String>,
    #[serde(default)]
    pub library_name: Option<String>,
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
    #[serde(default = "default_login_base")]
    pub login_base: String,
    /// Per-request timeout for Graph calls, including content downloads.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_client_secret_env() -> String {
    "MS_CLIENT_SECRET".to_string()
}
fn default_graph_base() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}
fn default_login_base() -> String {
    "https://login.microsoftonline.com".to_string()
}

/// API key for the remote store, resolved once at startup.
#[derive(Clone)]
pub struct StoreCredentials {
    pub api_key: String,
}

impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// OAuth2 client-credentials for Microsoft Graph.
#[derive(Clone)]
pub struct GraphCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for GraphCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl StoreConfig {
    /// Inline `api_key` wins; otherwise read the variable named by `api_key_env`.
    pub fn credentials(&self) -> Result<StoreCredentials> {
        let api_key = resolve_secret(self.api_key.as_deref(), &self.api_key_env)
            .with_context(|| "store.api_key is not set")?;
        Ok(StoreCredentials { api_key })
    }
}

impl SharePointSourceConfig {
    pub fn credentials(&self) -> Result<GraphCredentials> {
        let client_secret =
            resolve_secret(self.client_secret.as_deref(), &self.client_secret_env)
                .with_context(|| "sources.sharepoint.client_secret is not set")?;
        Ok(GraphCredentials {
            tenant_id: self.tenant_id.clone(),
            client_id: self.client_id.clone(),
            client_secret,
        })
    }
}

fn resolve_secret(inline: Option<&str>, env_name: &str) -> Result<String> {
    if let Some(value) = inline.filter(|v| !v.is_empty()) {
        return Ok(value.to_string());
    }
    match std::env::var(env_name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => bail!("environment variable {} is not set", env_name),
    }
}

impl SyncConfig {
    /// Allow-list entries as lowercase extensions with a leading dot.
    pub fn normalized_extensions(&self) -> Vec<String> {
        normalize_extensions(&self.include_ext)
    }
}

/// Normalize `"PDF"`, `".pdf"` and `"*.pdf"` to `".pdf"`.
pub fn normalize_extensions(exts: &[String]) -> Vec<String> {
    let mut out: Vec<String> = exts
        .iter()
        .map(|e| {
            let trimmed = e.trim().trim_start_matches('*').trim_start_matches('.');
            format!(".{}", trimmed.to_lowercase())
        })
        .collect();
    out.sort();
    out.dedup();
    out
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.store.vector_store_id.trim().is_empty() {
        bail!("store.vector_store_id must not be empty");
    }

    if !(1..=100).contains(&config.store.page_limit) {
        bail!("store.page_limit must be in [1, 100]");
    }

    if config.sync.batch_size == 0 {
        bail!("sync.batch_size must be > 0");
    }

    if config
        .sync
        .include_ext
        .iter()
        .any(|e| e.trim().trim_start_matches(['*', '.']).is_empty())
    {
        bail!("sync.include_ext entries must not be empty");
    }

    if let Some(sp) = &config.sources.sharepoint {
        if sp.drive_id.is_some() && sp.library_name.is_some() {
            bail!("sources.sharepoint: set either drive_id or library_name, not both");
        }
        if sp.hostname.trim().is_empty() || sp.site_path.trim().is_empty() {
            bail!("sources.sharepoint: hostname and site_path are required");
        }
        if sp.timeout_secs == 0 {
            bail!("sources.sharepoint.timeout_secs must be > 0");
        }
    }

    Ok(())
}
