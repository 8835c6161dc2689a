//! SharePoint document library source.
//!
//! Enumerates the files directly inside one folder of a SharePoint document
//! library through Microsoft Graph, and downloads a file's bytes only when
//! the executor is about to upload it.
//!
//! # Configuration
//!
//! ```toml
//! [sources.sharepoint]
//! tenant_id = "00000000-0000-0000-0000-000000000000"
//! client_id = "11111111-1111-1111-1111-111111111111"
//! client_secret_env = "MS_CLIENT_SECRET"
//! hostname = "contoso.sharepoint.com"
//! site_path = "sites/TeamSite"
//! folder_path = "Shared Documents/Policies"
//! # library_name = "Documents"   # or drive_id = "b!..."
//! ```
//!
//! # Workflow
//!
//! 1. Client-credentials token exchange (scope `https://graph.microsoft.com/.default`).
//! 2. Resolve the site id from `hostname` + `site_path`.
//! 3. Resolve the drive id: explicit `drive_id`, else the drive whose name is
//!    `library_name`, else the site's default drive.
//! 4. List the folder's immediate children and keep entries with a `file`
//!    facet. Sub-folders are not descended into.
//!
//! The session (token, drive id) is established once per source instance and
//! reused for the downloads.

use std::io::Write;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::config::{normalize_extensions, GraphCredentials, SharePointSourceConfig};
use crate::connector_fs::extension_allowed;
use crate::error::{Operation, StoreError};
use crate::models::{ContentRef, DocumentRecord, Enumeration};
use crate::traits::{DocumentSource, StagedContent};

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// A [`DocumentSource`] over one SharePoint folder.
pub struct SharePointSource {
    name: String,
    config: SharePointSourceConfig,
    credentials: GraphCredentials,
    include_ext: Vec<String>,
    client: reqwest::Client,
    session: OnceCell<GraphSession>,
}

/// An authenticated view of one drive.
#[derive(Debug, Clone)]
struct GraphSession {
    token: String,
    drive_id: String,
}

impl SharePointSource {
    pub fn new(
        name: impl Into<String>,
        config: SharePointSourceConfig,
        credentials: GraphCredentials,
        include_ext: &[String],
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            name: name.into(),
            config,
            credentials,
            include_ext: normalize_extensions(include_ext),
            client,
            session: OnceCell::new(),
        })
    }

    fn graph_url(&self, path: &str) -> String {
        format!("{}{}", self.config.graph_base.trim_end_matches('/'), path)
    }

    async fn session(&self) -> Result<&GraphSession> {
        self.session
            .get_or_try_init(|| async {
                let token = acquire_token(&self.client, &self.config.login_base, &self.credentials)
                    .await?;
                let site_id = self.resolve_site_id(&token).await?;
                let drive_id = self.resolve_drive_id(&site_id, &token).await?;
                tracing::debug!(site_id = %site_id, drive_id = %drive_id, "resolved SharePoint drive");
                Ok::<_, anyhow::Error>(GraphSession { token, drive_id })
            })
            .await
    }

    async fn resolve_site_id(&self, token: &str) -> Result<String> {
        let url = self.graph_url(&format!(
            "/sites/{}:/{}",
            self.config.hostname,
            normalize_site_path(&self.config.site_path)
        ));
        let site: IdObject = self
            .get_json(&url, token)
            .await
            .with_context(|| format!("Failed to resolve SharePoint site {}", self.config.site_path))?;
        Ok(site.id)
    }

    async fn resolve_drive_id(&self, site_id: &str, token: &str) -> Result<String> {
        if let Some(id) = self.config.drive_id.as_ref().filter(|id| !id.is_empty()) {
            return Ok(id.clone());
        }

        if let Some(library) = &self.config.library_name {
            let url = self.graph_url(&format!("/sites/{}/drives", site_id));
            let drives: ValueList<Drive> = self
                .get_json(&url, token)
                .await
                .context("Failed to list document libraries")?;
            return drives
                .value
                .into_iter()
                .find(|d| d.name.as_deref() == Some(library.as_str()))
                .map(|d| d.id)
                .ok_or_else(|| {
                    anyhow!(
                        "Document library named '{}' not found on site {}",
                        library,
                        site_id
                    )
                });
        }

        let url = self.graph_url(&format!("/sites/{}/drive", site_id));
        let drive: Drive = self
            .get_json(&url, token)
            .await
            .context("Failed to resolve default document library")?;
        Ok(drive.id)
    }

    /// Immediate children of the configured folder that are files.
    async fn list_folder_files(&self, session: &GraphSession) -> Result<Vec<DriveItem>> {
        let folder = self.config.folder_path.trim_matches('/');
        let mut url = folder_children_url(&self.config.graph_base, &session.drive_id, folder)?;

        let mut files = Vec::new();
        loop {
            let page: ValueList<DriveItem> = self
                .get_json(&url, &session.token)
                .await
                .with_context(|| format!("Failed to list SharePoint folder '{}'", folder))?;
            files.extend(page.value.into_iter().filter(|item| item.file.is_some()));

            match page.next_link {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }
        Ok(files)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        let resp = self.client.get(url).bearer_auth(token).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Graph request failed (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            );
        }
        Ok(resp.json().await?)
    }

    async fn download(
        &self,
        drive_id: &str,
        item_id: &str,
        name: &str,
    ) -> Result<StagedContent, StoreError> {
        let session = self.session().await.map_err(|e| {
            StoreError::malformed(Operation::Download, name, format!("no Graph session: {:#}", e))
        })?;

        let url = self.graph_url(&format!("/drives/{}/items/{}/content", drive_id, item_id));
        let mut resp = self
            .client
            .get(&url)
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|e| StoreError::transport(Operation::Download, name, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                operation: Operation::Download,
                subject: name.to_string(),
                status,
                body: body.chars().take(500).collect(),
            });
        }

        let suffix = std::path::Path::new(name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("docsync-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| StoreError::io(Operation::Download, std::env::temp_dir(), e))?;

        // On any early return `file` is dropped and the temp file removed.
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| StoreError::transport(Operation::Download, name, e))?
        {
            file.write_all(&chunk)
                .map_err(|e| StoreError::io(Operation::Download, file.path(), e))?;
        }
        file.flush()
            .map_err(|e| StoreError::io(Operation::Download, file.path(), e))?;

        Ok(StagedContent::temporary(file.into_temp_path()))
    }
}

#[async_trait]
impl DocumentSource for SharePointSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> &str {
        "sharepoint"
    }

    async fn enumerate(&self) -> Result<Enumeration> {
        let session = self.session().await?;
        let items = self.list_folder_files(session).await?;

        let mut enumeration = Enumeration::new();
        for item in items {
            if !extension_allowed(&item.name, &self.include_ext) {
                continue;
            }
            enumeration.push(DocumentRecord {
                name: item.name,
                content_ref: ContentRef::DriveItem {
                    drive_id: session.drive_id.clone(),
                    item_id: item.id,
                },
                size: item.size,
            });
        }
        Ok(enumeration)
    }

    async fn stage(&self, record: &DocumentRecord) -> Result<StagedContent, StoreError> {
        match &record.content_ref {
            ContentRef::DriveItem { drive_id, item_id } => {
                self.download(drive_id, item_id, &record.name).await
            }
            ContentRef::Path(_) => Err(StoreError::malformed(
                Operation::Download,
                &record.name,
                "SharePoint source cannot stage a local path",
            )),
        }
    }
}

/// OAuth2 client-credentials exchange against the Microsoft identity platform.
async fn acquire_token(
    client: &reqwest::Client,
    login_base: &str,
    credentials: &GraphCredentials,
) -> Result<String> {
    let url = format!(
        "{}/{}/oauth2/v2.0/token",
        login_base.trim_end_matches('/'),
        credentials.tenant_id
    );
    let resp = client
        .post(&url)
        .form(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
            ("grant_type", "client_credentials"),
        ])
        .send()
        .await
        .context("Failed to reach the token endpoint")?;

    let status = resp.status();
    let body: TokenResponse = resp
        .json()
        .await
        .with_context(|| format!("Token endpoint returned an unreadable response (HTTP {})", status))?;

    match body.access_token {
        Some(token) if status.is_success() => Ok(token),
        _ => bail!(
            "Failed to acquire Graph token: {}",
            body.error_description
                .or(body.error)
                .unwrap_or_else(|| format!("HTTP {}", status))
        ),
    }
}

/// First page of a folder's children. Each folder segment is
/// percent-encoded, so `#` or `?` in a name stay part of the path.
fn folder_children_url(graph_base: &str, drive_id: &str, folder: &str) -> Result<String> {
    let mut url = reqwest::Url::parse(graph_base.trim_end_matches('/'))
        .with_context(|| format!("Invalid graph_base URL: {}", graph_base))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow!("graph_base cannot be a base URL: {}", graph_base))?;
        segments.pop_if_empty().push("drives").push(drive_id);

        let parts: Vec<&str> = folder.split('/').filter(|p| !p.is_empty()).collect();
        match parts.split_last() {
            None => {
                segments.push("root").push("children");
            }
            Some((last, rest)) => {
                segments.push("root:");
                for part in rest {
                    segments.push(part);
                }
                segments.push(&format!("{}:", last)).push("children");
            }
        }
    }
    url.set_query(Some("$top=999"));
    Ok(url.to_string())
}

/// `"TeamSite"` and `"/sites/TeamSite"` both become `"sites/TeamSite"`.
fn normalize_site_path(site_path: &str) -> String {
    let trimmed = site_path.trim_matches('/');
    if trimmed.starts_with("sites/") {
        trimmed.to_string()
    } else {
        format!("sites/{}", trimmed)
    }
}

// ============ Wire types ============

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Drive {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValueList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveItem {
    id: String,
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    file: Option<serde_json::Value>,
}
