//! OpenAI vector store backend.
//!
//! Talks to the OpenAI REST API directly with `reqwest`. A vector store
//! holds references to files; a file (the blob) lives on its own and can
//! exist detached, so every upload and delete is two calls:
//!
//! | Operation | Calls |
//! |-----------|-------|
//! | list page | `GET /vector_stores/{vs}/files?limit=N&after=ID` |
//! | resolve name | `GET /files/{id}` |
//! | upload | `POST /files` (multipart), then `POST /vector_stores/{vs}/files` |
//! | delete | `DELETE /vector_stores/{vs}/files/{id}`, then `DELETE /files/{id}` |
//!
//! The vector-store listing does not carry filenames, so entries come back
//! with `name: None` and the listing resolves them one by one.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{StoreConfig, StoreCredentials};
use crate::error::{DeleteError, Operation, StoreError};
use crate::models::{extension_key, RemoteEntry, RemotePage};
use crate::traits::RemoteStore;

/// A [`RemoteStore`] backed by an OpenAI vector store.
pub struct OpenAiVectorStore {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    vector_store_id: String,
    page_limit: u32,
    purpose: String,
}

impl OpenAiVectorStore {
    pub fn new(config: &StoreConfig, credentials: StoreCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: credentials.api_key,
            vector_store_id: config.vector_store_id.clone(),
            page_limit: config.page_limit,
            purpose: config.purpose.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        operation: Operation,
        subject: &str,
    ) -> Result<reqwest::Response, StoreError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| StoreError::transport(operation, subject, e))?;
        check_status(resp, operation, subject).await
    }

    async fn create_blob(&self, content: Vec<u8>, name: &str) -> Result<String, StoreError> {
        let part = reqwest::multipart::Part::bytes(content)
            .file_name(name.to_string())
            .mime_str(detect_content_type(name))
            .map_err(|e| StoreError::transport(Operation::CreateBlob, name, e))?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", self.purpose.clone())
            .part("file", part);

        let resp = self
            .send(
                self.request(reqwest::Method::POST, "/files").multipart(form),
                Operation::CreateBlob,
                name,
            )
            .await?;
        let file: FileObject = parse_json(resp, Operation::CreateBlob, name).await?;
        Ok(file.id)
    }

    async fn attach_blob(&self, file_id: &str) -> Result<(), StoreError> {
        let path = format!("/vector_stores/{}/files", self.vector_store_id);
        self.send(
            self.request(reqwest::Method::POST, &path)
                .json(&serde_json::json!({ "file_id": file_id })),
            Operation::AttachBlob,
            file_id,
        )
        .await?;
        Ok(())
    }

    async fn detach_blob(&self, file_id: &str) -> Result<(), StoreError> {
        let path = format!("/vector_stores/{}/files/{}", self.vector_store_id, file_id);
        self.send(
            self.request(reqwest::Method::DELETE, &path),
            Operation::DetachBlob,
            file_id,
        )
        .await?;
        Ok(())
    }

    async fn delete_blob(&self, file_id: &str) -> Result<(), StoreError> {
        let path = format!("/files/{}", file_id);
        self.send(
            self.request(reqwest::Method::DELETE, &path),
            Operation::DeleteBlob,
            file_id,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for OpenAiVectorStore {
    fn store_id(&self) -> &str {
        &self.vector_store_id
    }

    async fn list_page(&self, cursor: Option<&str>) -> Result<RemotePage, StoreError> {
        let path = format!("/vector_stores/{}/files", self.vector_store_id);
        let mut query = vec![("limit", self.page_limit.to_string())];
        if let Some(after) = cursor {
            query.push(("after", after.to_string()));
        }

        let subject = cursor.unwrap_or("<first page>");
        let resp = self
            .send(
                self.request(reqwest::Method::GET, &path).query(&query),
                Operation::ListPage,
                subject,
            )
            .await?;
        let page: ListPage = parse_json(resp, Operation::ListPage, subject).await?;
        Ok(page.into_remote_page())
    }

    async fn resolve_name(&self, remote_id: &str) -> Result<String, StoreError> {
        let path = format!("/files/{}", remote_id);
        let resp = self
            .send(
                self.request(reqwest::Method::GET, &path),
                Operation::ResolveName,
                remote_id,
            )
            .await?;
        let file: FileObject = parse_json(resp, Operation::ResolveName, remote_id).await?;
        file.filename
            .filter(|n| !n.is_empty())
            .ok_or_else(|| StoreError::malformed(Operation::ResolveName, remote_id, "no filename"))
    }

    async fn upload(&self, content: Vec<u8>, name: &str) -> Result<String, StoreError> {
        let file_id = self.create_blob(content, name).await?;

        if let Err(attach_err) = self.attach_blob(&file_id).await {
            // Do not leave a detached blob behind.
            if let Err(cleanup_err) = self.delete_blob(&file_id).await {
                tracing::warn!(
                    file_id = %file_id,
                    error = %cleanup_err,
                    "could not delete blob after failed attach"
                );
            }
            return Err(attach_err);
        }

        Ok(file_id)
    }

    async fn delete(&self, remote_id: &str) -> Result<(), DeleteError> {
        let mut failures = Vec::new();

        if let Err(e) = self.detach_blob(remote_id).await {
            tracing::warn!(remote_id, error = %e, "failed to detach file from vector store");
            failures.push(e);
        }

        let blob_deleted = match self.delete_blob(remote_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(remote_id, error = %e, "failed to delete file from storage");
                failures.push(e);
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

// ============ Wire types ============

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    data: Vec<ListedFile>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedFile {
    id: String,
}

impl ListPage {
    fn into_remote_page(self) -> RemotePage {
        let next_cursor = self
            .last_id
            .filter(|id| !id.is_empty())
            .or_else(|| self.data.last().map(|f| f.id.clone()));
        RemotePage {
            entries: self
                .data
                .into_iter()
                .map(|f| RemoteEntry {
                    remote_id: f.id,
                    name: None,
                })
                .collect(),
            next_cursor,
            has_more: self.has_more,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
    #[serde(default)]
    filename: Option<String>,
}

// ============ HTTP helpers ============

async fn check_status(
    resp: reqwest::Response,
    operation: Operation,
    subject: &str,
) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status {
        operation,
        subject: subject.to_string(),
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
    operation: Operation,
    subject: &str,
) -> Result<T, StoreError> {
    let text = resp
        .text()
        .await
        .map_err(|e| StoreError::transport(operation, subject, e))?;
    serde_json::from_str(&text).map_err(|e| StoreError::malformed(operation, subject, e.to_string()))
}

/// MIME type sent with an upload, from the file extension.
pub fn detect_content_type(name: &str) -> &'static str {
    match extension_key(name).as_deref() {
        Some(".pdf") => "application/pdf",
        Some(".txt") => "text/plain",
        Some(".md") => "text/markdown",
        Some(".json") => "application/json",
        Some(".html" | ".htm") => "text/html",
        Some(".csv") => "text/csv",
        Some(".docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some(".pptx") => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        Some(".xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}
