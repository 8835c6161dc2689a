//! Fake OpenAI + Microsoft Graph backend for integration tests.
//!
//! One axum server answers the vector-store API under `/v1`, the Graph API
//! under `/graph`, and the token endpoint under `/login`. State is shared
//! so tests can seed files, inject failures, and inspect what happened.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub const STORE_ID: &str = "vs_test";
pub const API_KEY: &str = "sk-test";
pub const GRAPH_TOKEN: &str = "graph-token";
pub const CLIENT_SECRET: &str = "graph-secret";

#[derive(Clone)]
pub struct Blob {
    pub id: String,
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub bytes: Vec<u8>,
    pub folder: bool,
}

#[derive(Default)]
pub struct FakeState {
    pub addr: Option<SocketAddr>,
    pub blobs: Vec<Blob>,
    pub members: Vec<String>,
    pub next_id: u64,
    pub page_size: usize,
    /// File names whose blob creation fails.
    pub fail_create: HashSet<String>,
    /// File names whose attach fails.
    pub fail_attach: HashSet<String>,
    /// Remote ids whose name lookup fails.
    pub broken_lookups: HashSet<String>,
    /// Remote ids whose detach fails.
    pub fail_detach: HashSet<String>,
    /// Drive item ids whose download fails.
    pub broken_downloads: HashSet<String>,
    /// Drive item ids whose download stalls for a few seconds.
    pub slow_downloads: HashSet<String>,
    /// Drive files, split in two pages to exercise `@odata.nextLink`.
    pub drive_page1: Vec<DriveFile>,
    pub drive_page2: Vec<DriveFile>,
    pub mutations: u64,
    pub downloads: u64,
}

pub type Shared = Arc<Mutex<FakeState>>;

pub struct FakeBackend {
    pub addr: SocketAddr,
    pub state: Shared,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState {
            page_size: 2,
            ..FakeState::default()
        }));

        let app = Router::new()
            .route("/v1/files", post(create_file))
            .route("/v1/files/{id}", get(get_file).delete(delete_file))
            .route(
                "/v1/vector_stores/{vs}/files",
                get(list_store_files).post(attach_file),
            )
            .route("/v1/vector_stores/{vs}/files/{id}", axum::routing::delete(detach_file))
            .route("/login/{tenant}/oauth2/v2.0/token", post(token))
            .route("/graph/{*rest}", get(graph))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        state.lock().unwrap().addr = Some(addr);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn api_base(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn graph_base(&self) -> String {
        format!("http://{}/graph", self.addr)
    }

    pub fn login_base(&self) -> String {
        format!("http://{}/login", self.addr)
    }

    /// Add an attached blob directly. Not counted as a mutation.
    pub fn seed(&self, name: &str) -> String {
        let mut s = self.state.lock().unwrap();
        let id = next_file_id(&mut s);
        s.blobs.push(Blob {
            id: id.clone(),
            name: name.to_string(),
            bytes: b"seeded".to_vec(),
        });
        s.members.push(id.clone());
        id
    }

    pub fn add_drive_file(&self, page: u8, id: &str, name: &str, bytes: &[u8]) {
        let file = DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            bytes: bytes.to_vec(),
            folder: false,
        };
        let mut s = self.state.lock().unwrap();
        if page == 1 {
            s.drive_page1.push(file);
        } else {
            s.drive_page2.push(file);
        }
    }

    pub fn add_drive_folder(&self, id: &str, name: &str) {
        self.state.lock().unwrap().drive_page1.push(DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            bytes: Vec::new(),
            folder: true,
        });
    }

    /// Names of attached blobs, sorted.
    pub fn attached_names(&self) -> Vec<String> {
        let s = self.state.lock().unwrap();
        let mut names: Vec<String> = s
            .members
            .iter()
            .filter_map(|id| s.blobs.iter().find(|b| &b.id == id))
            .map(|b| b.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn blob(&self, id: &str) -> Option<Blob> {
        self.state
            .lock()
            .unwrap()
            .blobs
            .iter()
            .find(|b| b.id == id)
            .cloned()
    }

    pub fn blob_count(&self) -> usize {
        self.state.lock().unwrap().blobs.len()
    }

    pub fn mutations(&self) -> u64 {
        self.state.lock().unwrap().mutations
    }

    pub fn downloads(&self) -> u64 {
        self.state.lock().unwrap().downloads
    }

    /// TOML config pointing every endpoint at this backend.
    pub fn config_toml(&self, extra: &str) -> String {
        format!(
            r#"
[store]
vector_store_id = "{store}"
api_base = "{api}"
api_key = "{key}"
timeout_secs = 10

{extra}
"#,
            store = STORE_ID,
            api = self.api_base(),
            key = API_KEY,
            extra = extra
        )
    }

    pub fn sharepoint_toml(&self, folder_path: &str, library: Option<&str>) -> String {
        let library = library
            .map(|l| format!("library_name = \"{}\"\n", l))
            .unwrap_or_default();
        format!(
            r#"
[sources.sharepoint]
tenant_id = "tenant-1"
client_id = "client-1"
client_secret = "{secret}"
hostname = "contoso.sharepoint.com"
site_path = "Team"
folder_path = "{folder}"
graph_base = "{graph}"
login_base = "{login}"
{library}
"#,
            secret = CLIENT_SECRET,
            folder = folder_path,
            graph = self.graph_base(),
            login = self.login_base(),
            library = library
        )
    }
}

fn next_file_id(s: &mut FakeState) -> String {
    s.next_id += 1;
    format!("file-{:04}", s.next_id)
}

fn authorized(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", token))
        .unwrap_or(false)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": { "message": message } }))).into_response()
}

// ============ Vector store API ============

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<usize>,
    after: Option<String>,
}

async fn list_store_files(
    State(state): State<Shared>,
    Path(vs): Path<String>,
    Query(q): Query<ListQuery>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, API_KEY) {
        return error(StatusCode::UNAUTHORIZED, "bad key");
    }
    if vs != STORE_ID {
        return error(StatusCode::NOT_FOUND, "no such vector store");
    }
    let s = state.lock().unwrap();
    let start = match &q.after {
        None => 0,
        Some(after) => match s.members.iter().position(|id| id == after) {
            Some(pos) => pos + 1,
            None => return error(StatusCode::BAD_REQUEST, "unknown cursor"),
        },
    };
    let size = q.limit.unwrap_or(20).min(s.page_size.max(1));
    let end = (start + size).min(s.members.len());
    let data: Vec<Value> = s.members[start..end]
        .iter()
        .map(|id| json!({ "id": id, "object": "vector_store.file", "status": "completed" }))
        .collect();
    let first_id = s.members.get(start).cloned();
    let last_id = if end > start {
        s.members.get(end - 1).cloned()
    } else {
        None
    };
    Json(json!({
        "object": "list",
        "first_id": first_id,
        "last_id": last_id,
        "has_more": end < s.members.len(),
        "data": data,
    }))
    .into_response()
}

async fn get_file(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, API_KEY) {
        return error(StatusCode::UNAUTHORIZED, "bad key");
    }
    let s = state.lock().unwrap();
    if s.broken_lookups.contains(&id) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "lookup exploded");
    }
    match s.blobs.iter().find(|b| b.id == id) {
        Some(b) => Json(json!({
            "id": b.id,
            "object": "file",
            "bytes": b.bytes.len(),
            "filename": b.name,
            "purpose": "assistants"
        }))
        .into_response(),
        None => error(StatusCode::NOT_FOUND, "no such file"),
    }
}

/// Pull `filename="..."` out of a multipart body.
fn multipart_filename(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let start = text.find("filename=\"")? + "filename=\"".len();
    let end = text[start..].find('"')?;
    Some(text[start..start + end].to_string())
}

async fn create_file(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Response {
    if !authorized(&headers, API_KEY) {
        return error(StatusCode::UNAUTHORIZED, "bad key");
    }
    let Some(name) = multipart_filename(&body) else {
        return error(StatusCode::BAD_REQUEST, "missing file part");
    };
    let mut s = state.lock().unwrap();
    if s.fail_create.contains(&name) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "create failed");
    }
    let id = next_file_id(&mut s);
    s.blobs.push(Blob {
        id: id.clone(),
        name: name.clone(),
        bytes: body.to_vec(),
    });
    s.mutations += 1;
    Json(json!({ "id": id, "object": "file", "filename": name })).into_response()
}

async fn attach_file(
    State(state): State<Shared>,
    Path(vs): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers, API_KEY) {
        return error(StatusCode::UNAUTHORIZED, "bad key");
    }
    if vs != STORE_ID {
        return error(StatusCode::NOT_FOUND, "no such vector store");
    }
    let Some(file_id) = body.get("file_id").and_then(|v| v.as_str()) else {
        return error(StatusCode::BAD_REQUEST, "file_id required");
    };
    let mut s = state.lock().unwrap();
    let Some(blob) = s.blobs.iter().find(|b| b.id == file_id).cloned() else {
        return error(StatusCode::NOT_FOUND, "no such file");
    };
    if s.fail_attach.contains(&blob.name) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "attach failed");
    }
    s.members.push(blob.id.clone());
    s.mutations += 1;
    Json(json!({ "id": blob.id, "object": "vector_store.file", "vector_store_id": vs }))
        .into_response()
}

async fn detach_file(
    State(state): State<Shared>,
    Path((vs, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, API_KEY) {
        return error(StatusCode::UNAUTHORIZED, "bad key");
    }
    if vs != STORE_ID {
        return error(StatusCode::NOT_FOUND, "no such vector store");
    }
    let mut s = state.lock().unwrap();
    if s.fail_detach.contains(&id) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "detach failed");
    }
    match s.members.iter().position(|m| *m == id) {
        Some(pos) => {
            s.members.remove(pos);
            s.mutations += 1;
            Json(json!({ "id": id, "object": "vector_store.file.deleted", "deleted": true }))
                .into_response()
        }
        None => error(StatusCode::NOT_FOUND, "not in vector store"),
    }
}

async fn delete_file(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, API_KEY) {
        return error(StatusCode::UNAUTHORIZED, "bad key");
    }
    let mut s = state.lock().unwrap();
    match s.blobs.iter().position(|b| b.id == id) {
        Some(pos) => {
            s.blobs.remove(pos);
            s.mutations += 1;
            Json(json!({ "id": id, "object": "file", "deleted": true })).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "no such file"),
    }
}

// ============ Token endpoint ============

async fn token(Path(tenant): Path<String>, Form(form): Form<HashMap<String, String>>) -> Response {
    let ok = tenant == "tenant-1"
        && form.get("grant_type").map(String::as_str) == Some("client_credentials")
        && form.get("client_secret").map(String::as_str) == Some(CLIENT_SECRET)
        && form.get("scope").map(String::as_str) == Some("https://graph.microsoft.com/.default");
    if ok {
        Json(json!({ "token_type": "Bearer", "expires_in": 3599, "access_token": GRAPH_TOKEN }))
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_client", "error_description": "AADSTS7000215: Invalid client secret" })),
        )
            .into_response()
    }
}

// ============ Graph API ============

fn drive_item_json(f: &DriveFile) -> Value {
    if f.folder {
        json!({ "id": f.id, "name": f.name, "folder": { "childCount": 1 } })
    } else {
        json!({
            "id": f.id,
            "name": f.name,
            "size": f.bytes.len(),
            "file": { "mimeType": "application/octet-stream" }
        })
    }
}

async fn graph(State(state): State<Shared>, headers: HeaderMap, uri: Uri) -> Response {
    if !authorized(&headers, GRAPH_TOKEN) {
        return error(StatusCode::UNAUTHORIZED, "bad graph token");
    }
    let path = uri.path().trim_start_matches("/graph").to_string();
    let slow = state
        .lock()
        .unwrap()
        .slow_downloads
        .iter()
        .any(|id| path == format!("/drives/drive-docs/items/{}/content", id));
    if slow {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    }
    let mut s = state.lock().unwrap();

    match path.as_str() {
        "/sites/contoso.sharepoint.com:/sites/Team" => {
            Json(json!({ "id": "site-1", "name": "Team" })).into_response()
        }
        "/sites/site-1/drives" => Json(json!({
            "value": [
                { "id": "drive-other", "name": "Archive" },
                { "id": "drive-docs", "name": "Documents" }
            ]
        }))
        .into_response(),
        "/sites/site-1/drive" => Json(json!({ "id": "drive-docs", "name": "Documents" })).into_response(),
        "/drives/drive-docs/root:/Shared%20Documents/Policies:/children" => {
            let addr = s.addr.unwrap();
            let value: Vec<Value> = s.drive_page1.iter().map(drive_item_json).collect();
            let mut body = json!({ "value": value });
            if !s.drive_page2.is_empty() {
                body["@odata.nextLink"] =
                    json!(format!("http://{}/graph/drives/drive-docs/children-page-2", addr));
            }
            Json(body).into_response()
        }
        "/drives/drive-docs/children-page-2" => {
            let value: Vec<Value> = s.drive_page2.iter().map(drive_item_json).collect();
            Json(json!({ "value": value })).into_response()
        }
        other => {
            let prefix = "/drives/drive-docs/items/";
            if let Some(item) = other
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix("/content"))
            {
                if s.broken_downloads.contains(item) {
                    return error(StatusCode::SERVICE_UNAVAILABLE, "download failed");
                }
                let file = s
                    .drive_page1
                    .iter()
                    .chain(s.drive_page2.iter())
                    .find(|f| f.id == item)
                    .cloned();
                return match file {
                    Some(f) => {
                        s.downloads += 1;
                        (StatusCode::OK, f.bytes).into_response()
                    }
                    None => error(StatusCode::NOT_FOUND, "itemNotFound"),
                };
            }
            error(StatusCode::NOT_FOUND, &format!("unknown graph path {}", other))
        }
    }
}
