//! Test doubles shared by the backend and sync tests
//!
//! `FakeRemote` is an in-process axum server speaking both the file-store
//! API (under `/api`) and a JSONBin-style blob (under `/cloud/b/1`).
//! `RecordingBackend` is an in-memory [`Backend`] that records every call,
//! for timing tests that must not touch real sockets. `StaticFactory`
//! hands those doubles to the orchestrator.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::backend::{Backend, BackendError, BackendKind, BackendResult, ProbeReport};
use crate::document::Document;
use crate::models::CloudConfig;
use crate::sync::BackendFactory;

/// Key the fake cloud endpoint accepts
pub const TEST_CLOUD_KEY: &str = "test-master-key";

#[derive(Default)]
struct RemoteState {
    server_doc: Mutex<Value>,
    cloud_doc: Mutex<Value>,
    saves: AtomicUsize,
    fail_status: Mutex<Option<u16>>,
}

impl RemoteState {
    fn failure(&self) -> Option<StatusCode> {
        self.fail_status
            .lock()
            .unwrap()
            .map(|code| StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
    }
}

/// Running fake remote
pub struct FakeRemote {
    addr: SocketAddr,
    state: Arc<RemoteState>,
}

impl FakeRemote {
    pub async fn spawn() -> Self {
        let state = Arc::new(RemoteState {
            server_doc: Mutex::new(json!({"entries": [], "questions": [], "settings": []})),
            cloud_doc: Mutex::new(json!({"entries": [], "questions": [], "settings": {}})),
            ..Default::default()
        });

        let app = Router::new()
            .route("/api/status", get(status))
            .route("/api/", get(get_document).post(post_document))
            .route("/api/upload", post(upload))
            .route("/cloud/b/1", get(get_blob).put(put_blob))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn cloud_url(&self) -> String {
        format!("http://{}/cloud/b/1", self.addr)
    }

    /// Number of successful document writes (server and cloud)
    pub fn save_count(&self) -> usize {
        self.state.saves.load(Ordering::SeqCst)
    }

    /// Make every request, server or cloud, fail with `status`
    pub fn fail_with(&self, status: u16) {
        *self.state.fail_status.lock().unwrap() = Some(status);
    }

    pub fn set_server_document(&self, doc: &Document) {
        *self.state.server_doc.lock().unwrap() = serde_json::to_value(doc).unwrap();
    }

    pub fn set_cloud_body(&self, body: Value) {
        *self.state.cloud_doc.lock().unwrap() = body;
    }

    pub fn server_document(&self) -> Value {
        self.state.server_doc.lock().unwrap().clone()
    }
}

async fn status(State(state): State<Arc<RemoteState>>) -> Response {
    match state.failure() {
        Some(code) => code.into_response(),
        None => Json(json!({"status": "online", "type": "node", "version": "1.0.0"})).into_response(),
    }
}

async fn get_document(State(state): State<Arc<RemoteState>>) -> Response {
    if let Some(code) = state.failure() {
        return (code, Json(json!({"error": "read failed"}))).into_response();
    }
    Json(state.server_doc.lock().unwrap().clone()).into_response()
}

async fn post_document(State(state): State<Arc<RemoteState>>, Json(body): Json<Value>) -> Response {
    if let Some(code) = state.failure() {
        return (code, Json(json!({"error": "write failed"}))).into_response();
    }
    {
        let mut doc = state.server_doc.lock().unwrap();
        if let (Some(target), Some(fields)) = (doc.as_object_mut(), body.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
    }
    state.saves.fetch_add(1, Ordering::SeqCst);
    Json(json!({"success": true})).into_response()
}

async fn upload(State(state): State<Arc<RemoteState>>, mut multipart: Multipart) -> Response {
    if let Some(code) = state.failure() {
        return (code, Json(json!({"error": "upload failed"}))).into_response();
    }
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("image") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let allowed = [".jpg", ".jpeg", ".png", ".gif", ".webp"]
            .iter()
            .any(|ext| name.to_ascii_lowercase().ends_with(ext));
        if !allowed {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid file type"})))
                .into_response();
        }
        return Json(json!({"url": format!("img/{}", name)})).into_response();
    }
    (StatusCode::BAD_REQUEST, Json(json!({"error": "No file uploaded"}))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("X-Master-Key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == TEST_CLOUD_KEY)
}

async fn get_blob(State(state): State<Arc<RemoteState>>, headers: HeaderMap) -> Response {
    if let Some(code) = state.failure() {
        return (code, Json(json!({"message": "failed"}))).into_response();
    }
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid key"}))).into_response();
    }
    let record = state.cloud_doc.lock().unwrap().clone();
    Json(json!({"record": record, "metadata": {"id": "1", "private": true}})).into_response()
}

async fn put_blob(
    State(state): State<Arc<RemoteState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(code) = state.failure() {
        return (code, Json(json!({"message": "failed"}))).into_response();
    }
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid key"}))).into_response();
    }
    *state.cloud_doc.lock().unwrap() = body;
    state.saves.fetch_add(1, Ordering::SeqCst);
    Json(json!({"metadata": {"id": "1"}})).into_response()
}

/// URL of a port nothing listens on
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api", addr)
}

/// In-memory backend recording probes, loads and saves
pub struct RecordingBackend {
    kind: BackendKind,
    online: AtomicBool,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
    document: Mutex<Document>,
    saves: Mutex<Vec<Document>>,
    probes: AtomicUsize,
    loads: AtomicUsize,
}

impl RecordingBackend {
    pub fn new(kind: BackendKind, document: Document) -> Arc<Self> {
        Arc::new(Self {
            kind,
            online: AtomicBool::new(true),
            fail_saves: AtomicBool::new(false),
            fail_loads: AtomicBool::new(false),
            document: Mutex::new(document),
            saves: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
        })
    }

    /// A backend whose probe reports offline and whose loads fail
    pub fn offline(kind: BackendKind) -> Arc<Self> {
        let backend = Self::new(kind, Document::default());
        backend.online.store(false, Ordering::SeqCst);
        backend.fail_loads.store(true, Ordering::SeqCst);
        backend
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn saves(&self) -> Vec<Document> {
        self.saves.lock().unwrap().clone()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn unreachable(&self) -> BackendError {
        BackendError::Unreachable {
            backend: self.kind,
            details: "connection refused".to_string(),
        }
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn probe(&self) -> BackendResult<ProbeReport> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.online.load(Ordering::SeqCst) {
            Ok(ProbeReport::online("Online", None))
        } else {
            Ok(ProbeReport::offline("Network error", None))
        }
    }

    async fn load(&self) -> BackendResult<Document> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(self.unreachable());
        }
        Ok(self.document.lock().unwrap().clone())
    }

    async fn save(&self, doc: &Document) -> BackendResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(self.unreachable());
        }
        self.saves.lock().unwrap().push(doc.clone());
        *self.document.lock().unwrap() = doc.clone();
        Ok(())
    }

    async fn upload_image(&self, _bytes: Vec<u8>, filename: &str) -> BackendResult<Option<String>> {
        match self.kind {
            BackendKind::Server => Ok(Some(format!("img/{}", filename))),
            _ => Ok(None),
        }
    }
}

/// Factory handing out pre-built doubles
pub struct StaticFactory {
    server: Option<Arc<RecordingBackend>>,
    cloud: Option<Arc<RecordingBackend>>,
    cloud_requests: AtomicUsize,
}

impl StaticFactory {
    pub fn new(server: Option<Arc<RecordingBackend>>, cloud: Option<Arc<RecordingBackend>>) -> Self {
        Self {
            server,
            cloud,
            cloud_requests: AtomicUsize::new(0),
        }
    }

    pub fn cloud_requests(&self) -> usize {
        self.cloud_requests.load(Ordering::SeqCst)
    }
}

impl BackendFactory for StaticFactory {
    fn server(&self) -> BackendResult<Arc<dyn Backend>> {
        match &self.server {
            Some(server) => Ok(server.clone()),
            None => Err(BackendError::Misconfigured {
                backend: BackendKind::Server,
                details: "no server in test".to_string(),
            }),
        }
    }

    fn cloud(&self, config: &CloudConfig) -> BackendResult<Arc<dyn Backend>> {
        self.cloud_requests.fetch_add(1, Ordering::SeqCst);
        if !config.is_usable() {
            return Err(BackendError::Misconfigured {
                backend: BackendKind::Cloud,
                details: "cloud sync is disabled in settings".to_string(),
            });
        }
        match &self.cloud {
            Some(cloud) => Ok(cloud.clone()),
            None => Err(BackendError::Misconfigured {
                backend: BackendKind::Cloud,
                details: "no cloud in test".to_string(),
            }),
        }
    }
}
