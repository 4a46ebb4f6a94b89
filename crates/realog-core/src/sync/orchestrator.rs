//! Backend selection and write-through
//!
//! The orchestrator owns the in-memory document. Every mutation is written
//! to the local file at once; when a remote backend is active, a debounced
//! save of the full document follows. The remote decides what is
//! authoritative at startup and on an explicit switch; after that, local
//! edits always win and are pushed.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::debounce::Debouncer;
use super::status::{StatusReporter, SyncSnapshot};
use crate::backend::{
    Backend, BackendError, BackendKind, BackendResult, CloudBackend, LocalBackend, ServerBackend,
};
use crate::document::Document;
use crate::models::{AppSettings, CloudConfig, Entry, Question};

/// Shortest allowed delay before a server write
pub const MIN_SERVER_DEBOUNCE: Duration = Duration::from_millis(1000);
/// Shortest allowed delay before a cloud write
pub const MIN_CLOUD_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Builds the remote backends on demand
///
/// The cloud backend is configured from the document settings, so it can
/// only be built once the document is loaded.
pub trait BackendFactory: Send + Sync {
    fn server(&self) -> BackendResult<Arc<dyn Backend>>;
    fn cloud(&self, config: &CloudConfig) -> BackendResult<Arc<dyn Backend>>;
}

/// Factory for the real HTTP backends
#[derive(Debug, Clone)]
pub struct HttpBackendFactory {
    pub server_url: String,
    pub timeout: Duration,
}

impl BackendFactory for HttpBackendFactory {
    fn server(&self) -> BackendResult<Arc<dyn Backend>> {
        Ok(Arc::new(ServerBackend::new(
            self.server_url.clone(),
            self.timeout,
        )?))
    }

    fn cloud(&self, config: &CloudConfig) -> BackendResult<Arc<dyn Backend>> {
        Ok(Arc::new(CloudBackend::from_config(config, self.timeout)?))
    }
}

/// Startup and write-timing options
#[derive(Debug, Clone)]
pub struct StartupOptions {
    /// Probe the server at startup; `false` keeps the session offline
    pub probe_server: bool,
    /// Backend the user picked last; `None` auto-detects
    pub preferred: Option<BackendKind>,
    pub server_debounce: Duration,
    pub cloud_debounce: Duration,
}

impl Default for StartupOptions {
    fn default() -> Self {
        Self {
            probe_server: true,
            preferred: None,
            server_debounce: MIN_SERVER_DEBOUNCE,
            cloud_debounce: MIN_CLOUD_DEBOUNCE,
        }
    }
}

impl StartupOptions {
    /// Debounce delay for a backend, clamped to its minimum
    pub fn debounce_for(&self, kind: BackendKind) -> Duration {
        match kind {
            BackendKind::Local => Duration::ZERO,
            BackendKind::Server => self.server_debounce.max(MIN_SERVER_DEBOUNCE),
            BackendKind::Cloud => self.cloud_debounce.max(MIN_CLOUD_DEBOUNCE),
        }
    }
}

/// Owner of the document and the sync policy
pub struct SyncOrchestrator {
    document: Document,
    local: LocalBackend,
    remote: Option<Arc<dyn Backend>>,
    factory: Arc<dyn BackendFactory>,
    debouncer: Debouncer,
    status: StatusReporter,
    options: StartupOptions,
}

impl SyncOrchestrator {
    /// Load the document and pick the authoritative backend
    ///
    /// Without a preference the server is tried first, then the cloud. A
    /// preferred cloud is tried before the server, and a preferred local
    /// backend skips every remote. Remote problems degrade to the local
    /// document with the reason recorded in the status; only a local file
    /// that cannot be read is an error.
    pub async fn start(
        local: LocalBackend,
        factory: Arc<dyn BackendFactory>,
        options: StartupOptions,
    ) -> BackendResult<Self> {
        let document = local.load_or_default()?;
        let mut orchestrator = Self {
            document,
            local,
            remote: None,
            factory,
            debouncer: Debouncer::new(),
            status: StatusReporter::new(BackendKind::Local),
            options,
        };

        match orchestrator.options.preferred {
            Some(BackendKind::Local) => {
                debug!("Local backend preferred, skipping remotes");
            }
            Some(BackendKind::Cloud) => {
                if !orchestrator.try_start_on_cloud().await && orchestrator.options.probe_server {
                    orchestrator.try_start_on_server().await;
                }
            }
            Some(BackendKind::Server) | None => {
                let server_answered =
                    orchestrator.options.probe_server && orchestrator.try_start_on_server().await;
                if !server_answered {
                    orchestrator.try_start_on_cloud().await;
                }
            }
        }

        orchestrator.persist_local();
        info!(
            "Sync started on {} backend ({} entries)",
            orchestrator.active_backend(),
            orchestrator.document.entries.len()
        );
        Ok(orchestrator)
    }

    /// Returns whether the server was online
    ///
    /// An online server whose document cannot be loaded still ends the
    /// search: the session stays local with the error recorded.
    async fn try_start_on_server(&mut self) -> bool {
        let server = match self.factory.server() {
            Ok(server) => server,
            Err(e) => {
                warn!("Server backend unavailable: {}", e);
                return false;
            }
        };

        let report = match server.probe().await {
            Ok(report) => report,
            Err(e) => {
                warn!("Server probe failed: {}", e);
                return false;
            }
        };
        self.status.set_message(format!("Server: {}", report));
        if !report.online {
            debug!("Server offline: {}", report);
            return false;
        }

        match server.load().await {
            Ok(remote) => {
                self.adopt(server, remote);
                true
            }
            Err(e) => {
                // Probe said online; the document itself is unreadable
                warn!("Server load failed, staying on local document: {}", e);
                self.status.failed(e.to_string());
                true
            }
        }
    }

    /// Returns whether the cloud document was adopted
    async fn try_start_on_cloud(&mut self) -> bool {
        let config = self.document.settings.cloud_config();
        if !config.is_usable() {
            debug!("Cloud not configured");
            return false;
        }

        let result = match self.factory.cloud(&config) {
            Ok(cloud) => cloud.load().await.map(|remote| (cloud, remote)),
            Err(e) => Err(e),
        };

        match result {
            Ok((cloud, remote)) => {
                self.adopt(cloud, remote);
                true
            }
            Err(e) => {
                warn!("Cloud load failed: {}", e);
                self.status.failed(e.to_string());
                false
            }
        }
    }

    /// Make `remote` active with its document merged over the local one
    fn adopt(&mut self, backend: Arc<dyn Backend>, remote: Document) {
        let kind = backend.kind();
        self.document = Document::adopt_remote(&self.document, remote);
        self.remote = Some(backend);
        self.status.set_backend(kind);
        self.status.acknowledged();
        info!("Adopted {} document ({} entries)", kind, self.document.entries.len());
    }

    // ==================== Accessors ====================

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn settings(&self) -> &AppSettings {
        &self.document.settings
    }

    pub fn local(&self) -> &LocalBackend {
        &self.local
    }

    pub fn data_dir(&self) -> &Path {
        self.local.path().parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn active_backend(&self) -> BackendKind {
        self.remote
            .as_ref()
            .map(|r| r.kind())
            .unwrap_or(BackendKind::Local)
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.status.snapshot()
    }

    /// Observe status changes, including those of background writes
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.status.subscribe()
    }

    pub fn has_pending_write(&self) -> bool {
        self.debouncer.has_pending()
    }

    // ==================== Backend switching ====================

    /// Make `kind` the authoritative backend
    ///
    /// The target is probed and loaded before anything changes; on error
    /// the active backend and the document are left as they were.
    pub async fn switch_backend(&mut self, kind: BackendKind) -> BackendResult<()> {
        if kind == BackendKind::Local {
            self.debouncer.cancel();
            self.remote = None;
            self.status.set_backend(BackendKind::Local);
            info!("Switched to local backend");
            return Ok(());
        }

        let backend = match kind {
            BackendKind::Server => self.factory.server()?,
            _ => self.factory.cloud(&self.document.settings.cloud_config())?,
        };

        let report = backend.probe().await?;
        if !report.online {
            return Err(BackendError::Unreachable {
                backend: kind,
                details: report.to_string(),
            });
        }
        let remote = backend.load().await?;

        self.debouncer.cancel();
        self.status.set_message(format!("{}: {}", kind, report));
        self.adopt(backend, remote);
        self.persist_local();
        Ok(())
    }

    // ==================== Mutations ====================

    /// Apply a change, persist it locally and schedule the remote write
    pub fn mutate<R>(&mut self, change: impl FnOnce(&mut Document) -> R) -> R {
        let result = change(&mut self.document);
        self.persist_local();
        self.schedule_remote_save();
        result
    }

    pub fn save_entry(&mut self, entry: Entry) {
        self.mutate(|doc| doc.upsert_entry(entry));
    }

    pub fn delete_entry(&mut self, id: &str) -> bool {
        self.mutate(|doc| doc.delete_entry(id))
    }

    pub fn add_question(&mut self, question: Question) {
        self.mutate(|doc| doc.add_question(question));
    }

    pub fn delete_question(&mut self, id: &str) -> bool {
        self.mutate(|doc| doc.delete_question(id))
    }

    pub fn set_question_active(&mut self, id: &str, active: bool) -> bool {
        self.mutate(|doc| doc.set_question_active(id, active))
    }

    pub fn update_settings(&mut self, change: impl FnOnce(&mut AppSettings)) {
        self.mutate(|doc| change(&mut doc.settings));
    }

    /// Overwrite the whole document (import)
    pub fn replace_document(&mut self, document: Document) {
        self.mutate(|doc| *doc = document);
    }

    /// Send any pending remote write now and wait for it
    pub async fn flush(&mut self) {
        self.debouncer.flush().await;
    }

    pub fn dismiss_error(&self) {
        self.status.dismissed();
    }

    /// Store a photo and return the URL to put on the entry
    ///
    /// Backends that host images (the server) get an upload; otherwise the
    /// image is embedded as a data URL.
    pub async fn attach_photo(&self, bytes: Vec<u8>, filename: &str) -> BackendResult<String> {
        if let Some(remote) = &self.remote {
            if let Some(url) = remote.upload_image(bytes.clone(), filename).await? {
                return Ok(url);
            }
        }
        Ok(format!(
            "data:{};base64,{}",
            image_mime(filename),
            STANDARD.encode(&bytes)
        ))
    }

    fn persist_local(&self) {
        if let Err(e) = self.local.write(&self.document) {
            warn!("Local write failed: {}", e);
        }
    }

    fn schedule_remote_save(&mut self) {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        let delay = self.options.debounce_for(remote.kind());
        let snapshot = self.document.clone();
        let status = self.status.clone();

        debug!("Scheduling {} write in {:?}", remote.kind(), delay);
        self.debouncer.schedule(delay, async move {
            status.dispatched();
            match remote.save(&snapshot).await {
                Ok(()) => {
                    debug!("{} write acknowledged", remote.kind());
                    status.acknowledged();
                }
                Err(e) => {
                    warn!("{} write failed: {}", remote.kind(), e);
                    status.failed(e.to_string());
                }
            }
        });
    }
}

/// MIME type for an image file name
pub fn image_mime(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}
