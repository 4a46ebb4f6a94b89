//! Storage backends
//!
//! Every backend reads and writes the whole [`Document`]. Three
//! implementations share one capability interface:
//!
//! - **Local**: a JSON file in the data directory, always available
//! - **Server**: a same-origin style HTTP API (`/status`, `/`, `/upload`)
//! - **Cloud**: a third-party JSON blob endpoint with a key header
//!
//! New backends are added by implementing [`Backend`]; the orchestrator only
//! talks to the trait.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::Document;

pub mod cloud;
pub mod error;
pub mod local;
pub mod server;

pub use cloud::CloudBackend;
pub use error::{BackendError, BackendResult};
pub use local::LocalBackend;
pub use server::ServerBackend;

/// Which storage target is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Server,
    Cloud,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Local => "Local",
            BackendKind::Server => "Server",
            BackendKind::Cloud => "Cloud",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "server" => Ok(BackendKind::Server),
            "cloud" => Ok(BackendKind::Cloud),
            other => Err(format!(
                "Unknown backend '{}'. Use local, server or cloud.",
                other
            )),
        }
    }
}

/// Result of an availability probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Whether the backend can be used right now
    pub online: bool,
    /// Short human-readable status
    pub message: String,
    /// Extra detail (server type and version, failure hint)
    pub details: Option<String>,
}

impl ProbeReport {
    pub fn online(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            online: true,
            message: message.into(),
            details,
        }
    }

    pub fn offline(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            online: false,
            message: message.into(),
            details,
        }
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{} ({})", self.message, details),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Uniform read/write of the journal document
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which kind of backend this is
    fn kind(&self) -> BackendKind;

    /// Check availability without touching the document
    ///
    /// Transport failures are reported as an offline [`ProbeReport`], not
    /// as an error; errors are reserved for misconfiguration.
    async fn probe(&self) -> BackendResult<ProbeReport>;

    /// Load the full document
    async fn load(&self) -> BackendResult<Document>;

    /// Replace the stored document
    async fn save(&self, doc: &Document) -> BackendResult<()>;

    /// Store an image next to the document and return its URL
    ///
    /// `None` means this backend does not host images; callers embed the
    /// image in the entry instead.
    async fn upload_image(&self, _bytes: Vec<u8>, _filename: &str) -> BackendResult<Option<String>> {
        Ok(None)
    }
}

/// Decode a remote response body into a document
///
/// Accepts the document either bare or wrapped in `{"record": {...}}` (the
/// shape JSON blob stores return). `require_content` rejects bodies that
/// carry neither `entries` nor `questions`.
pub(crate) fn decode_document(
    backend: BackendKind,
    body: &str,
    require_content: bool,
) -> BackendResult<Document> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| BackendError::MalformedResponse {
            backend,
            details: format!("body is not JSON: {}", e),
        })?;

    let has_content = |v: &serde_json::Value| {
        v.get("entries").is_some() || v.get("questions").is_some()
    };

    let value = match value.get("record") {
        Some(record) if record.is_object() && has_content(record) => record.clone(),
        _ => value,
    };

    if !value.is_object() {
        return Err(BackendError::MalformedResponse {
            backend,
            details: "body is not a JSON object".to_string(),
        });
    }

    if require_content && !has_content(&value) {
        return Err(BackendError::MalformedResponse {
            backend,
            details: "neither 'entries' nor 'questions' present".to_string(),
        });
    }

    // The file-store server writes `[]` for an empty settings file
    let mut value = value;
    if let Some(object) = value.as_object_mut() {
        object.remove("record");
        object.remove("metadata");
    }
    if value.get("settings").is_some_and(|s| !s.is_object()) {
        value["settings"] = serde_json::Value::Object(Default::default());
    }

    serde_json::from_value(value).map_err(|e| BackendError::MalformedResponse {
        backend,
        details: e.to_string(),
    })
}

/// Append a cache-busting `t=<millis>` query parameter
pub(crate) fn cache_busted(url: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}t={}",
        url,
        sep,
        chrono::Utc::now().timestamp_millis()
    )
}
