//! Self-hosted server backend
//!
//! Talks to the small file-store API that ships next to the web client:
//!
//! - `GET  {base}/status` -> `{status, type, version}`
//! - `GET  {base}/`       -> `{entries, settings, questions}`
//! - `POST {base}/`       -> overwrites the provided top-level fields
//! - `POST {base}/upload` -> multipart `image`, answers `{url}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{cache_busted, decode_document, Backend, BackendError, BackendKind, BackendResult, ProbeReport};
use crate::document::Document;

/// Default API base used when none is configured
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080/api";

/// Status endpoint payload
#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    version: Option<String>,
}

/// Error payload returned with non-success statuses
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<String>,
    message: Option<String>,
}

/// HTTP backend for the self-hosted file-store API
#[derive(Debug, Clone)]
pub struct ServerBackend {
    base_url: String,
    client: Client,
}

impl ServerBackend {
    /// Create a backend for the API rooted at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Misconfigured {
                backend: BackendKind::Server,
                details: format!("could not build HTTP client: {}", e),
            })?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a backend sharing an existing HTTP client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of an API endpoint
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn transport(e: reqwest::Error) -> BackendError {
        BackendError::from_transport(BackendKind::Server, e)
    }

    /// Turn a non-success response into an error, reading its error payload
    async fn reject(response: reqwest::Response) -> BackendError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let details = serde_json::from_str::<ErrorPayload>(&text)
            .ok()
            .and_then(|p| p.error.or(p.message))
            .unwrap_or_else(|| truncate(&text, 200));
        BackendError::from_status(BackendKind::Server, status, details)
    }
}

#[async_trait]
impl Backend for ServerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Server
    }

    async fn probe(&self) -> BackendResult<ProbeReport> {
        let url = cache_busted(&self.endpoint("status"));
        debug!("Probing server status at {}", url);

        let response = match self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return Ok(ProbeReport::offline("Network error", Some(e.to_string())));
            }
        };

        let status = response.status();
        if matches!(status.as_u16(), 401 | 403) {
            return Err(BackendError::from_status(
                BackendKind::Server,
                status.as_u16(),
                String::new(),
            ));
        }
        if status.as_u16() == 404 {
            return Ok(ProbeReport::offline(
                "API not found",
                Some("missing API script or rewrite rules".to_string()),
            ));
        }
        if status.as_u16() == 500 {
            return Ok(ProbeReport::offline(
                "Server error",
                Some("check script permissions".to_string()),
            ));
        }
        if !status.is_success() {
            return Ok(ProbeReport::offline(
                format!("HTTP error: {}", status.as_u16()),
                status.canonical_reason().map(str::to_string),
            ));
        }

        let text = response.text().await.unwrap_or_default();
        Ok(classify_status_body(&text))
    }

    async fn load(&self) -> BackendResult<Document> {
        let url = cache_busted(&self.endpoint(""));
        debug!("Loading document from server");

        let response = self.client.get(&url).send().await.map_err(Self::transport)?;
        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        let body = response.text().await.map_err(Self::transport)?;
        decode_document(BackendKind::Server, &body, false)
    }

    async fn save(&self, doc: &Document) -> BackendResult<()> {
        debug!(
            "Saving document to server ({} entries, {} questions)",
            doc.entries.len(),
            doc.questions.len()
        );

        let response = self
            .client
            .post(self.endpoint(""))
            .json(doc)
            .send()
            .await
            .map_err(Self::transport)?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        // A 2xx carrying an error payload is still a failure
        let text = response.text().await.unwrap_or_default();
        if let Ok(ErrorPayload {
            error: Some(error), ..
        }) = serde_json::from_str::<ErrorPayload>(&text)
        {
            return Err(BackendError::Rejected {
                backend: BackendKind::Server,
                status: 200,
                details: error,
            });
        }

        Ok(())
    }

    async fn upload_image(&self, bytes: Vec<u8>, filename: &str) -> BackendResult<Option<String>> {
        #[derive(Deserialize)]
        struct UploadPayload {
            url: Option<String>,
            error: Option<String>,
        }

        let part = Part::bytes(bytes).file_name(filename.to_string());
        let form = Form::new().part("image", part);

        let response = self
            .client
            .post(cache_busted(&self.endpoint("upload")))
            .multipart(form)
            .send()
            .await
            .map_err(Self::transport)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(Self::transport)?;
        let payload: UploadPayload =
            serde_json::from_str(&text).map_err(|e| BackendError::MalformedResponse {
                backend: BackendKind::Server,
                details: format!("upload response: {}", e),
            })?;

        if let Some(error) = payload.error {
            warn!("Image upload rejected: {}", error);
            return Err(BackendError::Rejected {
                backend: BackendKind::Server,
                status,
                details: error,
            });
        }
        if !(200..300).contains(&status) {
            return Err(BackendError::from_status(BackendKind::Server, status, text));
        }

        payload
            .url
            .map(Some)
            .ok_or_else(|| BackendError::MalformedResponse {
                backend: BackendKind::Server,
                details: "upload response has no 'url'".to_string(),
            })
    }
}

/// Interpret the body of a successful status request
///
/// A body that is not JSON usually means the web server returned the API
/// script's source instead of executing it; say so.
fn classify_status_body(text: &str) -> ProbeReport {
    match serde_json::from_str::<StatusPayload>(text) {
        Ok(payload) if payload.status == "online" => {
            let kind = payload.kind.as_deref().unwrap_or("node");
            let version = payload.version.unwrap_or_default();
            ProbeReport::online(
                "Online",
                Some(format!("({}) {}", kind, version).trim().to_string()),
            )
        }
        Ok(_) => ProbeReport::offline("Error", Some(truncate(text, 200))),
        Err(_) if text.contains("#!/usr/bin/env node") => ProbeReport::offline(
            "Server did not execute the API script",
            Some("rewrite/CGI configuration required".to_string()),
        ),
        Err(_) if text.contains("<?php") => ProbeReport::offline(
            "Server did not execute PHP",
            Some("PHP is not enabled for the API script".to_string()),
        ),
        Err(_) => ProbeReport::offline("Invalid JSON response", None),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
