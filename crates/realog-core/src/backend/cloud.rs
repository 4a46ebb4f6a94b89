//! Third-party cloud blob backend
//!
//! The cloud target is any JSON blob endpoint that answers `GET` with the
//! document and accepts `PUT` of the full document. JSONBin-style stores
//! wrap the payload in `{"record": {...}}`; that wrapper is removed on load.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use super::{cache_busted, decode_document, Backend, BackendError, BackendKind, BackendResult, ProbeReport};
use crate::document::Document;
use crate::models::CloudConfig;

/// HTTP backend for a user-supplied blob URL
#[derive(Debug, Clone)]
pub struct CloudBackend {
    url: String,
    api_key: Option<String>,
    client: Client,
}

impl CloudBackend {
    /// Build from the cloud section of the document settings
    ///
    /// Fails with [`BackendError::Misconfigured`] when cloud sync is disabled
    /// or no URL has been set.
    pub fn from_config(config: &CloudConfig, timeout: Duration) -> BackendResult<Self> {
        if !config.enabled {
            return Err(BackendError::Misconfigured {
                backend: BackendKind::Cloud,
                details: "cloud sync is disabled in settings".to_string(),
            });
        }
        let url = config
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| BackendError::Misconfigured {
                backend: BackendKind::Cloud,
                details: "no cloud URL set".to_string(),
            })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Misconfigured {
                backend: BackendKind::Cloud,
                details: format!("could not build HTTP client: {}", e),
            })?;

        Ok(Self {
            url: url.to_string(),
            api_key: config
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Attach the key in every header a blob store might look for
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request
                .bearer_auth(key)
                .header("X-Master-Key", key)
                .header("X-Access-Key", key),
            None => request,
        }
    }

    async fn fetch(&self) -> BackendResult<String> {
        let request = self
            .client
            .get(cache_busted(&self.url))
            .header("Accept", "application/json");

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| BackendError::from_transport(BackendKind::Cloud, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::from_transport(BackendKind::Cloud, e))?;

        if !(200..300).contains(&status) {
            return Err(BackendError::from_status(BackendKind::Cloud, status, body));
        }
        Ok(body)
    }
}

#[async_trait]
impl Backend for CloudBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    async fn probe(&self) -> BackendResult<ProbeReport> {
        debug!("Probing cloud endpoint");
        match self.fetch().await {
            Ok(_) => Ok(ProbeReport::online("Online", None)),
            Err(BackendError::Unreachable { details, .. }) => {
                Ok(ProbeReport::offline("Network error", Some(details)))
            }
            Err(BackendError::Rejected {
                status, details, ..
            }) if status >= 500 => Ok(ProbeReport::offline(
                format!("HTTP error: {}", status),
                Some(details),
            )),
            // Credential and request problems are not outages
            Err(e) => Err(e),
        }
    }

    async fn load(&self) -> BackendResult<Document> {
        debug!("Loading document from cloud");
        let body = self.fetch().await?;
        decode_document(BackendKind::Cloud, &body, true)
    }

    async fn save(&self, doc: &Document) -> BackendResult<()> {
        debug!("Saving document to cloud ({} entries)", doc.entries.len());

        let request = self.client.put(&self.url).json(doc);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| BackendError::from_transport(BackendKind::Cloud, e))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(BackendKind::Cloud, status, body));
        }
        Ok(())
    }
}
