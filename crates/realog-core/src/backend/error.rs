//! Backend error handling
//!
//! Provides typed errors for document loads and saves with messages that
//! distinguish "could not reach it" from "it said no" from "it answered
//! garbage", whichever backend produced them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::BackendKind;

/// Errors that can occur while talking to a storage backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// Network or DNS failure, connection refused, timeout
    #[error("{backend} backend unreachable: {details}")]
    Unreachable {
        backend: BackendKind,
        details: String,
    },

    /// The backend refused our credentials
    #[error("{backend} backend rejected credentials (HTTP {status}). Check the API key.")]
    Unauthorized { backend: BackendKind, status: u16 },

    /// Any other non-success response, or an explicit error payload
    #[error("{backend} backend rejected the request (HTTP {status}): {details}")]
    Rejected {
        backend: BackendKind,
        status: u16,
        details: String,
    },

    /// Body was not JSON, or lacked the fields a document needs
    #[error("{backend} backend returned a malformed response: {details}")]
    MalformedResponse {
        backend: BackendKind,
        details: String,
    },

    /// Local file could not be read, written or serialized
    #[error("Local storage failure at '{path}': {details}")]
    LocalStorage { path: PathBuf, details: String },

    /// Local file was read but does not hold a document
    #[error("Local document at '{path}' is corrupt: {details}")]
    CorruptDocument { path: PathBuf, details: String },

    /// Import file rejected before anything was overwritten
    #[error("Import rejected: {details}")]
    ImportValidation { details: String },

    /// The backend cannot be used with the current configuration
    #[error("{backend} backend is not configured: {details}")]
    Misconfigured {
        backend: BackendKind,
        details: String,
    },
}

impl BackendError {
    /// Create a local storage error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        let details = match error.kind() {
            io::ErrorKind::PermissionDenied => {
                format!("permission denied ({}). Check file permissions.", error)
            }
            _ if is_disk_full_error(&error) => {
                format!("disk full or quota exceeded ({}). Free up disk space.", error)
            }
            _ => error.to_string(),
        };
        BackendError::LocalStorage { path, details }
    }

    /// Classify a transport-level reqwest failure
    pub fn from_transport(backend: BackendKind, error: reqwest::Error) -> Self {
        if error.is_decode() {
            return BackendError::MalformedResponse {
                backend,
                details: error.to_string(),
            };
        }
        if let Some(status) = error.status() {
            return Self::from_status(backend, status.as_u16(), error.to_string());
        }
        let details = if error.is_timeout() {
            format!("request timed out ({})", error)
        } else if error.is_connect() {
            format!("connection failed ({})", error)
        } else {
            error.to_string()
        };
        BackendError::Unreachable { backend, details }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(backend: BackendKind, status: u16, details: impl Into<String>) -> Self {
        match status {
            401 | 403 => BackendError::Unauthorized { backend, status },
            _ => BackendError::Rejected {
                backend,
                status,
                details: details.into(),
            },
        }
    }

    /// Whether the failure was a connectivity problem
    pub fn is_connectivity(&self) -> bool {
        matches!(self, BackendError::Unreachable { .. })
    }

    /// Which backend produced the error, if any
    pub fn backend(&self) -> Option<BackendKind> {
        match self {
            BackendError::Unreachable { backend, .. }
            | BackendError::Unauthorized { backend, .. }
            | BackendError::Rejected { backend, .. }
            | BackendError::MalformedResponse { backend, .. }
            | BackendError::Misconfigured { backend, .. } => Some(*backend),
            BackendError::LocalStorage { .. } | BackendError::CorruptDocument { .. } => {
                Some(BackendKind::Local)
            }
            BackendError::ImportValidation { .. } => None,
        }
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;
