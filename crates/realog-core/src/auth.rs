//! Admin session
//!
//! There is a single admin identified by one shared password: the
//! `adminPassword` setting, or a built-in default when unset. A successful
//! login leaves a `session.json` in the data directory that stays valid for
//! 30 days. Visitors without a session never see private entries.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::AppSettings;

/// Password used when the settings do not set one
pub const DEFAULT_ADMIN_PASSWORD: &str = "grind";

/// How long a login stays valid
pub const SESSION_DAYS: i64 = 30;

const SESSION_FILE: &str = "session.json";

/// Check `input` against the configured admin password
pub fn verify_password(settings: &AppSettings, input: &str) -> bool {
    let expected = settings
        .admin_password
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_ADMIN_PASSWORD);
    input == expected
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionFile {
    expires_at: DateTime<Utc>,
}

/// Persisted admin login
#[derive(Debug, Clone)]
pub struct AdminSession {
    path: PathBuf,
}

impl AdminSession {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SESSION_FILE),
        }
    }

    /// Start a session if `password` is correct
    ///
    /// Returns whether the login succeeded.
    pub fn login(&self, settings: &AppSettings, password: &str) -> Result<bool> {
        if !verify_password(settings, password) {
            debug!("Admin login rejected");
            return Ok(false);
        }

        let session = SessionFile {
            expires_at: Utc::now() + Duration::days(SESSION_DAYS),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {:?}", parent))?;
        }
        let json = serde_json::to_string(&session).context("Failed to serialize session")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write session file: {:?}", self.path))?;

        info!("Admin session started");
        Ok(true)
    }

    /// End the session; a missing session is not an error
    pub fn logout(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove session file: {:?}", self.path))?;
        }
        Ok(())
    }

    /// Expiry of the current session, if one is stored
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let json = fs::read_to_string(&self.path).ok()?;
        let session: SessionFile = serde_json::from_str(&json).ok()?;
        Some(session.expires_at)
    }

    /// Whether a valid, unexpired session exists
    pub fn is_active(&self) -> bool {
        self.expires_at().is_some_and(|expiry| expiry > Utc::now())
    }
}
