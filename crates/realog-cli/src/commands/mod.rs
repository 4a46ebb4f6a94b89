//! Command handlers

use anyhow::{bail, Result};

use realog_core::{AdminSession, SyncOrchestrator};

pub mod auth;
pub mod backend;
pub mod config;
pub mod entry;
pub mod export;
pub mod import;
pub mod question;
pub mod settings;
pub mod stats;
pub mod status;

/// Whether an unexpired admin session exists for this journal
pub fn is_admin(sync: &SyncOrchestrator) -> bool {
    AdminSession::new(sync.data_dir()).is_active()
}

/// Fail unless logged in as admin
pub fn require_admin(sync: &SyncOrchestrator) -> Result<()> {
    if !is_admin(sync) {
        bail!("This command needs an admin session. Log in with:\n  realog login");
    }
    Ok(())
}
