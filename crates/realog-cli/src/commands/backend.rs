//! Backend command handlers

use std::path::Path;

use anyhow::{Context, Result};

use realog_core::{BackendKind, SyncOrchestrator};

use super::require_admin;
use crate::output::Output;

/// Show the active backend and sync status
pub fn show(sync: &SyncOrchestrator, output: &Output) -> Result<()> {
    output.print_sync(&sync.snapshot());
    Ok(())
}

/// Make another backend authoritative and remember the choice
///
/// The target is probed and loaded first; on failure nothing changes and
/// the stored choice is kept.
pub async fn switch(
    sync: &mut SyncOrchestrator,
    kind: BackendKind,
    config_path: Option<&Path>,
    output: &Output,
) -> Result<()> {
    require_admin(sync)?;

    let already = sync.active_backend() == kind;
    if !already {
        sync.switch_backend(kind)
            .await
            .with_context(|| format!("Could not switch to the {} backend", kind))?;
    }
    super::config::remember_backend(config_path, kind)?;

    if already {
        output.message(&format!("Already using the {} backend.", kind));
        return Ok(());
    }

    output.success(&format!(
        "Now using the {} backend ({} entries)",
        kind,
        sync.document().entries.len()
    ));
    Ok(())
}
