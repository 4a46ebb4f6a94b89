//! Login and logout

use anyhow::{bail, Result};

use realog_core::{AdminSession, SyncOrchestrator};

use crate::editor::prompt_password;
use crate::output::Output;

/// Start an admin session
pub fn login(sync: &SyncOrchestrator, password: Option<String>, output: &Output) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt_password()?,
    };

    let session = AdminSession::new(sync.data_dir());
    if !session.login(sync.settings(), &password)? {
        bail!("Incorrect password");
    }

    match session.expires_at() {
        Some(expiry) => output.success(&format!(
            "Logged in until {}",
            expiry.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        )),
        None => output.success("Logged in"),
    }
    Ok(())
}

/// End the admin session
pub fn logout(sync: &SyncOrchestrator, output: &Output) -> Result<()> {
    AdminSession::new(sync.data_dir()).logout()?;
    output.success("Logged out");
    Ok(())
}
