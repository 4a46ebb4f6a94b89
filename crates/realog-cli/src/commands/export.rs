//! Export command handler

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use realog_core::{export, DateRange, ExportFormat, SyncOrchestrator};

use super::is_admin;
use crate::output::{Output, OutputFormat};

/// Export entries to a file, or to stdout when `out` is `-`
pub fn run(
    sync: &SyncOrchestrator,
    format: ExportFormat,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    include_private: bool,
    out: Option<PathBuf>,
    output: &Output,
) -> Result<()> {
    if include_private && !is_admin(sync) {
        bail!("Exporting private entries needs an admin session. Log in with:\n  realog login");
    }

    let range = DateRange::from_dates(from, to);
    let file = export(sync.document(), format, range, include_private)
        .context("Failed to render export")?;

    if out.as_deref().is_some_and(|p| p.as_os_str() == "-") {
        print!("{}", file.contents);
        return Ok(());
    }

    let dir = match out {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let path = file.write_to(&dir)?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "path": path,
                    "format": format.extension(),
                    "mime": file.mime
                })
            );
        }
        OutputFormat::Quiet => println!("{}", path.display()),
        OutputFormat::Human => println!("✓ Exported to {}", path.display()),
    }
    Ok(())
}
