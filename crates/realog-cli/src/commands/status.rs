//! Status command handler

use anyhow::Result;

use realog_core::{AdminSession, Config, SyncOrchestrator};

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(sync: &SyncOrchestrator, config: &Config, output: &Output) -> Result<()> {
    let snapshot = sync.snapshot();
    let document = sync.document();
    let session = AdminSession::new(sync.data_dir());
    let admin_until = session.expires_at().filter(|_| session.is_active());
    let cloud = sync.settings().cloud_config();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "app": sync.settings().app_name(),
                    "sync": snapshot,
                    "server_url": config.server_url,
                    "cloud": {
                        "enabled": cloud.enabled,
                        "url": cloud.url
                    },
                    "document": sync.local().path(),
                    "admin": admin_until.is_some(),
                    "admin_until": admin_until,
                    "counts": {
                        "entries": document.entries.len(),
                        "questions": document.questions.len()
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", snapshot.backend);
        }
        OutputFormat::Human => {
            let title = format!("{} Status", sync.settings().app_name());
            println!("{}", title);
            println!("{}", "=".repeat(title.chars().count()));
            println!();
            output.print_sync(&snapshot);
            println!();
            println!("Remotes:");
            println!("  Server: {}", config.server_url);
            match (cloud.enabled, cloud.url.as_deref()) {
                (true, Some(url)) => println!("  Cloud:  {}", url),
                (false, Some(url)) => println!("  Cloud:  {} (disabled)", url),
                _ => println!("  Cloud:  (not configured)"),
            }
            println!();
            println!("Storage:");
            println!("  Document: {}", sync.local().path().display());
            println!();
            println!("Session:");
            match admin_until {
                Some(expiry) => println!(
                    "  Admin until {}",
                    expiry.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
                ),
                None => println!("  Visitor (private entries hidden)"),
            }
            println!();
            println!("Contents:");
            println!("  Entries:   {}", document.entries.len());
            println!("  Questions: {}", document.questions.len());
        }
    }

    Ok(())
}
