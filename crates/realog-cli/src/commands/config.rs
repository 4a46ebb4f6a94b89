//! Config command handlers

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use realog_core::{BackendKind, Config};

use crate::output::{Output, OutputFormat};

/// Load config from `--config` when given, else the default location
pub fn load(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")
}

pub fn effective_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_file_path)
}

/// Show current configuration
pub fn show(config_path: Option<&Path>, output: &Output) -> Result<()> {
    let config = load(config_path)?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "server_url": config.server_url,
                    "server_probe": config.server_probe,
                    "server_debounce_ms": config.server_debounce_ms,
                    "cloud_debounce_ms": config.cloud_debounce_ms,
                    "request_timeout_secs": config.request_timeout_secs,
                    "log_file": config.log_path(),
                    "log_level": config.log_level,
                    "backend": config.backend
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:             {}", config.data_dir.display());
            println!("  server_url:           {}", config.server_url);
            println!("  server_probe:         {}", config.server_probe);
            println!("  server_debounce_ms:   {}", config.server_debounce_ms);
            println!("  cloud_debounce_ms:    {}", config.cloud_debounce_ms);
            println!("  request_timeout_secs: {}", config.request_timeout_secs);
            println!("  log_file:             {}", config.log_path().display());
            println!(
                "  log_level:            {}",
                config.log_level.as_deref().unwrap_or("(default)")
            );
            println!(
                "  backend:              {}",
                config
                    .backend
                    .map(|kind| kind.to_string())
                    .unwrap_or_else(|| "(auto)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path(config_path).display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, config_path: Option<&Path>, output: &Output) -> Result<()> {
    let mut config = load(config_path)?;
    config.set(&key, &value)?;

    config
        .save_to(&effective_path(config_path))
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Store the chosen backend so the next run starts on it
pub fn remember_backend(config_path: Option<&Path>, kind: BackendKind) -> Result<()> {
    let path = effective_path(config_path);
    let mut config = load(Some(&path))?;
    config.backend = Some(kind);
    config
        .save_to(&path)
        .context("Failed to save configuration")
}
