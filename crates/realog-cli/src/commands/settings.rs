//! Journal settings command handlers
//!
//! These settings live in the journal document and sync with it, unlike
//! the program config handled by `config`.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use realog_core::models::{CloudConfig, PublicConfig, Theme, ViewMode};
use realog_core::{AppSettings, Category, SyncOrchestrator};

use super::require_admin;
use crate::output::{print_json, Output, OutputFormat};

const MASK: &str = "********";

const VALID_KEYS: &str = "userName, adminPassword, openWeatherMapKey, theme, moods, \
     cloud.enabled, cloud.url, cloud.apiKey, public.showAtlas, public.showGallery, \
     <category>.viewMode, <category>.includeDaily, <category>.includeWeekly, \
     <category>.includeMonthly";

/// Show the journal settings with secrets masked
pub fn show(sync: &SyncOrchestrator, output: &Output) -> Result<()> {
    let masked = masked_settings(sync.settings())?;

    match output.format {
        OutputFormat::Quiet => {
            println!("{}", sync.settings().app_name());
        }
        OutputFormat::Json | OutputFormat::Human => print_json(&masked),
    }
    Ok(())
}

/// Set one journal setting
pub fn set(sync: &mut SyncOrchestrator, key: String, value: String, output: &Output) -> Result<()> {
    require_admin(sync)?;

    let mut updated = sync.settings().clone();
    apply_setting(&mut updated, &key, &value)?;
    sync.update_settings(|settings| *settings = updated);

    let shown = if is_secret(&key) { MASK } else { value.as_str() };
    output.success(&format!("Set {} = {}", key, shown));
    Ok(())
}

fn is_secret(key: &str) -> bool {
    matches!(key, "adminPassword" | "openWeatherMapKey" | "cloud.apiKey")
}

fn masked_settings(settings: &AppSettings) -> Result<Value> {
    let mut value = serde_json::to_value(settings).context("Failed to serialize settings")?;
    for pointer in ["/adminPassword", "/openWeatherMapKey", "/cloud/apiKey"] {
        if let Some(secret) = value.pointer_mut(pointer) {
            *secret = Value::String(MASK.to_string());
        }
    }
    Ok(value)
}

/// Apply `key = value` to `settings`
///
/// An empty value clears optional text settings.
fn apply_setting(settings: &mut AppSettings, key: &str, value: &str) -> Result<()> {
    let text = || Some(value.trim().to_string()).filter(|v| !v.is_empty());

    match key {
        "userName" => settings.user_name = text(),
        "adminPassword" => settings.admin_password = text(),
        "openWeatherMapKey" => settings.open_weather_map_key = text(),
        "theme" => settings.theme = text().map(Theme::from),
        "moods" => {
            let moods: Vec<String> = value
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            settings.moods = if moods.is_empty() { None } else { Some(moods) };
        }
        "cloud.enabled" => cloud(settings).enabled = parse_flag(key, value)?,
        "cloud.url" => cloud(settings).url = text(),
        "cloud.apiKey" => cloud(settings).api_key = text(),
        "public.showAtlas" => public(settings).show_atlas = parse_flag(key, value)?,
        "public.showGallery" => public(settings).show_gallery = parse_flag(key, value)?,
        _ => return apply_category_setting(settings, key, value),
    }
    Ok(())
}

fn apply_category_setting(settings: &mut AppSettings, key: &str, value: &str) -> Result<()> {
    let Some((category, field)) = key.split_once('.') else {
        bail!("Unknown setting '{}'. Valid keys: {}", key, VALID_KEYS);
    };
    let category: Category = category
        .parse()
        .map_err(|e: String| anyhow::anyhow!("Unknown setting '{}': {}", key, e))?;

    let config = settings.category_config_mut(category);
    match field {
        "viewMode" => {
            config.view_mode = value
                .parse::<ViewMode>()
                .map_err(anyhow::Error::msg)?
        }
        "includeDaily" => config.include_daily = parse_flag(key, value)?,
        "includeWeekly" => config.include_weekly = parse_flag(key, value)?,
        "includeMonthly" => config.include_monthly = parse_flag(key, value)?,
        _ => bail!("Unknown setting '{}'. Valid keys: {}", key, VALID_KEYS),
    }
    Ok(())
}

fn cloud(settings: &mut AppSettings) -> &mut CloudConfig {
    settings.cloud.get_or_insert_with(CloudConfig::default)
}

fn public(settings: &mut AppSettings) -> &mut PublicConfig {
    settings.public_config.get_or_insert_with(PublicConfig::default)
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("Invalid value for {}. Use 'true' or 'false'.", key),
    }
}
