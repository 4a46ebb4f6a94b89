//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/realog/config.toml)
//! 3. Environment variables (REALOG_* prefix)
//!
//! Environment variables take precedence over config file values. Settings
//! that belong to the journal itself (theme, cloud endpoint, password) live
//! in the synced document, not here.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::server::DEFAULT_SERVER_URL;
use crate::backend::BackendKind;
use crate::sync::{StartupOptions, MIN_CLOUD_DEBOUNCE, MIN_SERVER_DEBOUNCE};

/// Environment variable prefix
const ENV_PREFIX: &str = "REALOG";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the local document, session and log
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the self-hosted API
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Probe the server at startup
    #[serde(default = "default_true")]
    pub server_probe: bool,

    /// Delay before a server write, in milliseconds (minimum 1000)
    #[serde(default = "default_server_debounce_ms")]
    pub server_debounce_ms: u64,

    /// Delay before a cloud write, in milliseconds (minimum 2000)
    #[serde(default = "default_cloud_debounce_ms")]
    pub cloud_debounce_ms: u64,

    /// HTTP request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Log file (defaults to `<data_dir>/realog.log`)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Backend chosen with `backend switch`; unset means auto-detect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            server_url: default_server_url(),
            server_probe: true,
            server_debounce_ms: default_server_debounce_ms(),
            cloud_debounce_ms: default_cloud_debounce_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            log_file: None,
            log_level: None,
            backend: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (REALOG_DATA_DIR, REALOG_SERVER_URL, ...)
    /// 2. Config file (~/.config/realog/config.toml or REALOG_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        let var = |name: &str| std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok();

        if let Some(val) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }

        if let Some(val) = var("SERVER_URL") {
            self.server_url = if val.is_empty() {
                default_server_url()
            } else {
                val
            };
        }

        if let Some(val) = var("SERVER_PROBE") {
            self.server_probe = parse_bool(&val);
        }

        // Unparseable numbers are ignored
        if let Some(ms) = var("SERVER_DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
            self.server_debounce_ms = ms;
        }
        if let Some(ms) = var("CLOUD_DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
            self.cloud_debounce_ms = ms;
        }
        if let Some(secs) = var("REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = secs;
        }

        if let Some(val) = var("LOG_FILE") {
            self.log_file = if val.is_empty() { None } else { Some(PathBuf::from(val)) };
        }
        if let Some(val) = var("LOG_LEVEL") {
            self.log_level = if val.is_empty() { None } else { Some(val) };
        }
        if let Some(val) = var("BACKEND") {
            // Unknown names fall back to auto-detect
            self.backend = val.parse().ok();
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path())
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Set a value by key, as typed on the command line
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let number = |v: &str| -> Result<u64> {
            v.parse()
                .with_context(|| format!("'{}' expects a whole number, got '{}'", key, v))
        };

        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "server_url" => self.server_url = value.to_string(),
            "server_probe" => self.server_probe = parse_bool(value),
            "server_debounce_ms" => self.server_debounce_ms = number(value)?,
            "cloud_debounce_ms" => self.cloud_debounce_ms = number(value)?,
            "request_timeout_secs" => self.request_timeout_secs = number(value)?,
            "log_file" => {
                self.log_file = Some(value)
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
            }
            "log_level" => {
                self.log_level = Some(value)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            }
            "backend" => {
                self.backend = match value.trim() {
                    "" | "auto" => None,
                    name => Some(name.parse().map_err(anyhow::Error::msg)?),
                }
            }
            other => bail!(
                "Unknown config key '{}'. Valid keys: data_dir, server_url, server_probe, \
                 server_debounce_ms, cloud_debounce_ms, request_timeout_secs, log_file, \
                 log_level, backend",
                other
            ),
        }
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with REALOG_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("realog")
            .join("config.toml")
    }

    /// Get the path to the log file
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("realog.log"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Orchestrator options derived from this config
    pub fn startup_options(&self) -> StartupOptions {
        StartupOptions {
            probe_server: self.server_probe,
            preferred: self.backend,
            server_debounce: Duration::from_millis(self.server_debounce_ms),
            cloud_debounce: Duration::from_millis(self.cloud_debounce_ms),
        }
    }
}

fn parse_bool(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("realog")
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_server_debounce_ms() -> u64 {
    MIN_SERVER_DEBOUNCE.as_millis() as u64
}

fn default_cloud_debounce_ms() -> u64 {
    MIN_CLOUD_DEBOUNCE.as_millis() as u64
}

fn default_request_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "REALOG_DATA_DIR",
        "REALOG_SERVER_URL",
        "REALOG_SERVER_PROBE",
        "REALOG_SERVER_DEBOUNCE_MS",
        "REALOG_CLOUD_DEBOUNCE_MS",
        "REALOG_REQUEST_TIMEOUT_SECS",
        "REALOG_LOG_FILE",
        "REALOG_LOG_LEVEL",
        "REALOG_BACKEND",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.server_probe);
        assert_eq!(config.server_url, "http://localhost:8080/api");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.data_dir.ends_with("realog"));
        assert!(config.log_path().ends_with("realog.log"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("REALOG_DATA_DIR", "/tmp/realog-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/realog-test"));
    }

    #[test]
    fn test_env_override_server() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("REALOG_SERVER_URL", "https://journal.example.com/api");
        env::set_var("REALOG_SERVER_PROBE", "false");
        env::set_var("REALOG_SERVER_DEBOUNCE_MS", "2500");
        config.apply_env_overrides();
        assert_eq!(config.server_url, "https://journal.example.com/api");
        assert!(!config.server_probe);
        assert_eq!(config.server_debounce_ms, 2500);

        // Empty string restores the default URL, garbage numbers are ignored
        env::set_var("REALOG_SERVER_URL", "");
        env::set_var("REALOG_SERVER_DEBOUNCE_MS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.server_debounce_ms, 2500);
    }

    #[test]
    fn test_env_override_logging() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("REALOG_LOG_FILE", "/var/log/realog.log");
        env::set_var("REALOG_LOG_LEVEL", "debug");
        config.apply_env_overrides();

        assert_eq!(config.log_path(), PathBuf::from("/var/log/realog.log"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/realog"),
            server_url: "http://nas.local/api".to_string(),
            server_probe: false,
            log_level: Some("info".to_string()),
            ..Default::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("server_url"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            server_url = "http://example.com/api"
            cloud_debounce_ms = 500
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.server_url, "http://example.com/api");
        // Clamped by the orchestrator, not here
        assert_eq!(config.cloud_debounce_ms, 500);
        assert_eq!(
            config.startup_options().debounce_for(BackendKind::Cloud),
            MIN_CLOUD_DEBOUNCE
        );
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("REALOG_DATA_DIR", temp_dir.path().join("data"));

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        // Should return defaults when file doesn't exist
        assert!(config.server_probe);
        assert!(config.data_dir.exists());
    }

    #[test]
    fn test_set_and_save() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config
            .set("data_dir", temp_dir.path().join("data").to_str().unwrap())
            .unwrap();
        config.set("server_url", "http://10.0.0.2/api").unwrap();
        config.set("request_timeout_secs", "3").unwrap();
        config.set("log_file", "").unwrap();
        assert!(config.set("request_timeout_secs", "three").is_err());
        assert!(config.set("colour", "blue").is_err());

        config.save_to(&path).unwrap();
        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.server_url, "http://10.0.0.2/api");
        assert_eq!(loaded.request_timeout_secs, 3);
        assert!(loaded.log_file.is_none());
    }

    #[test]
    fn test_backend_choice_persists() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config {
            data_dir: temp_dir.path().join("data"),
            ..Default::default()
        };
        config.set("backend", "Cloud").unwrap();
        assert!(config.set("backend", "ftp").is_err());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.backend, Some(BackendKind::Cloud));
        assert_eq!(loaded.startup_options().preferred, Some(BackendKind::Cloud));

        config.set("backend", "auto").unwrap();
        assert!(config.backend.is_none());
        assert!(!toml::to_string_pretty(&config).unwrap().contains("backend"));

        env::set_var("REALOG_BACKEND", "local");
        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.backend, Some(BackendKind::Local));
    }
}
