//! ReaLog Core Library
//!
//! This crate provides the core functionality for ReaLog, a single-admin
//! journal of daily, weekly, monthly and yearly entries that can live in a
//! local file, on a self-hosted server or in a cloud JSON blob.
//!
//! # Architecture
//!
//! - **Document**: the whole journal (`questions`, `entries`, `settings`)
//!   is read and written as one unit
//! - **Local file**: always written first, so edits survive any remote
//!   failure
//! - **Remote**: an online server or enabled cloud blob is authoritative on
//!   load and receives debounced full-document writes
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let factory = Arc::new(HttpBackendFactory { server_url, timeout });
//! let mut sync = SyncOrchestrator::start(LocalBackend::new(&config.data_dir), factory, config.startup_options()).await?;
//!
//! let mut entry = Entry::new(Category::Daily);
//! entry.set_response("d1", "Shipped the release");
//! sync.save_entry(entry);
//! sync.flush().await;
//! ```
//!
//! # Modules
//!
//! - `sync`: backend selection, debounced writes, status (main entry point)
//! - `backend`: local, server and cloud document stores
//! - `document`: the journal aggregate and settings merge
//! - `models`: entries, questions and settings
//! - `filter`: visible entries, search and navigation
//! - `export`: JSON, text, HTML and WordPress exports
//! - `wxr`: WordPress import
//! - `stats`: streaks, counts and "on this day"
//! - `auth`: admin password and session
//! - `config`: application configuration

pub mod auth;
pub mod backend;
pub mod config;
pub mod document;
pub mod export;
pub mod filter;
pub mod models;
pub mod stats;
pub mod sync;
pub mod wxr;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::AdminSession;
pub use backend::{Backend, BackendError, BackendKind, BackendResult, LocalBackend};
pub use config::Config;
pub use document::{merge_settings, Document};
pub use export::{export, DateRange, ExportFile, ExportFormat};
pub use filter::{navigate, visible_entries, Direction, GlobalView, ViewQuery};
pub use models::{AppSettings, Category, Entry, EntryMode, Question};
pub use stats::{journal_stats, on_this_day, streak_info, JournalStats, StreakInfo};
pub use sync::{HttpBackendFactory, StartupOptions, SyncOrchestrator, SyncSnapshot, SyncStatus};
pub use wxr::parse_wxr;
