//! Backend selection and synchronization
//!
//! ## Policy
//!
//! 1. The local file always holds the latest edit
//! 2. At startup an online server wins, then an enabled cloud, else local,
//!    unless a preferred backend is configured
//! 3. Remote writes are debounced and carry the whole document
//! 4. Failures never roll back the in-memory document
//!
//! ## Usage
//!
//! ```ignore
//! let mut sync = SyncOrchestrator::start(local, factory, StartupOptions::default()).await?;
//! sync.save_entry(entry);
//! sync.flush().await;
//! ```

mod debounce;
mod orchestrator;
mod status;

pub use debounce::Debouncer;
pub use orchestrator::{
    image_mime, BackendFactory, HttpBackendFactory, StartupOptions, SyncOrchestrator,
    MIN_CLOUD_DEBOUNCE, MIN_SERVER_DEBOUNCE,
};
pub use status::{StatusReporter, SyncEvent, SyncSnapshot, SyncStatus, SUCCESS_DISPLAY};
