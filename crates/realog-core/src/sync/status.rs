//! Sync status state machine
//!
//! The status shown to the user is driven by a small, closed set of events.
//! Acknowledgements and failures are accepted from any state and applied in
//! arrival order, so a late response can overwrite a newer one. That is
//! accepted behavior: the next write settles the status again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::backend::BackendKind;

/// How long a success indication stays visible
pub const SUCCESS_DISPLAY: Duration = Duration::from_secs(2);

/// User-visible sync status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
}

/// Things that happen to a sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// A write was sent to the remote
    Dispatched,
    /// The remote confirmed a write or load
    Acknowledged,
    /// A write or load failed
    Failed,
    /// The success display window ran out
    DisplayElapsed,
    /// The user dismissed the error
    Dismissed,
}

impl SyncStatus {
    /// Next status after `event`
    pub fn apply(self, event: SyncEvent) -> SyncStatus {
        use SyncEvent::*;
        use SyncStatus::*;

        match (self, event) {
            (_, Dispatched) => Syncing,
            (_, Acknowledged) => Success,
            (_, Failed) => Error,
            (Success, DisplayElapsed) => Idle,
            (Error, Dismissed) => Idle,
            (state, DisplayElapsed | Dismissed) => state,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "synced",
            SyncStatus::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Everything an observer needs to render the sync indicator
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub backend: BackendKind,
    pub status: SyncStatus,
    pub last_sync: Option<DateTime<Utc>>,
    /// Sticky until the next success or a dismissal
    pub last_error: Option<String>,
    /// Latest informational message (probe result, fallback reason)
    pub message: Option<String>,
}

/// Shared writer side of the status channel
///
/// Cloned into every spawned write task so completions can report back
/// without touching the orchestrator.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    tx: Arc<watch::Sender<SyncSnapshot>>,
    acks: Arc<AtomicU64>,
}

impl StatusReporter {
    pub fn new(backend: BackendKind) -> Self {
        let (tx, _rx) = watch::channel(SyncSnapshot {
            backend,
            ..Default::default()
        });
        Self {
            tx: Arc::new(tx),
            acks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.tx.borrow().clone()
    }

    pub fn set_backend(&self, backend: BackendKind) {
        self.tx.send_modify(|s| s.backend = backend);
    }

    pub fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|s| s.message = Some(message));
    }

    pub fn dispatched(&self) {
        self.apply(SyncEvent::Dispatched);
    }

    /// Record a success and start the display timer
    pub fn acknowledged(&self) {
        let generation = self.acks.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_modify(|s| {
            s.status = s.status.apply(SyncEvent::Acknowledged);
            s.last_sync = Some(Utc::now());
            s.last_error = None;
        });

        let reporter = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SUCCESS_DISPLAY).await;
            // A newer success restarts the window
            if reporter.acks.load(Ordering::SeqCst) == generation {
                reporter.apply(SyncEvent::DisplayElapsed);
            }
        });
    }

    pub fn failed(&self, error: impl Into<String>) {
        let error = error.into();
        self.tx.send_modify(|s| {
            s.status = s.status.apply(SyncEvent::Failed);
            s.last_error = Some(error);
        });
    }

    pub fn dismissed(&self) {
        self.tx.send_modify(|s| {
            s.status = s.status.apply(SyncEvent::Dismissed);
            if s.status == SyncStatus::Idle {
                s.last_error = None;
            }
        });
    }

    fn apply(&self, event: SyncEvent) {
        self.tx.send_modify(|s| s.status = s.status.apply(event));
    }
}
