//! Cancellable delayed task
//!
//! Each [`Debouncer::schedule`] call supersedes the previous one. A task
//! only runs if it is still the armed one when its delay expires; once it
//! has started it is never cancelled, so a write that reached the network
//! always completes and reports.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

const DISARMED: u64 = 0;

/// Handle owning at most one armed delayed task
#[derive(Debug)]
pub struct Debouncer {
    /// Generation of the armed task, or `DISARMED`
    armed: Arc<AtomicU64>,
    next_generation: u64,
    current: Option<(JoinHandle<()>, Arc<Notify>)>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl Debouncer {
    pub fn new() -> Self {
        Self {
            armed: Arc::new(AtomicU64::new(DISARMED)),
            next_generation: DISARMED,
            current: None,
        }
    }

    /// Run `task` after `delay` unless superseded or cancelled first
    pub fn schedule<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.armed.store(generation, Ordering::SeqCst);

        let armed = self.armed.clone();
        let fire_now = Arc::new(Notify::new());
        let trigger = fire_now.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = trigger.notified() => {}
            }
            if armed
                .compare_exchange(generation, DISARMED, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                task.await;
            }
        });

        self.current = Some((handle, fire_now));
    }

    /// Drop the armed task if it has not started yet
    pub fn cancel(&mut self) {
        self.armed.store(DISARMED, Ordering::SeqCst);
    }

    /// Whether a scheduled task is still waiting for its delay
    pub fn has_pending(&self) -> bool {
        self.armed.load(Ordering::SeqCst) != DISARMED
    }

    /// Fire the armed task now and wait for the most recent task to finish
    pub async fn flush(&mut self) {
        if let Some((handle, fire_now)) = self.current.take() {
            fire_now.notify_one();
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_task(counter: &Arc<AtomicUsize>, value: usize) -> impl Future<Output = ()> {
        let counter = counter.clone();
        async move {
            counter.store(value, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_latest_schedule_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new();

        for value in 1..=3 {
            let runs = runs.clone();
            let fired = fired.clone();
            debouncer.schedule(Duration::from_millis(1000), async move {
                runs.fetch_add(1, Ordering::SeqCst);
                fired.store(value, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(debouncer.has_pending());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert!(!debouncer.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_task() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new();

        debouncer.schedule(Duration::from_millis(500), counter_task(&fired, 7));
        debouncer.cancel();
        assert!(!debouncer.has_pending());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_runs_pending_task_immediately() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new();

        debouncer.schedule(Duration::from_secs(60), counter_task(&fired, 9));
        let start = tokio::time::Instant::now();
        debouncer.flush().await;

        assert_eq!(fired.load(Ordering::SeqCst), 9);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!debouncer.has_pending());
    }

    #[tokio::test]
    async fn test_flush_without_pending_is_noop() {
        let mut debouncer = Debouncer::default();
        debouncer.flush().await;
        assert!(!debouncer.has_pending());
    }
}
