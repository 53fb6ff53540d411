//! Shutdown coordination and connection draining.
//!
//! [`ShutdownSignal`] is a cloneable latch: once triggered it stays
//! triggered, and every waiter (current or future) is released.
//! [`ConnectionTracker`] counts open connections so the server can wait
//! for them to drain before exiting.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

/// A one-way shutdown latch shared by the accept loop and connections.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    state: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Creates a signal triggered by SIGINT or SIGTERM.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            wait_for_os_signal().await;
            trigger.trigger();
        });
        signal
    }

    /// Triggers shutdown. Idempotent.
    pub fn trigger(&self) {
        self.state.send_replace(true);
    }

    /// Returns `true` once triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.state.borrow()
    }

    /// Completes when shutdown is triggered, immediately if it already was.
    pub async fn wait(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = receiver.wait_for(|triggered| *triggered).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!(signal = "SIGTERM", "shutdown requested"),
                    _ = sigint.recv() => info!(signal = "SIGINT", "shutdown requested"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "failed to install unix signal handlers, falling back to ctrl-c");
            }
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(signal = "ctrl-c", "shutdown requested"),
        Err(e) => {
            error!(error = %e, "failed to listen for ctrl-c; shutdown must be triggered explicitly");
            std::future::pending::<()>().await;
        }
    }
}

/// Counts live connections.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<watch::Sender<usize>>,
}

impl ConnectionTracker {
    /// Creates a tracker with no connections.
    #[must_use]
    pub fn new() -> Self {
        let (active, _) = watch::channel(0);
        Self {
            active: Arc::new(active),
        }
    }

    /// Registers a connection; it stays counted until the guard drops.
    #[must_use]
    pub fn track(&self) -> ConnectionGuard {
        self.active.send_modify(|count| *count += 1);
        ConnectionGuard {
            active: Arc::clone(&self.active),
        }
    }

    /// Number of live connections.
    #[must_use]
    pub fn active(&self) -> usize {
        *self.active.borrow()
    }

    /// Completes once every connection has closed.
    pub async fn drained(&self) {
        let mut receiver = self.active.subscribe();
        let _ = receiver.wait_for(|count| *count == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a connection counted while alive.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<watch::Sender<usize>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|count| *count = count.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_signal_starts_untriggered() {
        assert!(!ShutdownSignal::new().is_shutdown());
    }

    #[test]
    fn test_trigger_is_shared_and_idempotent() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        signal.trigger();
        signal.trigger();
        assert!(clone.is_shutdown());
    }

    #[test]
    fn test_wait_releases_on_trigger() {
        let signal = ShutdownSignal::new();
        let mut waiter = task::spawn(signal.wait());
        assert_pending!(waiter.poll());

        signal.trigger();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn test_wait_after_trigger_is_immediate() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        let mut waiter = task::spawn(signal.wait());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn test_tracker_counts_guards() {
        let tracker = ConnectionTracker::new();
        let a = tracker.track();
        let b = tracker.track();
        assert_eq!(tracker.active(), 2);
        drop(a);
        assert_eq!(tracker.active(), 1);
        drop(b);
        assert_eq!(tracker.active(), 0);
    }

    #[test]
    fn test_drained_waits_for_last_guard() {
        let tracker = ConnectionTracker::new();
        let guard = tracker.track();

        let mut drained = task::spawn(tracker.drained());
        assert_pending!(drained.poll());

        drop(guard);
        assert!(drained.is_woken());
        assert_ready!(drained.poll());
    }

    #[test]
    fn test_drained_with_no_connections() {
        let tracker = ConnectionTracker::new();
        let mut drained = task::spawn(tracker.drained());
        assert_ready!(drained.poll());
    }
}
