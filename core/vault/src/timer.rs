//! Auto-lock timer.
//!
//! A single background task sleeps for the timeout and then reports the
//! generation it was armed for. Re-arming or cancelling aborts the previous
//! task, and the receiver discards deliveries for an outdated generation, so
//! at most one elapsed event can ever act.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Events raised by the vault machinery outside of a direct call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultEvent {
    /// The auto-lock timeout armed for `generation` has elapsed.
    AutoLockElapsed { generation: u64 },
}

pub struct AutoLockTimer {
    events: mpsc::UnboundedSender<VaultEvent>,
    task: Option<JoinHandle<()>>,
}

impl AutoLockTimer {
    /// Create a timer that delivers its events on the returned receiver.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<VaultEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events, task: None }, rx)
    }

    /// Start counting down for `generation`, replacing any running countdown.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self, generation: u64, timeout: Duration) {
        self.cancel();
        debug!("Arming auto-lock for generation {} ({:?})", generation, timeout);

        let events = self.events.clone();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // Receiver gone means the session is shutting down.
            let _ = events.send(VaultEvent::AutoLockElapsed { generation });
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether a countdown is still running.
    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for AutoLockTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_timeout() {
        let (mut timer, mut rx) = AutoLockTimer::new();
        timer.arm(3, Duration::from_secs(300));

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(rx.try_recv().is_err());

        assert_eq!(
            rx.recv().await,
            Some(VaultEvent::AutoLockElapsed { generation: 3 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_delivery() {
        let (mut timer, mut rx) = AutoLockTimer::new();
        timer.arm(1, Duration::from_secs(10));
        assert!(timer.is_armed());

        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_countdown() {
        let (mut timer, mut rx) = AutoLockTimer::new();
        timer.arm(1, Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(5)).await;
        timer.arm(2, Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(
            rx.try_recv(),
            Ok(VaultEvent::AutoLockElapsed { generation: 2 })
        );
        assert!(rx.try_recv().is_err());
    }
}
