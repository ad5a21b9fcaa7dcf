//! # Sync Poller
//!
//! Periodic revalidation of server-authoritative state.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Poller Loop                                    │
//! │                                                                         │
//! │   spawn ──► wait one period ──► tick ──► target.poll().await            │
//! │                                  ▲             │                        │
//! │                                  │   Continue  │  Err: warn, retry      │
//! │                                  └─────────────┤       next tick        │
//! │                                                │                        │
//! │                                          Stop  ▼                        │
//! │   handle.stop() / handle dropped ──────────► exit                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//! - Requests never overlap: a tick awaits the previous poll, and ticks
//!   missed while it ran are skipped rather than fired in a burst.
//! - `Stop` ends the loop before the next tick.
//! - Errors are logged and never surfaced; the next tick retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::SyncResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Continue,
    Stop,
}

/// Something a [`SyncPoller`] re-fetches on every tick.
#[async_trait]
pub trait PollTarget: Send + Sync + 'static {
    /// Name used in log fields.
    fn name(&self) -> &'static str;

    async fn poll(&self) -> SyncResult<PollOutcome>;
}

/// Spawns poll loops onto the current tokio runtime.
pub struct SyncPoller;

impl SyncPoller {
    /// Starts polling `target` every `period`. The first poll happens one
    /// period from now, since callers load the initial state themselves.
    pub fn spawn<T: PollTarget>(target: T, period: Duration) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let running = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(Self::run(target, period, shutdown_rx, running.clone()));

        PollerHandle {
            shutdown_tx,
            running,
            task: Some(task),
        }
    }

    async fn run<T: PollTarget>(
        target: T,
        period: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
        running: Arc<AtomicBool>,
    ) {
        let poller = target.name();
        info!(poller, period_secs = period.as_secs(), "Poller starting");

        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                // Explicit stop, or every handle dropped
                _ = shutdown_rx.recv() => {
                    info!(poller, "Poller shutting down");
                    break;
                }

                _ = interval.tick() => {
                    match target.poll().await {
                        Ok(PollOutcome::Continue) => debug!(poller, "Poll succeeded"),
                        Ok(PollOutcome::Stop) => {
                            info!(poller, "Poll target finished");
                            break;
                        }
                        Err(e) => warn!(
                            poller,
                            error = %e,
                            retryable = e.is_retryable(),
                            "Poll failed, retrying next tick"
                        ),
                    }
                }
            }
        }

        running.store(false, Ordering::Release);
        info!(poller, "Poller stopped");
    }
}

/// Controls a running poller. Dropping the handle stops the loop.
pub struct PollerHandle {
    shutdown_tx: mpsc::Sender<()>,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Asks the loop to exit. A poll already in flight runs to completion.
    pub fn stop(&self) {
        // Full channel means a stop is already queued.
        let _ = self.shutdown_tx.try_send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops the loop and waits for the task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Poller task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, SyncError};
    use std::sync::atomic::AtomicUsize;

    /// Counts polls; stops after `stop_after` and fails on `fail_on`.
    struct Counter {
        polls: Arc<AtomicUsize>,
        stop_after: usize,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl PollTarget for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn poll(&self) -> SyncResult<PollOutcome> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(n) == self.fail_on {
                return Err(SyncError::Api(ApiError::Timeout));
            }
            Ok(if n >= self.stop_after {
                PollOutcome::Stop
            } else {
                PollOutcome::Continue
            })
        }
    }

    fn counter(stop_after: usize, fail_on: Option<usize>) -> (Counter, Arc<AtomicUsize>) {
        let polls = Arc::new(AtomicUsize::new(0));
        let target = Counter {
            polls: polls.clone(),
            stop_after,
            fail_on,
        };
        (target, polls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_after_one_period() {
        let (target, polls) = counter(usize::MAX, None);
        let handle = SyncPoller::spawn(target, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert!(handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_outcome_ends_loop() {
        let (target, polls) = counter(2, None);
        let handle = SyncPoller::spawn(target, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert!(!handle.is_running());

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_retries_next_tick() {
        let (target, polls) = counter(3, Some(1));
        let handle = SyncPoller::spawn(target, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 1);
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert!(!handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_stop_and_drop() {
        let (target, polls) = counter(usize::MAX, None);
        let handle = SyncPoller::spawn(target, Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(31)).await;
        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 1);

        let (target, polls) = counter(usize::MAX, None);
        let handle = SyncPoller::spawn(target, Duration::from_secs(30));
        let running = handle.running.clone();
        drop(handle);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 0);
        assert!(!running.load(Ordering::Acquire));
    }
}
