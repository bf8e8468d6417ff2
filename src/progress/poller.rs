//! Cancellable periodic status task

use super::{PollStatus, PollerConfig, ProgressRecord, ProgressSink, StatusSource};
use crate::{Error, Result};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Lifecycle of a poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Complete,
    Failed,
    /// Stopped through [`PollerHandle::cancel`] or by dropping the handle
    Cancelled,
    /// Stopped after `max_consecutive_failures` failed requests
    GaveUp,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Polling)
    }
}

/// How a poller ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Complete { redirect: Option<String> },
    Failed { message: String },
    Cancelled,
    GaveUp { failures: u32 },
}

impl PollOutcome {
    fn state(&self) -> PollState {
        match self {
            PollOutcome::Complete { .. } => PollState::Complete,
            PollOutcome::Failed { .. } => PollState::Failed,
            PollOutcome::Cancelled => PollState::Cancelled,
            PollOutcome::GaveUp { .. } => PollState::GaveUp,
        }
    }
}

const DEFAULT_FAILURE_MESSAGE: &str = "Analysis failed";

struct Shared {
    stopped: AtomicBool,
    wake: Notify,
    requests: AtomicU64,
    state: watch::Sender<PollState>,
}

impl Shared {
    /// Flip the stop flag; true only for the caller that flipped it
    fn stop_once(&self) -> bool {
        let first = !self.stopped.swap(true, Ordering::SeqCst);
        if first {
            self.wake.notify_one();
        }
        first
    }
}

/// Periodic status poller
pub struct Poller<S, K> {
    source: S,
    sink: K,
    config: PollerConfig,
}

impl<S: StatusSource, K: ProgressSink> Poller<S, K> {
    pub fn new(source: S, sink: K, config: PollerConfig) -> Self {
        Self {
            source,
            sink,
            config,
        }
    }

    /// Start polling on the current tokio runtime.
    ///
    /// The first request goes out one interval after the call.
    pub fn spawn(self) -> PollerHandle {
        let (state_tx, state_rx) = watch::channel(PollState::Polling);
        let shared = Arc::new(Shared {
            stopped: AtomicBool::new(false),
            wake: Notify::new(),
            requests: AtomicU64::new(0),
            state: state_tx,
        });

        let task = tokio::spawn(self.run(shared.clone()));
        PollerHandle {
            shared,
            state: state_rx,
            task: Some(task),
        }
    }

    async fn run(self, shared: Arc<Shared>) -> PollOutcome {
        let outcome = self.poll_loop(&shared).await;
        shared.state.send_replace(outcome.state());
        info!("poller finished: {:?}", outcome);
        outcome
    }

    async fn poll_loop(&self, shared: &Shared) -> PollOutcome {
        let period = Duration::from_millis(self.config.interval_ms.max(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures: u32 = 0;

        loop {
            tokio::select! {
                _ = shared.wake.notified() => return PollOutcome::Cancelled,
                _ = ticker.tick() => {}
            }
            if shared.stopped.load(Ordering::SeqCst) {
                return PollOutcome::Cancelled;
            }

            shared.requests.fetch_add(1, Ordering::SeqCst);
            let result = tokio::select! {
                _ = shared.wake.notified() => return PollOutcome::Cancelled,
                r = self.source.fetch() => r,
            };

            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    failures += 1;
                    warn!("Error fetching progress ({} in a row): {}", failures, e);
                    if let Some(max) = self.config.max_consecutive_failures {
                        if failures >= max && shared.stop_once() {
                            return PollOutcome::GaveUp { failures };
                        }
                    }
                    continue;
                }
            };
            failures = 0;

            if let Some(outcome) = self.react(record, shared) {
                return outcome;
            }
        }
    }

    /// Apply one successful status; `Some` when polling must end
    fn react(&self, record: ProgressRecord, shared: &Shared) -> Option<PollOutcome> {
        match record.status {
            PollStatus::Running => {
                debug!("progress {}%", record.percentage);
                self.sink.progress(record.percentage);
                None
            }
            PollStatus::Complete => {
                if !shared.stop_once() {
                    return Some(PollOutcome::Cancelled);
                }
                self.sink.progress(record.percentage);
                let redirect = record
                    .redirect_target
                    .or_else(|| self.config.fallback_redirect.clone());
                match &redirect {
                    Some(target) => self.sink.navigate(target),
                    None => warn!("analysis complete but no redirect target was given"),
                }
                Some(PollOutcome::Complete { redirect })
            }
            PollStatus::Failed => {
                if !shared.stop_once() {
                    return Some(PollOutcome::Cancelled);
                }
                let message = record
                    .error_message
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                self.sink.alert(&message);
                Some(PollOutcome::Failed { message })
            }
        }
    }
}

/// Owned handle to a running poller; dropping it stops the poller
pub struct PollerHandle {
    shared: Arc<Shared>,
    state: watch::Receiver<PollState>,
    task: Option<JoinHandle<PollOutcome>>,
}

impl PollerHandle {
    /// Stop polling. Returns true if this call stopped it; false when it was
    /// already cancelled or had reached a terminal state.
    pub fn cancel(&self) -> bool {
        let first = self.shared.stop_once();
        if first {
            debug!("poller cancelled by caller");
        }
        first
    }

    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    /// Number of status requests issued so far
    pub fn requests(&self) -> u64 {
        self.shared.requests.load(Ordering::SeqCst)
    }

    /// Wait until the poller leaves `Polling`
    pub async fn wait_terminal(&mut self) -> PollState {
        match self.state.wait_for(|s| s.is_terminal()).await {
            Ok(s) => *s,
            Err(_) => PollState::Cancelled,
        }
    }

    /// Wait for the task to end and return how it ended
    pub async fn join(mut self) -> Result<PollOutcome> {
        let task = self
            .task
            .take()
            .ok_or_else(|| Error::Other("poller already joined".into()))?;
        task.await
            .map_err(|e| Error::Other(format!("poller task failed: {}", e)))
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shared.stop_once();
    }
}
