use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::api::JobApi;
use super::error::ClientError;
use super::observer::{JobObserver, ProgressUpdate};
use super::{CompletedRun, JobHandle};
use crate::protocol::{RunStatus, StatusResponse};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_POLLS: u32 = 300;

/// Polling cadence and budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

/// Lifecycle of a polled job as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Running)
    }
}

/// Watches one job until it finishes, fails, times out or is cancelled
///
/// Status requests are issued one at a time: the next tick is only taken
/// after the previous request resolved, and late ticks are delayed rather
/// than fired in a burst. A failed request does not change the state; it
/// is logged and retried on the next tick.
pub struct Poller<'a, A, O> {
    api: &'a A,
    observer: &'a O,
    config: PollerConfig,
    cancel: CancellationToken,
    state: PollState,
    attempts: u32,
}

impl<'a, A: JobApi, O: JobObserver> Poller<'a, A, O> {
    pub fn new(api: &'a A, observer: &'a O, config: PollerConfig) -> Self {
        Self {
            api,
            observer,
            config,
            cancel: CancellationToken::new(),
            state: PollState::Running,
            attempts: 0,
        }
    }

    /// Stop polling when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Number of status requests issued so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Poll `handle` until a terminal state is reached
    pub async fn poll(&mut self, handle: &JobHandle) -> Result<CompletedRun, ClientError> {
        let api = self.api;
        let cancel = self.cancel.clone();
        let period = self.config.interval;

        self.state = PollState::Running;
        self.attempts = 0;

        if period.is_zero() {
            return Err(self.reject_config(handle));
        }

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.attempts >= self.config.max_polls {
                return Err(self.time_out(handle));
            }

            let ticked = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                _ = ticker.tick() => true,
            };
            if !ticked {
                return Err(self.stop_cancelled(handle));
            }

            self.attempts += 1;
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                response = api.job_status(handle) => Some(response),
            };
            let Some(response) = response else {
                return Err(self.stop_cancelled(handle));
            };

            match response {
                Ok(status) => {
                    let reported = status.status;
                    debug!(
                        "Status for run {} (attempt {}): {:?}",
                        handle.run_id(),
                        self.attempts,
                        reported
                    );
                    match reported {
                        RunStatus::Running => self.observer.progress(&ProgressUpdate {
                            percentage: status.progress,
                            current_table: status.current_table,
                        }),
                        RunStatus::Completed => return Ok(self.complete(handle, status)),
                        RunStatus::Failed => return Err(self.fail(status)),
                        RunStatus::Unknown => {
                            warn!("Unexpected status for run {}", handle.run_id());
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        "Error checking validation status for run {} (attempt {}): {}",
                        handle.run_id(),
                        self.attempts,
                        err
                    );
                }
            }
        }
    }

    fn transition(&mut self, next: PollState) {
        debug!("Poller state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn complete(&mut self, handle: &JobHandle, status: StatusResponse) -> CompletedRun {
        self.transition(PollState::Completed);
        self.observer.progress_hidden();

        let run = CompletedRun {
            run_id: handle.run_id().to_string(),
            results: status.results.unwrap_or_default(),
            report_data: status.report_data,
            report_id: status.report_id,
        };
        info!(
            "Run {} completed with {} table results",
            run.run_id,
            run.results.len()
        );
        self.observer.completed(&run);
        run
    }

    fn fail(&mut self, status: StatusResponse) -> ClientError {
        self.transition(PollState::Failed);
        self.observer.progress_hidden();

        let err = ClientError::JobFailed(status.error.unwrap_or_else(|| "Unknown error".to_string()));
        error!("{}", err);
        self.observer.error(&err);
        err
    }

    fn time_out(&mut self, handle: &JobHandle) -> ClientError {
        self.transition(PollState::TimedOut);
        self.observer.progress_hidden();

        let err = ClientError::Timeout {
            polls: self.attempts,
        };
        error!("Run {}: {}", handle.run_id(), err);
        self.observer.error(&err);
        err
    }

    fn reject_config(&mut self, handle: &JobHandle) -> ClientError {
        self.transition(PollState::Failed);
        self.observer.progress_hidden();

        let err = ClientError::Validation("Poll interval must be greater than zero".to_string());
        error!("Run {}: {}", handle.run_id(), err);
        self.observer.error(&err);
        err
    }

    fn stop_cancelled(&mut self, handle: &JobHandle) -> ClientError {
        self.transition(PollState::Cancelled);
        self.observer.progress_hidden();
        info!(
            "Stopped polling run {} after {} attempts",
            handle.run_id(),
            self.attempts
        );
        ClientError::Cancelled
    }
}
