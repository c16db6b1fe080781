//! Job status polling.
//!
//! `JobStatusPoller` is a pure state machine fed with status responses;
//! `poll_until_terminal` drives it from a `PollTimer`. Queries are awaited
//! inside the loop, so a slow response delays the next tick instead of
//! overlapping with it.

use crate::engine::{AnalysisBackend, CancelHandle};
use crate::error::{JobFailedError, SessionError, TransientPollError};
use crate::model::{Job, JobStatus, JobStatusResponse, SessionEvent};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const UNKNOWN_FAILURE: &str = "unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Completed,
    Failed,
}

/// Outcome of feeding one status response to the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// Still running. `changed` is set when the status differs from the last one seen.
    Running { status: JobStatus, changed: bool },
    Completed { location: Option<String> },
    Failed(JobFailedError),
    /// The poller is not polling; the response was discarded.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct JobStatusPoller {
    job: Job,
    state: PollState,
}

impl JobStatusPoller {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            state: PollState::Idle,
        }
    }

    pub fn start(&mut self) {
        if self.state == PollState::Idle {
            self.state = PollState::Polling;
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, PollState::Completed | PollState::Failed)
    }

    pub fn observe(&mut self, resp: JobStatusResponse) -> PollStep {
        if self.state != PollState::Polling {
            return PollStep::Ignored;
        }
        let changed = resp.status != self.job.status;
        self.job.status = resp.status;
        match resp.status {
            JobStatus::Pending | JobStatus::Processing => PollStep::Running {
                status: resp.status,
                changed,
            },
            JobStatus::Completed => {
                self.state = PollState::Completed;
                self.job.result_location = resp.result_url.clone();
                PollStep::Completed {
                    location: resp.result_url,
                }
            }
            JobStatus::Failed => {
                self.state = PollState::Failed;
                let message = resp
                    .error
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_FAILURE.to_string());
                self.job.error = Some(message.clone());
                PollStep::Failed(JobFailedError { message })
            }
        }
    }
}

/// Owned periodic trigger. The first tick fires one period after creation.
pub struct PollTimer {
    interval: Option<Interval>,
    cancel: CancelHandle,
}

impl PollTimer {
    pub fn new(period: Duration, cancel: CancelHandle) -> Self {
        // tokio panics on a zero period.
        let period = period.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(interval),
            cancel,
        }
    }

    /// Wait for the next tick. Returns `false` once the timer is cancelled.
    pub async fn tick(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            self.interval = None;
        }
        let Some(interval) = self.interval.as_mut() else {
            return false;
        };
        interval.tick().await;
        !self.cancel.is_cancelled()
    }

    /// Stop the timer. Safe to call more than once.
    pub fn cancel(&mut self) {
        if self.interval.take().is_some() {
            debug!("poll timer cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.interval.is_none() || self.cancel.is_cancelled()
    }
}

/// Query the job status once per tick until the job completes or fails.
///
/// Returns the job with its result location on completion. Transient query
/// errors are logged and reported as `PollFailed` events; polling continues.
pub async fn poll_until_terminal<B: AnalysisBackend + ?Sized>(
    backend: &B,
    poller: &mut JobStatusPoller,
    mut timer: PollTimer,
    event_tx: &UnboundedSender<SessionEvent>,
) -> Result<Job, SessionError> {
    poller.start();
    let job_id = poller.job().id.clone();

    while timer.tick().await {
        let resp = match backend.job_status(&job_id).await {
            Ok(resp) => resp,
            Err(source) => {
                let err = TransientPollError {
                    job_id: job_id.clone(),
                    source,
                };
                warn!(error = %err, "status query failed; will retry on next tick");
                let _ = event_tx.send(SessionEvent::PollFailed {
                    job_id: job_id.clone(),
                    message: err.to_string(),
                });
                continue;
            }
        };

        match poller.observe(resp) {
            PollStep::Running { status, changed } => {
                if changed {
                    debug!(job_id = %job_id, status = status.as_str(), "job status changed");
                    let _ = event_tx.send(SessionEvent::StatusChanged {
                        job_id: job_id.clone(),
                        status,
                    });
                }
            }
            PollStep::Completed { location } => {
                timer.cancel();
                info!(job_id = %job_id, location = ?location, "job completed");
                let _ = event_tx.send(SessionEvent::StatusChanged {
                    job_id: job_id.clone(),
                    status: JobStatus::Completed,
                });
                return Ok(poller.job().clone());
            }
            PollStep::Failed(err) => {
                timer.cancel();
                warn!(job_id = %job_id, message = %err.message, "job failed");
                let _ = event_tx.send(SessionEvent::StatusChanged {
                    job_id: job_id.clone(),
                    status: JobStatus::Failed,
                });
                return Err(err.into());
            }
            PollStep::Ignored => {}
        }
    }

    Err(SessionError::Cancelled)
}
