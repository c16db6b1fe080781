//! Presentation-side session state, reduced from controller messages.

use crate::model::{FailureKind, Job, JobStatus, SessionEvent, SessionFailure, SessionId, SessionMessage};
use crate::report::ReportModel;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Starting,
    Polling,
    Fetching,
    Ready,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SessionView {
    pub session: SessionId,
    pub phase: SessionPhase,
    pub file: Option<PathBuf>,
    pub job: Option<Job>,
    pub report: Option<Arc<ReportModel>>,
    pub failure: Option<SessionFailure>,
    /// Latest non-terminal note (transient poll errors, controller info).
    pub status: String,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            session: 0,
            phase: SessionPhase::Idle,
            file: None,
            job: None,
            report: None,
            failure: None,
            status: String::new(),
        }
    }
}

impl SessionView {
    /// Fold one message into the view. Messages from an older session are
    /// dropped and `false` is returned; a newer session resets the view first.
    pub fn apply(&mut self, msg: SessionMessage) -> bool {
        if msg.session < self.session {
            return false;
        }
        if msg.session > self.session {
            *self = Self {
                session: msg.session,
                ..Self::default()
            };
        }

        match msg.event {
            SessionEvent::Started { file } => {
                self.phase = SessionPhase::Starting;
                self.file = Some(file);
            }
            SessionEvent::Submitted { job } => {
                self.phase = SessionPhase::Polling;
                self.job = Some(job);
                self.status.clear();
            }
            SessionEvent::StatusChanged { status, .. } => {
                if let Some(job) = self.job.as_mut() {
                    job.status = status;
                }
                self.status.clear();
            }
            SessionEvent::PollFailed { message, .. } => {
                self.status = message;
            }
            SessionEvent::Fetching { .. } => {
                self.phase = SessionPhase::Fetching;
                self.failure = None;
                self.status.clear();
            }
            SessionEvent::ReportReady { report } => {
                self.phase = SessionPhase::Ready;
                self.report = Some(report);
                self.failure = None;
                self.status.clear();
            }
            SessionEvent::Failed(failure) => {
                self.phase = SessionPhase::Failed;
                self.failure = Some(failure);
            }
            SessionEvent::Info(message) => {
                self.status = message;
            }
        }
        true
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Starting | SessionPhase::Polling | SessionPhase::Fetching
        )
    }

    /// Text of the loading overlay, if one should be shown.
    pub fn overlay_text(&self) -> Option<&'static str> {
        match self.phase {
            SessionPhase::Starting => Some("Starting…"),
            SessionPhase::Polling => match self.job.as_ref().map(|j| j.status) {
                Some(JobStatus::Processing) | Some(JobStatus::Completed) => {
                    Some("Analyzing data…")
                }
                _ => Some("Starting…"),
            },
            SessionPhase::Fetching => Some("Analyzing data…"),
            _ => None,
        }
    }

    pub fn can_retry_fetch(&self) -> bool {
        self.phase == SessionPhase::Failed
            && self
                .failure
                .as_ref()
                .is_some_and(|f| f.kind == FailureKind::Fetch && f.retry_location.is_some())
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job.as_ref().map(|j| j.id.as_str())
    }
}
