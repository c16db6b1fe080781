use crate::report::ReportModel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub base_url: String,
    pub upload_content_type: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub user_agent: String,
    pub output_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".into(),
            upload_content_type: "text/csv".into(),
            poll_interval: Duration::from_secs(3),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("majin-analyzer/{}", env!("CARGO_PKG_VERSION")),
            output_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

/// Server-side unit of work. Only the poller changes `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub result_location: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Job {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            result_location: None,
            error: None,
        }
    }
}

/// `POST /analyze` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSlot {
    pub job_id: String,
    pub upload_url: String,
}

/// `GET /jobs/{id}` response. The backend sends more fields than these.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Monotonic id of one analysis attempt within the process.
pub type SessionId = u64;

/// Progress events emitted by a run and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started {
        file: PathBuf,
    },
    Submitted {
        job: Job,
    },
    StatusChanged {
        job_id: String,
        status: JobStatus,
    },
    PollFailed {
        job_id: String,
        message: String,
    },
    Fetching {
        location: String,
    },
    ReportReady {
        // Arc: the view and every exporter read the same immutable model.
        report: Arc<ReportModel>,
    },
    Failed(SessionFailure),
    Info(String),
}

/// Events travel tagged with the session that produced them so a reset can
/// shed anything still queued from the previous job.
#[derive(Debug, Clone)]
pub struct SessionMessage {
    pub session: SessionId,
    pub event: SessionEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Input,
    Upload,
    JobFailed,
    Fetch,
    Malformed,
    Cancelled,
}

/// User-facing description of a terminal run failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Present when the failure was in the fetch step and can be retried.
    pub retry_location: Option<String>,
}

impl From<&crate::error::SessionError> for SessionFailure {
    fn from(err: &crate::error::SessionError) -> Self {
        use crate::error::SessionError;
        let (kind, retry_location) = match err {
            SessionError::Input { .. } => (FailureKind::Input, None),
            SessionError::Upload(_) => (FailureKind::Upload, None),
            SessionError::JobFailed(_) => (FailureKind::JobFailed, None),
            SessionError::Fetch { location, .. } => (FailureKind::Fetch, location.clone()),
            SessionError::Malformed(_) => (FailureKind::Malformed, None),
            SessionError::Cancelled => (FailureKind::Cancelled, None),
        };
        Self {
            kind,
            message: format!("{err}"),
            retry_location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_response_ignores_extra_fields() {
        let body = r#"{"jobId":"j1","status":"COMPLETED","resultUrl":"https://r","createdAt":"x","ttl":1}"#;
        let parsed: JobStatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, JobStatus::Completed);
        assert_eq!(parsed.result_url.as_deref(), Some("https://r"));
        assert!(parsed.error.is_none());
    }

    #[test]
    fn fetch_failures_keep_their_location() {
        let err = crate::error::SessionError::Fetch {
            location: Some("https://bucket/results/j1.json".into()),
            source: crate::error::FetchError::MissingLocation,
        };
        let failure = SessionFailure::from(&err);
        assert_eq!(failure.kind, FailureKind::Fetch);
        assert_eq!(
            failure.retry_location.as_deref(),
            Some("https://bucket/results/j1.json")
        );
    }
}
