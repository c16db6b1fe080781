use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failure talking to the analysis backend or blob storage.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL {0}")]
    InvalidUrl(String),
}

/// Which half of the two-phase submission failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    RequestSlot,
    Transfer,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStage::RequestSlot => f.write_str("requesting a job slot"),
            UploadStage::Transfer => f.write_str("uploading the dataset"),
        }
    }
}

#[derive(Debug, Error)]
#[error("upload failed while {stage}: {source}")]
pub struct UploadError {
    pub stage: UploadStage,
    #[source]
    pub source: BackendError,
}

/// A status query that failed without ending the job. Logged, never escalated.
#[derive(Debug, Error)]
#[error("status query for job {job_id} failed: {source}")]
pub struct TransientPollError {
    pub job_id: String,
    #[source]
    pub source: BackendError,
}

/// The backend reported the job as FAILED.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("analysis failed: {message}")]
pub struct JobFailedError {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("job completed without a result location")]
    MissingLocation,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("result payload is not a valid report: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    MissingChartData,
    DuplicateChartId,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::MissingChartData => f.write_str("has no entry in chart data"),
            MalformedReason::DuplicateChartId => f.write_str("is declared more than once"),
        }
    }
}

/// The fetched result violates the report invariants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed result: chart `{chart_id}` {reason}")]
pub struct MalformedResultError {
    pub chart_id: String,
    pub reason: MalformedReason,
}

/// Terminal failure of one analysis run.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read {}: {source}", .path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    JobFailed(#[from] JobFailedError),

    #[error("could not fetch the analysis result: {source}")]
    Fetch {
        /// Location to retry against, when one was known.
        location: Option<String>,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Malformed(#[from] MalformedResultError),

    #[error("session cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF assembly failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("a document capture is already running")]
    CaptureBusy,

    #[error("captured report is empty")]
    EmptyCapture,
}
