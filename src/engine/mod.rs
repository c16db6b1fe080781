mod fetch;
mod http;
mod poller;
mod submit;

pub use fetch::fetch_report;
pub use http::HttpBackend;
pub use poller::{poll_until_terminal, JobStatusPoller, PollState, PollStep, PollTimer};
pub use submit::submit;

use crate::error::{BackendError, SessionError};
use crate::model::{JobSlot, JobStatusResponse, SessionConfig, SessionEvent};
use crate::report::ReportModel;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tracing::info;

/// Backend protocol: job slot, upload, status, result.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// `POST /analyze`
    async fn request_job(&self) -> Result<JobSlot, BackendError>;
    /// `PUT <uploadUrl>`
    async fn upload(
        &self,
        target: &str,
        payload: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError>;
    /// `GET /jobs/{id}`
    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, BackendError>;
    /// `GET <resultUrl>`
    async fn fetch_result(&self, location: &str) -> Result<Bytes, BackendError>;
}

#[async_trait]
impl<B: AnalysisBackend + ?Sized> AnalysisBackend for Arc<B> {
    async fn request_job(&self) -> Result<JobSlot, BackendError> {
        (**self).request_job().await
    }

    async fn upload(
        &self,
        target: &str,
        payload: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError> {
        (**self).upload(target, payload, content_type).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, BackendError> {
        (**self).job_status(job_id).await
    }

    async fn fetch_result(&self, location: &str) -> Result<Bytes, BackendError> {
        (**self).fetch_result(location).await
    }
}

/// Shared cancellation flag for one run. Cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What a run should do.
#[derive(Debug, Clone)]
pub enum RunRequest {
    /// Full pipeline for a dataset on disk.
    Analyze { file: PathBuf },
    /// Only the fetch step, against a location from an earlier completed job.
    Fetch { location: String },
}

/// Drives one analysis: submit, poll, fetch.
pub struct AnalysisEngine<B> {
    backend: B,
    cfg: SessionConfig,
}

impl<B: AnalysisBackend> AnalysisEngine<B> {
    pub fn new(backend: B, cfg: SessionConfig) -> Self {
        Self { backend, cfg }
    }

    pub async fn run(
        self,
        request: RunRequest,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
        cancel: CancelHandle,
    ) -> Result<Arc<ReportModel>, SessionError> {
        let location = match request {
            RunRequest::Fetch { location } => location,
            RunRequest::Analyze { file } => {
                let payload = tokio::fs::read(&file)
                    .await
                    .map_err(|source| SessionError::Input {
                        path: file.clone(),
                        source,
                    })?;
                info!(file = %file.display(), bytes = payload.len(), "submitting dataset");

                let job = submit(
                    &self.backend,
                    Bytes::from(payload),
                    &self.cfg.upload_content_type,
                )
                .await?;
                let _ = event_tx.send(SessionEvent::Submitted { job: job.clone() });

                let mut poller = JobStatusPoller::new(job);
                let job = poll_until_terminal(
                    &self.backend,
                    &mut poller,
                    PollTimer::new(self.cfg.poll_interval, cancel.clone()),
                    &event_tx,
                )
                .await?;

                job.result_location.ok_or(SessionError::Fetch {
                    location: None,
                    source: crate::error::FetchError::MissingLocation,
                })?
            }
        };

        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        let _ = event_tx.send(SessionEvent::Fetching {
            location: location.clone(),
        });
        let report = fetch_report(&self.backend, &location).await?;
        Ok(Arc::new(report))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Scripted, ScriptedBackend};
    use super::*;
    use crate::model::JobStatus;
    use crate::report::fixtures::SAMPLE_REPORT;
    use std::io::Write;

    fn dataset() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "city,sales\nTokyo,1200").unwrap();
        f
    }

    #[tokio::test(start_paused = true)]
    async fn full_pipeline_produces_report() {
        let backend = Arc::new(ScriptedBackend {
            result: Some(SAMPLE_REPORT.to_string()),
            ..ScriptedBackend::with_statuses(vec![
                Scripted::Status(JobStatus::Processing, None),
                Scripted::Status(JobStatus::Completed, Some("https://storage/results/job-1.json")),
            ])
        });
        let file = dataset();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = AnalysisEngine::new(backend.clone(), SessionConfig::default());
        let report = engine
            .run(
                RunRequest::Analyze {
                    file: file.path().to_path_buf(),
                },
                tx,
                CancelHandle::default(),
            )
            .await
            .unwrap();

        assert_eq!(report.total_rows(), 12840);
        assert_eq!(backend.fetch_calls(), 1);
        let uploads = backend.uploads.lock().unwrap().clone();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].2, "text/csv");

        let mut saw_submitted = false;
        let mut saw_fetching = false;
        while let Ok(ev) = rx.try_recv() {
            match ev {
                SessionEvent::Submitted { job } => {
                    saw_submitted = true;
                    assert_eq!(job.id, "job-1");
                    assert_eq!(job.status, JobStatus::Pending);
                }
                SessionEvent::Fetching { location } => {
                    saw_fetching = true;
                    assert_eq!(location, "https://storage/results/job-1.json");
                }
                _ => {}
            }
        }
        assert!(saw_submitted && saw_fetching);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_without_location_is_fetch_error() {
        let backend = ScriptedBackend::with_statuses(vec![Scripted::Status(
            JobStatus::Completed,
            None,
        )]);
        let file = dataset();
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = AnalysisEngine::new(backend, SessionConfig::default())
            .run(
                RunRequest::Analyze {
                    file: file.path().to_path_buf(),
                },
                tx,
                CancelHandle::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Fetch {
                location: None,
                source: crate::error::FetchError::MissingLocation
            }
        ));
    }

    #[tokio::test]
    async fn missing_input_file_is_reported() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = AnalysisEngine::new(ScriptedBackend::default(), SessionConfig::default())
            .run(
                RunRequest::Analyze {
                    file: PathBuf::from("/definitely/not/here.csv"),
                },
                tx,
                CancelHandle::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Input { .. }));
    }

    #[tokio::test]
    async fn fetch_only_request_skips_submission() {
        let backend = Arc::new(ScriptedBackend {
            result: Some(SAMPLE_REPORT.to_string()),
            ..Default::default()
        });
        let (tx, _rx) = mpsc::unbounded_channel();
        let report = AnalysisEngine::new(backend.clone(), SessionConfig::default())
            .run(
                RunRequest::Fetch {
                    location: "https://storage/results/job-1.json".into(),
                },
                tx,
                CancelHandle::default(),
            )
            .await
            .unwrap();
        assert_eq!(report.job_id(), Some("job-42"));
        assert_eq!(backend.status_calls(), 0);
        assert!(backend.uploads.lock().unwrap().is_empty());
    }
    #[test]
    fn cancel_flag_is_shared_and_repeatable() {
        let run = CancelHandle::default();
        let engine_side = run.clone();
        engine_side.cancel();
        run.cancel();
        assert!(run.is_cancelled());
        assert!(engine_side.is_cancelled());
    }
}
