use crate::engine::AnalysisBackend;
use crate::error::{UploadError, UploadStage};
use crate::model::Job;
use bytes::Bytes;
use tracing::{debug, info};

/// Two-phase submission: obtain a job slot, then PUT the dataset to the
/// pre-signed URL it carries. The returned job is `PENDING`.
pub async fn submit<B: AnalysisBackend + ?Sized>(
    backend: &B,
    payload: Bytes,
    content_type: &str,
) -> Result<Job, UploadError> {
    let slot = backend
        .request_job()
        .await
        .map_err(|source| UploadError {
            stage: UploadStage::RequestSlot,
            source,
        })?;
    debug!(job_id = %slot.job_id, "job slot issued");

    let size = payload.len();
    backend
        .upload(&slot.upload_url, payload, content_type)
        .await
        .map_err(|source| UploadError {
            stage: UploadStage::Transfer,
            source,
        })?;
    info!(job_id = %slot.job_id, bytes = size, "dataset uploaded");

    Ok(Job::pending(slot.job_id))
}
