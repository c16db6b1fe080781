use crate::engine::AnalysisBackend;
use crate::error::BackendError;
use crate::model::{JobSlot, JobStatusResponse, SessionConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;

/// reqwest-backed client for the analysis API and pre-signed storage URLs.
#[derive(Clone)]
pub struct HttpBackend {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: reqwest::Url,
}

impl HttpBackend {
    pub fn new(cfg: &SessionConfig) -> Result<Self> {
        let mut base = cfg.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = reqwest::Url::parse(&base).context("parse base URL")?;
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|_| BackendError::InvalidUrl(format!("{}{}", self.base_url, path)))
    }

    async fn send(&self, req: reqwest::RequestBuilder, url: &str) -> Result<Bytes, BackendError> {
        let resp = req.send().await.map_err(|source| BackendError::Transport {
            url: url.to_string(),
            source,
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.bytes().await.map_err(|source| BackendError::Transport {
            url: url.to_string(),
            source,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T, BackendError> {
        let body = self.send(req, url).await?;
        serde_json::from_slice(&body).map_err(|source| BackendError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    async fn request_job(&self) -> Result<JobSlot, BackendError> {
        let url = self.endpoint("analyze")?;
        self.send_json(self.http.post(url.clone()), url.as_str())
            .await
    }

    async fn upload(
        &self,
        target: &str,
        payload: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError> {
        // Pre-signed URLs are used verbatim; re-encoding would break the signature.
        let req = self
            .http
            .put(target)
            .header(CONTENT_TYPE, content_type)
            .body(payload);
        self.send(req, target).await.map(|_| ())
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, BackendError> {
        let mut url = self.endpoint("jobs/")?;
        let invalid = BackendError::InvalidUrl(url.to_string());
        url.path_segments_mut()
            .map_err(|_| invalid)?
            .pop_if_empty()
            .push(job_id);
        self.send_json(self.http.get(url.clone()), url.as_str())
            .await
    }

    async fn fetch_result(&self, location: &str) -> Result<Bytes, BackendError> {
        self.send(self.http.get(location), location).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        let cfg = SessionConfig {
            base_url: base.to_string(),
            ..SessionConfig::default()
        };
        HttpBackend::new(&cfg).unwrap()
    }

    #[test]
    fn endpoints_resolve_under_base_path() {
        let b = backend("https://api.example.com/prod");
        assert_eq!(
            b.endpoint("analyze").unwrap().as_str(),
            "https://api.example.com/prod/analyze"
        );
        let b = backend("https://api.example.com/prod/");
        assert_eq!(
            b.endpoint("analyze").unwrap().as_str(),
            "https://api.example.com/prod/analyze"
        );
    }
}
