//! HTTP client for the production generation engine (§4.2 Primary variant).
//! Error bodies map onto `GenonautError` by status code, the same shape the
//! teacher's `HttpClient::handle_error_response` uses: network errors and
//! 5xx/429/408 are transient (`backend_unavailable`, retried by the worker
//! loop); other 4xx are `backend_rejected` and fail the job immediately.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use genonaut_core::error::GenonautError;

use crate::types::{BackendStatusKind, BackendStatusReport, OutputDescriptor, WorkflowSubmission};
use crate::{GenerationBackend, Result};

pub struct PrimaryBackend {
    base_url: String,
    output_dir: PathBuf,
    client: reqwest::Client,
}

impl PrimaryBackend {
    pub fn new(base_url: impl Into<String>, output_dir: impl Into<PathBuf>, submit_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            output_dir: output_dir.into(),
            client: reqwest::Client::builder()
                .timeout(submit_timeout)
                .build()
                .expect("reqwest client builds with a valid timeout"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn map_error_response(&self, resp: reqwest::Response) -> GenonautError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        match status {
            408 | 429 | 500..=599 => GenonautError::BackendUnavailable(format!(
                "primary backend returned {status}: {body}"
            )),
            _ => GenonautError::BackendRejected(format!("primary backend returned {status}: {body}")),
        }
    }
}

#[async_trait]
impl GenerationBackend for PrimaryBackend {
    async fn submit(&self, workflow: &WorkflowSubmission) -> Result<String> {
        let resp = self
            .client
            .post(self.url("/prompt"))
            .json(workflow)
            .send()
            .await
            .map_err(|e| GenonautError::BackendUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(self.map_error_response(resp).await);
        }

        #[derive(serde::Deserialize)]
        struct SubmitResponse {
            prompt_id: String,
        }
        let parsed: SubmitResponse = resp
            .json()
            .await
            .map_err(|e| GenonautError::BackendRejected(e.to_string()))?;
        Ok(parsed.prompt_id)
    }

    async fn status(&self, external_id: &str) -> Result<BackendStatusReport> {
        let resp = self
            .client
            .get(self.url(&format!("/history/{external_id}")))
            .send()
            .await
            .map_err(|e| GenonautError::BackendUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(self.map_error_response(resp).await);
        }

        resp.json::<BackendStatusReport>()
            .await
            .map_err(|e| GenonautError::BackendRejected(e.to_string()))
    }

    async fn cancel(&self, external_id: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.url(&format!("/interrupt/{external_id}")))
            .send()
            .await
            .map_err(|e| GenonautError::BackendUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            tracing::warn!(
                external_id,
                status = resp.status().as_u16(),
                "primary backend rejected cancel; job transitions to cancelled regardless"
            );
        }
        Ok(())
    }

    async fn fetch_output(&self, external_id: &str) -> Result<Vec<OutputDescriptor>> {
        let report = self.status(external_id).await?;
        if report.status != BackendStatusKind::Completed {
            return Err(GenonautError::OutputMissing(format!(
                "job {external_id} has not completed on the primary backend"
            )));
        }

        let resp = self
            .client
            .get(self.url(&format!("/history/{external_id}/outputs")))
            .send()
            .await
            .map_err(|e| GenonautError::BackendUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(self.map_error_response(resp).await);
        }

        resp.json::<Vec<OutputDescriptor>>()
            .await
            .map_err(|e| GenonautError::BackendRejected(e.to_string()))
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
