//! Fixture-backed mock backend (§4.2 Mock variant) — deterministic,
//! latency-free, used for tests and local development without the
//! production engine running. Every submission completes immediately with
//! a single fixture output; nothing is ever actually generated.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use genonaut_core::error::GenonautError;

use crate::types::{BackendStatusKind, BackendStatusReport, OutputDescriptor, WorkflowSubmission};
use crate::{GenerationBackend, Result};

pub struct MockBackend {
    output_dir: PathBuf,
    fixture: OutputDescriptor,
    next_id: AtomicU64,
}

impl MockBackend {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            fixture: OutputDescriptor {
                filename: "../input/fixture.jpg".into(),
                subfolder: String::new(),
                kind: "output".into(),
            },
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_fixture(output_dir: impl Into<PathBuf>, fixture: OutputDescriptor) -> Self {
        Self {
            output_dir: output_dir.into(),
            fixture,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn submit(&self, _workflow: &WorkflowSubmission) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(format!("mock-{id}"))
    }

    async fn status(&self, external_id: &str) -> Result<BackendStatusReport> {
        if external_id.is_empty() {
            return Err(GenonautError::BackendRejected("empty external id".into()));
        }
        Ok(BackendStatusReport {
            status: BackendStatusKind::Completed,
            percent: Some(100.0),
            queue_position: None,
            error: None,
        })
    }

    async fn cancel(&self, _external_id: &str) -> Result<()> {
        Ok(())
    }

    async fn fetch_output(&self, _external_id: &str) -> Result<Vec<OutputDescriptor>> {
        Ok(vec![self.fixture.clone()])
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_then_status_is_immediately_completed() {
        let backend = MockBackend::new("/var/mock/output");
        let id = backend
            .submit(&WorkflowSubmission {
                prompt: "x".into(),
                negative_prompt: None,
                checkpoint_model: "default.safetensors".into(),
                lora_models: vec![],
                width: 512,
                height: 512,
                batch_size: 1,
                sampler_params: Default::default(),
            })
            .await
            .unwrap();
        let status = backend.status(&id).await.unwrap();
        assert_eq!(status.status, BackendStatusKind::Completed);
    }

    #[tokio::test]
    async fn fetch_output_returns_in_place_fixture_reference() {
        let backend = MockBackend::new("/var/mock/output");
        let outputs = backend.fetch_output("mock-1").await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].filename, "../input/fixture.jpg");
    }
}
