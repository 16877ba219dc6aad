//! Job State Machine worker loop (C7) — §4.1.
//!
//! Claims jobs off the durable queue, drives each through submit/poll/
//! materialize/retry/cancel, and publishes progress. Modeled on the
//! teacher's `OutboxDispatcher::run` loop shape: claim, process, sleep on
//! empty claim, never crash the loop on a single job's error.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use genonaut_backend::{GenerationBackend, WorkflowSubmission};
use genonaut_core::config::Config;
use genonaut_core::error::GenonautError;
use genonaut_core::ports::{ContentStore, JobPatch, JobQueue, JobStore, Result, TagStore};
use genonaut_core::types::{BackendKind, Job, JobState, ProgressEvent};

use crate::materializer;
use crate::progress::SharedProgressHub;

pub struct JobRunner {
    jobs: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    content: Arc<dyn ContentStore>,
    tags: Arc<dyn TagStore>,
    backends: HashMap<BackendKind, Arc<dyn GenerationBackend>>,
    config: Arc<Config>,
    progress: SharedProgressHub,
}

impl JobRunner {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
        content: Arc<dyn ContentStore>,
        tags: Arc<dyn TagStore>,
        backends: HashMap<BackendKind, Arc<dyn GenerationBackend>>,
        config: Arc<Config>,
        progress: SharedProgressHub,
    ) -> Self {
        Self {
            jobs,
            queue,
            content,
            tags,
            backends,
            config,
            progress,
        }
    }

    /// Runs forever. Spawn via `tokio::spawn`.
    pub async fn run(&self, worker_id: &str) {
        tracing::info!(worker_id, "job runner started");
        loop {
            match self.queue.claim_next(worker_id).await {
                Ok(Some(job_id)) => {
                    if let Err(e) = self.process_job(job_id).await {
                        tracing::error!(job_id, error = %e, "job processing failed");
                    }
                }
                Ok(None) => tokio::time::sleep(self.config.poll_interval).await,
                Err(e) => {
                    tracing::error!(error = %e, "claim_next failed");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    async fn process_job(&self, job_id: i64) -> Result<()> {
        let job = self.jobs.get(job_id).await?;
        let backend = self.backends.get(&job.backend).cloned().ok_or_else(|| {
            GenonautError::Internal(anyhow::anyhow!(
                "no backend configured for {}",
                job.backend
            ))
        })?;

        self.progress.open(job_id).await;

        let job = self
            .jobs
            .transition(
                job_id,
                job.state_version,
                JobState::Running,
                JobPatch {
                    started_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;
        self.emit(&job, None, None).await;

        self.drive(job, backend.as_ref()).await
    }

    /// Submit/poll/retry loop for one job, from `running` through to a
    /// terminal state.
    async fn drive(&self, mut job: Job, backend: &dyn GenerationBackend) -> Result<()> {
        loop {
            let external_id = match self.submit_with_retries(&mut job, backend).await? {
                Some(id) => id,
                None => return Ok(()), // job failed/terminal inside submit_with_retries
            };

            match self.poll_until_terminal(&mut job, backend, &external_id).await? {
                PollOutcome::Completed(descriptors) => {
                    return self.complete(job, backend, descriptors).await;
                }
                PollOutcome::Cancelled => return Ok(()),
                PollOutcome::RetryableFailure => {
                    if job.retries >= self.config.max_retries {
                        self.fail(job, "backend reported a retryable failure and retries exhausted")
                            .await?;
                        return Ok(());
                    }
                    job = self.enter_retrying(job).await?;
                    continue;
                }
                PollOutcome::Failed(reason) => {
                    self.fail(job, &reason).await?;
                    return Ok(());
                }
                PollOutcome::TimedOut => {
                    self.fail(job, "exceeded max_wait without reaching a terminal status").await?;
                    return Ok(());
                }
            }
        }
    }

    /// §4.1 step 3: exponential backoff (base 5s, factor 2, max 3 retries)
    /// on transient submit failures; non-transient 4xx fail immediately.
    async fn submit_with_retries(
        &self,
        job: &mut Job,
        backend: &dyn GenerationBackend,
    ) -> Result<Option<String>> {
        let workflow = WorkflowSubmission {
            prompt: job.prompt.clone(),
            negative_prompt: job.negative_prompt.clone(),
            checkpoint_model: job.checkpoint_model.clone(),
            lora_models: job.lora_models.clone(),
            width: job.width,
            height: job.height,
            batch_size: job.batch_size,
            sampler_params: job.sampler_params.clone(),
        };

        let mut attempt = 0u32;
        loop {
            if self.jobs.is_cancel_requested(job.id).await? {
                self.cancel(job.clone(), backend, None).await?;
                return Ok(None);
            }

            match backend.submit(&workflow).await {
                Ok(external_id) => {
                    // §4.1 step 4: "store returned external id; transition
                    // stays running" — a same-state patch, not a state move.
                    *job = self
                        .jobs
                        .transition(
                            job.id,
                            job.state_version,
                            JobState::Running,
                            JobPatch {
                                external_prompt_id: Some(external_id.clone()),
                                ..Default::default()
                            },
                        )
                        .await?;
                    return Ok(Some(external_id));
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    *job = self
                        .jobs
                        .transition(
                            job.id,
                            job.state_version,
                            JobState::Retrying,
                            JobPatch {
                                retries: Some(attempt),
                                ..Default::default()
                            },
                        )
                        .await?;
                    self.emit(job, None, None).await;
                    let backoff = self.config.retry_backoff_base
                        * self.config.retry_backoff_factor.pow(attempt - 1);
                    tokio::time::sleep(backoff).await;
                    *job = self
                        .jobs
                        .transition(job.id, job.state_version, JobState::Running, JobPatch::default())
                        .await?;
                }
                Err(e) => {
                    self.fail(job.clone(), &e.to_string()).await?;
                    return Ok(None);
                }
            }
        }
    }

    async fn poll_until_terminal(
        &self,
        job: &mut Job,
        backend: &dyn GenerationBackend,
        external_id: &str,
    ) -> Result<PollOutcome> {
        let deadline = tokio::time::Instant::now() + self.config.max_wait;

        loop {
            if self.jobs.is_cancel_requested(job.id).await? {
                self.cancel(job.clone(), backend, Some(external_id)).await?;
                return Ok(PollOutcome::Cancelled);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(PollOutcome::TimedOut);
            }

            match backend.status(external_id).await {
                Ok(report) => match report.status {
                    genonaut_backend::BackendStatusKind::Completed => {
                        let descriptors = backend.fetch_output(external_id).await?;
                        return Ok(PollOutcome::Completed(descriptors));
                    }
                    genonaut_backend::BackendStatusKind::Failed => {
                        return Ok(match report.error {
                            Some(msg) => PollOutcome::Failed(msg),
                            None => PollOutcome::RetryableFailure,
                        });
                    }
                    genonaut_backend::BackendStatusKind::Queued
                    | genonaut_backend::BackendStatusKind::Running => {
                        self.emit(job, report.percent, report.queue_position).await;
                        tokio::time::sleep(self.config.poll_interval).await;
                    }
                },
                Err(e) if e.is_retryable() => {
                    tracing::warn!(job_id = job.id, error = %e, "transient poll error, retrying");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Err(e) => return Ok(PollOutcome::Failed(e.to_string())),
            }
        }
    }

    async fn enter_retrying(&self, job: Job) -> Result<Job> {
        let updated = self
            .jobs
            .transition(job.id, job.state_version, JobState::Retrying, JobPatch::default())
            .await?;
        self.emit(&updated, None, None).await;
        let backoff = self.config.retry_backoff_base
            * self.config.retry_backoff_factor.pow(updated.retries.max(1));
        tokio::time::sleep(backoff).await;
        self.jobs
            .transition(updated.id, updated.state_version, JobState::Running, JobPatch::default())
            .await
    }

    async fn complete(
        &self,
        job: Job,
        backend: &dyn GenerationBackend,
        descriptors: Vec<genonaut_backend::OutputDescriptor>,
    ) -> Result<()> {
        let tags = derive_tags(&job);
        let content_id = materializer::materialize(
            job.backend,
            backend,
            self.content.as_ref(),
            job.id,
            job.user_id,
            &job.prompt,
            tags.clone(),
            descriptors,
        )
        .await?;

        if !tags.is_empty() {
            let mut tag_ids = Vec::with_capacity(tags.len());
            for name in &tags {
                tag_ids.push(self.tags.get_or_create(name).await?.id);
            }
            self.tags
                .link(content_id, genonaut_core::types::Source::Items, &tag_ids)
                .await?;
        }

        let updated = self
            .jobs
            .transition(
                job.id,
                job.state_version,
                JobState::Completed,
                JobPatch {
                    content_id: Some(content_id),
                    completed_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;
        self.emit(&updated, None, None).await;
        Ok(())
    }

    async fn fail(&self, job: Job, reason: &str) -> Result<()> {
        let updated = self
            .jobs
            .transition(
                job.id,
                job.state_version,
                JobState::Failed,
                JobPatch {
                    error_message: Some(reason.to_string()),
                    completed_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;
        self.emit(&updated, None, None).await;
        Ok(())
    }

    async fn cancel(&self, job: Job, backend: &dyn GenerationBackend, external_id: Option<&str>) -> Result<()> {
        if let Some(id) = external_id {
            let _ = backend.cancel(id).await; // best-effort, per §4.1 step 7
        }
        let updated = self.jobs.request_cancel(job.id).await?;
        self.emit(&updated, None, None).await;
        Ok(())
    }

    async fn emit(&self, job: &Job, percent: Option<f32>, queue_position: Option<u32>) {
        self.progress
            .publish(ProgressEvent {
                job_id: job.id,
                state: job.state,
                seq: job.state_version as u64,
                percent,
                queue_position,
                ts: Utc::now(),
            })
            .await;
    }
}

enum PollOutcome {
    Completed(Vec<genonaut_backend::OutputDescriptor>),
    Cancelled,
    RetryableFailure,
    Failed(String),
    TimedOut,
}

/// Tags are derived from job metadata — currently just the checkpoint and
/// backend, enough for gallery filtering without a dedicated tag-entry
/// field on `JobSpec` (§4.3 "tags derived from job metadata").
fn derive_tags(job: &Job) -> Vec<String> {
    vec![
        format!("checkpoint:{}", job.checkpoint_model),
        format!("backend:{}", job.backend.as_str()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_tags_includes_checkpoint_and_backend() {
        let job = Job {
            id: 1,
            user_id: Uuid::new_v4(),
            prompt: "x".into(),
            negative_prompt: None,
            checkpoint_model: "sdxl.safetensors".into(),
            lora_models: vec![],
            width: 512,
            height: 512,
            batch_size: 1,
            sampler_params: Default::default(),
            backend: BackendKind::Primary,
            state: JobState::Running,
            state_version: 0,
            retries: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            external_prompt_id: None,
            error_message: None,
            content_id: None,
        };
        let tags = derive_tags(&job);
        assert!(tags.contains(&"checkpoint:sdxl.safetensors".to_string()));
        assert!(tags.contains(&"backend:primary".to_string()));
    }
}
