//! Job persistence (C7) and the durable job queue (§5 handoff between API
//! and worker). `PgJobQueue::claim_next` uses the same
//! `CTE + FOR UPDATE SKIP LOCKED` shape the teacher's outbox dispatcher
//! uses for at-least-once, exactly-one-in-flight delivery.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use genonaut_core::cursor::Cursor;
use genonaut_core::error::GenonautError;
use genonaut_core::ports::{JobPatch, JobQueue, JobStore, NormalizedJobSpec, Page, Result};
use genonaut_core::types::{Job, JobState};

use crate::sqlx_types::{encode_backend_kind, encode_job_state, parse_job_state, PgJobRow};

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const JOB_COLUMNS: &str = "id, user_id, prompt, negative_prompt, checkpoint_model, lora_models, \
     width, height, batch_size, sampler_steps, sampler_cfg, sampler_seed, sampler_name, \
     sampler_scheduler, backend, state, state_version, retries, created_at, started_at, \
     completed_at, external_prompt_id, error_message, content_id";

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, user_id: Uuid, spec: NormalizedJobSpec) -> Result<Job> {
        let lora_json = serde_json::to_value(&spec.lora_models)
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;
        let row = sqlx::query_as::<_, PgJobRow>(&format!(
            r#"
            INSERT INTO jobs (
                user_id, prompt, negative_prompt, checkpoint_model, lora_models,
                width, height, batch_size, sampler_steps, sampler_cfg, sampler_seed,
                sampler_name, sampler_scheduler, backend, state, state_version, retries
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'pending', 0, 0
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&spec.prompt)
        .bind(&spec.negative_prompt)
        .bind(&spec.checkpoint_model)
        .bind(lora_json)
        .bind(spec.width as i32)
        .bind(spec.height as i32)
        .bind(spec.batch_size as i32)
        .bind(spec.sampler_params.steps as i32)
        .bind(spec.sampler_params.cfg)
        .bind(spec.sampler_params.seed)
        .bind(&spec.sampler_params.sampler)
        .bind(&spec.sampler_params.scheduler)
        .bind(encode_backend_kind(spec.backend))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        Ok(row.into())
    }

    async fn get(&self, job_id: i64) -> Result<Job> {
        let row = sqlx::query_as::<_, PgJobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        row.map(Into::into)
            .ok_or_else(|| GenonautError::NotFound(format!("job {job_id} not found")))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        cursor: Option<&Cursor>,
        limit: u32,
    ) -> Result<Page<Job>> {
        let fetch_limit = limit as i64 + 1;
        let rows = match cursor {
            None => {
                sqlx::query_as::<_, PgJobRow>(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs
                     WHERE user_id = $1
                     ORDER BY created_at DESC, id DESC
                     LIMIT $2"
                ))
                .bind(user_id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            Some(c) => {
                sqlx::query_as::<_, PgJobRow>(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs
                     WHERE user_id = $1
                       AND (created_at, id) < ($2, $3)
                     ORDER BY created_at DESC, id DESC
                     LIMIT $4"
                ))
                .bind(user_id)
                .bind(c.created_at)
                .bind(c.id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        let mut jobs: Vec<Job> = rows.into_iter().map(Into::into).collect();
        let has_next = jobs.len() as u32 > limit;
        if has_next {
            jobs.truncate(limit as usize);
        }
        let next_cursor = if has_next {
            jobs.last()
                .map(|j| Cursor::new(j.created_at, j.id, genonaut_core::types::Source::Items))
        } else {
            None
        };

        Ok(Page {
            items: jobs,
            next_cursor,
            has_next,
        })
    }

    async fn transition(
        &self,
        job_id: i64,
        expected_version: i64,
        next: JobState,
        patch: JobPatch,
    ) -> Result<Job> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        let current: Option<(String,)> = sqlx::query_as(
            "SELECT state FROM jobs WHERE id = $1 AND state_version = $2 FOR UPDATE",
        )
        .bind(job_id)
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        let current_state = match current {
            Some((s,)) => parse_job_state(&s),
            None => {
                return Err(GenonautError::Internal(anyhow!(
                    "job {job_id} state_version mismatch (expected {expected_version}): \
                     someone else already transitioned this job"
                )))
            }
        };

        if !current_state.can_transition_to(next) {
            return Err(GenonautError::Validation(format!(
                "job {job_id} cannot transition from {current_state} to {next}"
            )));
        }

        let row = sqlx::query_as::<_, PgJobRow>(&format!(
            r#"
            UPDATE jobs SET
                state = $1,
                state_version = state_version + 1,
                external_prompt_id = COALESCE($2, external_prompt_id),
                error_message = COALESCE($3, error_message),
                content_id = COALESCE($4, content_id),
                retries = COALESCE($5, retries),
                started_at = COALESCE($6, started_at),
                completed_at = COALESCE($7, completed_at)
            WHERE id = $8 AND state_version = $9
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(encode_job_state(next))
        .bind(&patch.external_prompt_id)
        .bind(&patch.error_message)
        .bind(patch.content_id)
        .bind(patch.retries.map(|r| r as i32))
        .bind(patch.started_at)
        .bind(patch.completed_at)
        .bind(job_id)
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        let job = row.map(Into::into).ok_or_else(|| {
            GenonautError::Internal(anyhow!(
                "job {job_id} state_version mismatch (expected {expected_version}): \
                 someone else already transitioned this job"
            ))
        })?;

        tx.commit()
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        Ok(job)
    }

    async fn request_cancel(&self, job_id: i64) -> Result<Job> {
        let row = sqlx::query_as::<_, PgJobRow>(&format!(
            r#"
            UPDATE jobs SET state = 'cancelled', state_version = state_version + 1
            WHERE id = $1 AND state IN ('pending', 'running', 'retrying')
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        match row {
            Some(r) => Ok(r.into()),
            // Already terminal — idempotent no-op (§4.1 Cancel, §8).
            None => self.get(job_id).await,
        }
    }

    async fn is_cancel_requested(&self, job_id: i64) -> Result<bool> {
        let state: Option<String> = sqlx::query_scalar("SELECT state FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        match state {
            Some(s) => Ok(parse_job_state(&s) == JobState::Cancelled),
            None => Err(GenonautError::NotFound(format!("job {job_id} not found"))),
        }
    }
}

/// Durable FIFO handoff between `Submit` and the worker loop (§5). A
/// dedicated `job_queue` table decouples "job exists" from "job is ready to
/// be claimed" — jobs are enqueued only after the `jobs` row commits.
#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, job_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO job_queue (job_id, enqueued_at) VALUES ($1, now())
             ON CONFLICT (job_id) DO NOTHING",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;
        Ok(())
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<i64>> {
        let claimed: Option<(i64,)> = sqlx::query_as(
            r#"
            WITH claimable AS (
                SELECT job_id
                FROM job_queue
                WHERE claimed_at IS NULL
                ORDER BY enqueued_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE job_queue q
            SET claimed_at = now(), claimer_id = $1
            FROM claimable c
            WHERE q.job_id = c.job_id
            RETURNING q.job_id
            "#,
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        Ok(claimed.map(|(job_id,)| job_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_columns_constant_lists_every_row_field() {
        assert!(JOB_COLUMNS.contains("state_version"));
        assert!(JOB_COLUMNS.contains("content_id"));
    }
}
