//! Generation job endpoints (§6, C7).

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::unfold;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use genonaut_core::cursor::Cursor;
use genonaut_core::error::GenonautError;
use genonaut_core::submit::validate_and_normalize;
use genonaut_core::types::{Job, JobSpec};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    /// No auth layer is in scope (§1 Non-goals); the caller names the owner
    /// directly rather than it being derived from a session/token.
    pub user_id: Uuid,
    #[serde(flatten)]
    pub spec: JobSpec,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: i64,
    pub state: &'static str,
}

pub async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> Result<Json<SubmitJobResponse>, AppError> {
    // `JobSpec` derives `deny_unknown_fields` (§7 "unknown keys are rejected
    // at validation time") — surface the resulting rejection the same way
    // as any other validation failure instead of axum's default 400 body.
    let Json(body) = body.map_err(|e| GenonautError::Validation(e.body_text()))?;
    let normalized = validate_and_normalize(body.spec, &state.config.default_checkpoint_model)?;
    let job = state.jobs.create(body.user_id, normalized).await?;
    state.job_queue.enqueue(job.id).await?;
    Ok(Json(SubmitJobResponse {
        job_id: job.id,
        state: "pending",
    }))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.jobs.get(job_id).await?))
}

#[derive(Debug, Serialize)]
pub struct CancelJobResponse {
    pub state: &'static str,
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let job = state.jobs.request_cancel(job_id).await?;
    Ok(Json(json!({ "state": job.state.as_str() })))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub user_id: Uuid,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    if query.limit == Some(0) {
        return Err(GenonautError::Validation("limit must be greater than 0".into()).into());
    }
    let cursor = query.cursor.as_deref().map(Cursor::decode).transpose()?;
    let limit = query
        .limit
        .unwrap_or(state.config.pagination_default_page_size)
        .min(state.config.pagination_max_page_size);

    let page = state
        .jobs
        .list_for_user(query.user_id, cursor.as_ref(), limit)
        .await?;

    Ok(Json(json!({
        "items": page.items,
        "next_cursor": page.next_cursor.map(|c| c.encode()),
        "has_next": page.has_next,
    })))
}

/// `GET /generation-jobs/{id}/progress` — server-sent events, terminating on
/// the job's terminal state (§4.8).
pub async fn progress_sse(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> impl IntoResponse {
    let subscription = state.progress.subscribe(job_id).await;

    let stream = unfold(subscription, |mut subscription| async move {
        let event = subscription.next().await?;
        let payload = serde_json::to_string(&event).unwrap_or_default();
        Some((Ok::<Event, Infallible>(Event::default().data(payload)), subscription))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
