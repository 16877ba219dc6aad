//! SQLx row types for the Genonaut Postgres adapter.
//!
//! Each row struct derives `sqlx::FromRow` and provides `impl From<Row> for
//! CoreType`. This isolates sqlx dependencies in `genonaut-db`, keeping
//! `genonaut-core` pure. The core enums have no `sqlx::Type` derive —
//! every SELECT casts the enum-ish column with `::text`, so we decode via
//! `String` and convert.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use genonaut_core::types::{
    BackendKind, ContentRow, GenSourceStats, Job, JobState, LoraEntry, SamplerParams, Source,
    Tag, TagCardinality,
};

pub fn parse_backend_kind(s: &str) -> BackendKind {
    BackendKind::from_str(s).unwrap_or(BackendKind::Primary)
}

pub fn encode_backend_kind(k: BackendKind) -> &'static str {
    k.as_str()
}

pub fn parse_job_state(s: &str) -> JobState {
    JobState::from_str(s).unwrap_or(JobState::Failed)
}

pub fn encode_job_state(s: JobState) -> &'static str {
    s.as_str()
}

pub fn parse_source(s: &str) -> Source {
    Source::from_str(s).unwrap_or(Source::Items)
}

pub fn encode_source(s: Source) -> &'static str {
    s.as_str()
}

// ── PgJobRow ──────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PgJobRow {
    pub id: i64,
    pub user_id: Uuid,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub checkpoint_model: String,
    pub lora_models: serde_json::Value,
    pub width: i32,
    pub height: i32,
    pub batch_size: i32,
    pub sampler_steps: i32,
    pub sampler_cfg: f32,
    pub sampler_seed: i64,
    pub sampler_name: String,
    pub sampler_scheduler: String,
    pub backend: String,
    pub state: String,
    pub state_version: i64,
    pub retries: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub external_prompt_id: Option<String>,
    pub error_message: Option<String>,
    pub content_id: Option<i64>,
}

impl From<PgJobRow> for Job {
    fn from(r: PgJobRow) -> Self {
        let lora_models: Vec<LoraEntry> = serde_json::from_value(r.lora_models).unwrap_or_default();
        Job {
            id: r.id,
            user_id: r.user_id,
            prompt: r.prompt,
            negative_prompt: r.negative_prompt,
            checkpoint_model: r.checkpoint_model,
            lora_models,
            width: r.width as u32,
            height: r.height as u32,
            batch_size: r.batch_size as u32,
            sampler_params: SamplerParams {
                steps: r.sampler_steps as u32,
                cfg: r.sampler_cfg,
                seed: r.sampler_seed,
                sampler: r.sampler_name,
                scheduler: r.sampler_scheduler,
            },
            backend: parse_backend_kind(&r.backend),
            state: parse_job_state(&r.state),
            state_version: r.state_version,
            retries: r.retries as u32,
            created_at: r.created_at,
            started_at: r.started_at,
            completed_at: r.completed_at,
            external_prompt_id: r.external_prompt_id,
            error_message: r.error_message,
            content_id: r.content_id,
        }
    }
}

// ── PgContentRow ──────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PgContentRow {
    pub id: i64,
    pub source: String,
    pub title: String,
    pub content_type: String,
    pub path: String,
    pub alt_paths: serde_json::Value,
    pub prompt: String,
    pub creator_id: Uuid,
    pub quality_score: Option<f32>,
    pub is_private: bool,
    pub item_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PgContentRow> for ContentRow {
    fn from(r: PgContentRow) -> Self {
        ContentRow {
            id: r.id,
            source: parse_source(&r.source),
            title: r.title,
            content_type: r.content_type,
            path: r.path,
            alt_paths: serde_json::from_value(r.alt_paths).unwrap_or_default(),
            prompt: r.prompt,
            creator_id: r.creator_id,
            quality_score: r.quality_score,
            is_private: r.is_private,
            item_metadata: r.item_metadata,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// ── PgTagRow ──────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PgTagRow {
    pub id: Uuid,
    pub name: String,
}

impl From<PgTagRow> for Tag {
    fn from(r: PgTagRow) -> Self {
        Tag {
            id: r.id,
            name: r.name,
        }
    }
}

// ── PgTagCardinalityRow ───────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PgTagCardinalityRow {
    pub tag_id: Uuid,
    pub source: String,
    pub distinct_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<PgTagCardinalityRow> for TagCardinality {
    fn from(r: PgTagCardinalityRow) -> Self {
        TagCardinality {
            tag_id: r.tag_id,
            source: parse_source(&r.source),
            distinct_count: r.distinct_count,
            updated_at: r.updated_at,
        }
    }
}

// ── PgGenSourceStatsRow ───────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PgGenSourceStatsRow {
    pub user_id: Option<Uuid>,
    pub source: String,
    pub count: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<PgGenSourceStatsRow> for GenSourceStats {
    fn from(r: PgGenSourceStatsRow) -> Self {
        GenSourceStats {
            user_id: r.user_id,
            source: parse_source(&r.source),
            count: r.count,
            updated_at: r.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_falls_back_to_failed_on_unknown() {
        assert_eq!(parse_job_state("bogus"), JobState::Failed);
    }

    #[test]
    fn source_falls_back_to_items_on_unknown() {
        assert_eq!(parse_source("bogus"), Source::Items);
    }

    #[test]
    fn backend_kind_round_trips() {
        for k in [BackendKind::Primary, BackendKind::Mock] {
            assert_eq!(parse_backend_kind(encode_backend_kind(k)), k);
        }
    }

    #[test]
    fn job_state_round_trips() {
        for s in [
            JobState::Pending,
            JobState::Running,
            JobState::Retrying,
            JobState::Completed,
            JobState::Failed,
            JobState::Cancelled,
        ] {
            assert_eq!(parse_job_state(encode_job_state(s)), s);
        }
    }

    #[test]
    fn job_row_converts_to_core_job() {
        let row = PgJobRow {
            id: 1,
            user_id: Uuid::new_v4(),
            prompt: "a cat".into(),
            negative_prompt: None,
            checkpoint_model: "default.safetensors".into(),
            lora_models: serde_json::json!([]),
            width: 512,
            height: 512,
            batch_size: 1,
            sampler_steps: 20,
            sampler_cfg: 7.0,
            sampler_seed: 42,
            sampler_name: "euler".into(),
            sampler_scheduler: "normal".into(),
            backend: "primary".into(),
            state: "pending".into(),
            state_version: 0,
            retries: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            external_prompt_id: None,
            error_message: None,
            content_id: None,
        };
        let job: Job = row.into();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.backend, BackendKind::Primary);
        assert_eq!(job.sampler_params.seed, 42);
    }

    #[test]
    fn content_row_converts_preserving_alt_paths() {
        let row = PgContentRow {
            id: 7,
            source: "items".into(),
            title: "render".into(),
            content_type: "image/png".into(),
            path: "/out/7.png".into(),
            alt_paths: serde_json::json!({"thumbnail": "/out/7_thumb.png"}),
            prompt: "a cat".into(),
            creator_id: Uuid::new_v4(),
            quality_score: Some(0.8),
            is_private: false,
            item_metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let content: ContentRow = row.into();
        assert_eq!(content.source, Source::Items);
        assert_eq!(
            content.alt_paths.get("thumbnail").map(String::as_str),
            Some("/out/7_thumb.png")
        );
    }
}
