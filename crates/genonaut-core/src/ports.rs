//! Storage port traits — implemented by `genonaut-db`.
//! Core logic depends only on these traits, never on sqlx directly.

use async_trait::async_trait;
use uuid::Uuid;

use crate::cursor::Cursor;
use crate::error::GenonautError;
use crate::planner::TagFilter;
use crate::types::*;

pub type Result<T> = std::result::Result<T, GenonautError>;

/// A page of results plus the cursor to fetch the next one (C5).
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
    pub has_next: bool,
}

/// C7 persistence: job CRUD and state transitions.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, user_id: Uuid, spec: NormalizedJobSpec) -> Result<Job>;
    async fn get(&self, job_id: i64) -> Result<Job>;

    /// List a user's own jobs, newest first, keyset-paginated (10.6 supplement).
    async fn list_for_user(
        &self,
        user_id: Uuid,
        cursor: Option<&Cursor>,
        limit: u32,
    ) -> Result<Page<Job>>;

    /// Optimistic-CAS transition: succeeds only if the row's `state_version`
    /// still equals `expected_version` (§5 ordering guarantee). Returns the
    /// updated job, or `GenonautError::Internal` on version mismatch — the
    /// caller (worker loop) treats that as "someone else already moved this
    /// job" and stops.
    async fn transition(
        &self,
        job_id: i64,
        expected_version: i64,
        next: JobState,
        patch: JobPatch,
    ) -> Result<Job>;

    /// Mark a job cancelled if it is still in `pending` or `running`;
    /// idempotent — a job already in a terminal state is left untouched and
    /// its current row is returned (§4.1 Cancel, §8 DELETE-is-no-op).
    async fn request_cancel(&self, job_id: i64) -> Result<Job>;

    /// Whether cancellation has been requested for a job still in flight —
    /// polled by the worker loop before each poll interval and before
    /// materialization (§5 Cancellation).
    async fn is_cancel_requested(&self, job_id: i64) -> Result<bool>;
}

/// Fields a state transition may update alongside `state` itself.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub external_prompt_id: Option<String>,
    pub error_message: Option<String>,
    pub content_id: Option<i64>,
    pub retries: Option<u32>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A job spec after `Submit`'s validation/normalization pass (§4.1).
#[derive(Debug, Clone)]
pub struct NormalizedJobSpec {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub checkpoint_model: String,
    pub lora_models: Vec<LoraEntry>,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
    pub sampler_params: SamplerParams,
    pub backend: BackendKind,
}

/// Durable job queue — the handoff between API and worker processes (§5).
/// `claim_next` must guarantee at-least-once delivery with exactly-one
/// in-flight worker per job (e.g. `FOR UPDATE SKIP LOCKED`).
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job_id: i64) -> Result<()>;
    async fn claim_next(&self, worker_id: &str) -> Result<Option<i64>>;
}

/// C3 Content Partition Layer: reads go through the logical parent,
/// writes target a specific child by `source`.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert a row into the `items` child and link its tags (C8). Returns
    /// the new content id. Never writes `source = auto` (ingestion-only,
    /// §9 Open Question).
    async fn insert_item(&self, row: NewContentRow) -> Result<i64>;

    async fn get(&self, id: i64, source: Source) -> Result<ContentRow>;

    /// Keyset-paginated gallery read (C4 + C5). `filter.tags` empty means
    /// unfiltered; `sources` empty means the empty result set with no DB
    /// call (§4.5 edge case) — callers should short-circuit before invoking
    /// this when `sources.is_empty()`.
    async fn query(
        &self,
        filter: &TagFilter,
        creator_id: Option<Uuid>,
        cursor: Option<&Cursor>,
        limit: u32,
    ) -> Result<Page<ContentRow>>;
}

/// C4 Tag Junction, independent of the planner's read path — tag creation
/// and linking used by the materializer and CLI tooling.
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn get_or_create(&self, name: &str) -> Result<Tag>;
    async fn link(&self, content_id: i64, source: Source, tag_ids: &[Uuid]) -> Result<()>;
}

/// C1/C2 statistics stores, read side and refresh side.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// `None` means no cardinality row exists yet for `(tag_id, source)` —
    /// the planner falls back to `fallback_default_count` (§4.5).
    async fn tag_cardinality(&self, tag_id: Uuid, source: Source) -> Result<Option<i64>>;

    /// Idempotent upsert of freshly computed cardinalities (C9).
    async fn refresh_tag_cardinality(&self) -> Result<u64>;

    async fn unified_stats(&self, user_id: Option<Uuid>) -> Result<UnifiedStats>;

    /// Idempotent upsert of freshly computed gen-source counts (C9).
    async fn refresh_gen_source_stats(&self) -> Result<u64>;
}
