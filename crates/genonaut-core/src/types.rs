//! Core domain types for the generation orchestrator and content store.
//! These are pure value types — no sqlx, no DB dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ── Enums ─────────────────────────────────────────────────────

/// Which generation backend a job is routed to (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Primary,
    Mock,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Mock => "mock",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(Self::Primary),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job lifecycle state (§4.1). `Retrying` is a transient sub-state of
/// `Running` used only to annotate progress events — it never appears as a
/// persisted terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "retrying" => Some(Self::Retrying),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a transition from `self` to `next` is allowed by the §4.1
    /// state diagram. Used to enforce the monotonicity invariant from §8.
    /// A state "staying" the same is always allowed — §4.1 step 4 describes
    /// exactly this ("store returned external id; transition stays
    /// running"), a patch-only write with no state change, which is never a
    /// backward move.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Retrying)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Retrying, Running)
                | (Retrying, Cancelled)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Content partition tag (§3, §4.4). Stored as a generated column in
/// Postgres; `Auto` rows are never written by this crate's orchestrator
/// (ingestion-only, per the §9 Open Question resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Items,
    Auto,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Items => "items",
            Self::Auto => "auto",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "items" => Some(Self::Items),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backend job status (§4.2), distinct from `JobState` — this is what the
/// backend reports, not the job's persisted lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

// ── Job ───────────────────────────────────────────────────────

/// One (lora_name, strength) entry applied on top of the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraEntry {
    pub name: String,
    pub strength: f32,
}

/// Sampler parameters for a single generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerParams {
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_cfg")]
    pub cfg: f32,
    /// Raw seed as submitted; `<= 0` means "generate one" (§4.1 Submit).
    #[serde(default)]
    pub seed: i64,
    #[serde(default = "default_sampler")]
    pub sampler: String,
    #[serde(default = "default_scheduler")]
    pub scheduler: String,
}

fn default_steps() -> u32 {
    20
}
fn default_cfg() -> f32 {
    7.0
}
fn default_sampler() -> String {
    "euler".to_string()
}
fn default_scheduler() -> String {
    "normal".to_string()
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            cfg: default_cfg(),
            seed: 0,
            sampler: default_sampler(),
            scheduler: default_scheduler(),
        }
    }
}

/// A generation job — the unit of work tracked by the job state machine (C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub user_id: Uuid,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub checkpoint_model: String,
    pub lora_models: Vec<LoraEntry>,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
    pub sampler_params: SamplerParams,
    pub backend: BackendKind,
    pub state: JobState,
    pub state_version: i64,
    pub retries: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub external_prompt_id: Option<String>,
    pub error_message: Option<String>,
    pub content_id: Option<i64>,
}

/// Input to `Submit` (§4.1). Width/height/batch_size/checkpoint fall back to
/// configured defaults when omitted — the worker applies `Config` defaults,
/// this type only carries what the caller actually sent. Unknown keys are
/// rejected rather than silently dropped, to catch schema drift at the door.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub checkpoint_model: Option<String>,
    #[serde(default)]
    pub lora_models: Vec<LoraEntry>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub batch_size: Option<u32>,
    pub sampler_params: Option<SamplerParams>,
    pub backend: Option<BackendKind>,
}

// ── Content ───────────────────────────────────────────────────

/// A produced asset row (§3 ContentRow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRow {
    pub id: i64,
    pub source: Source,
    pub title: String,
    pub content_type: String,
    pub path: String,
    /// label (e.g. "thumbnail", "1024") → path
    pub alt_paths: BTreeMap<String, String>,
    pub prompt: String,
    pub creator_id: Uuid,
    pub quality_score: Option<f32>,
    pub is_private: bool,
    pub item_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input to insert a new content row (C8 Output Materializer).
#[derive(Debug, Clone)]
pub struct NewContentRow {
    pub source: Source,
    pub title: String,
    pub content_type: String,
    pub path: String,
    pub alt_paths: BTreeMap<String, String>,
    pub prompt: String,
    pub creator_id: Uuid,
    pub is_private: bool,
    pub item_metadata: serde_json::Value,
    pub tags: Vec<String>,
}

// ── Tags ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    /// Unique, lower-cased.
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagEdge {
    pub parent_id: Uuid,
    pub child_id: Uuid,
}

// ── Statistics ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagCardinality {
    pub tag_id: Uuid,
    pub source: Source,
    pub distinct_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// `user_id = None` denotes the community row (§3 GenSourceStatsRow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenSourceStats {
    pub user_id: Option<Uuid>,
    pub source: Source,
    pub count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Response shape for `GET /content/stats/unified` (§4.9 / §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedStats {
    pub user_regular_count: i64,
    pub user_auto_count: i64,
    pub community_regular_count: i64,
    pub community_auto_count: i64,
}

// ── Progress ──────────────────────────────────────────────────

/// A single progress event published on a job's channel (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: i64,
    pub state: JobState,
    pub seq: u64,
    pub percent: Option<f32>,
    pub queue_position: Option<u32>,
    pub ts: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_transitions_are_monotonic() {
        assert!(JobState::Pending.can_transition_to(JobState::Running));
        assert!(JobState::Running.can_transition_to(JobState::Completed));
        assert!(JobState::Running.can_transition_to(JobState::Retrying));
        assert!(JobState::Retrying.can_transition_to(JobState::Running));
        assert!(!JobState::Completed.can_transition_to(JobState::Running));
        assert!(!JobState::Cancelled.can_transition_to(JobState::Running));
        assert!(!JobState::Pending.can_transition_to(JobState::Completed));
    }

    #[test]
    fn same_state_transition_is_always_allowed() {
        // §4.1 step 4: storing the external id is a patch, not a move.
        assert!(JobState::Running.can_transition_to(JobState::Running));
        assert!(JobState::Pending.can_transition_to(JobState::Pending));
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
    }

    #[test]
    fn backend_kind_round_trips_through_str() {
        for k in [BackendKind::Primary, BackendKind::Mock] {
            assert_eq!(BackendKind::from_str(k.as_str()), Some(k));
        }
        assert_eq!(BackendKind::from_str("bogus"), None);
    }
}
