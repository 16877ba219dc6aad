//! Generation backend client abstraction (C6) — §4.2.
//!
//! Polymorphic over the capability set `{submit, status, cancel,
//! fetch_output}`. Construction picks the concrete variant from the job's
//! `backend` choice; there is no inheritance hierarchy, only this trait and
//! two implementations.

pub mod mock;
pub mod primary;
pub mod types;

use async_trait::async_trait;

use genonaut_core::error::GenonautError;

pub use types::{
    resolve_output_path, BackendStatusKind, BackendStatusReport, OutputDescriptor,
    WorkflowSubmission,
};

pub type Result<T> = std::result::Result<T, GenonautError>;

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Submit a workflow; returns an opaque external prompt id.
    async fn submit(&self, workflow: &WorkflowSubmission) -> Result<String>;

    async fn status(&self, external_id: &str) -> Result<BackendStatusReport>;

    /// Best-effort cancel; callers transition to `cancelled` regardless of
    /// this call's outcome (§4.1 Cancel).
    async fn cancel(&self, external_id: &str) -> Result<()>;

    async fn fetch_output(&self, external_id: &str) -> Result<Vec<OutputDescriptor>>;

    /// Filesystem root output paths are resolved against (§4.2, §4.8).
    fn output_dir(&self) -> &std::path::Path;
}

pub use mock::MockBackend;
pub use primary::PrimaryBackend;
