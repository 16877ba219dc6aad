//! genonaut-db — PostgreSQL implementations of the `genonaut-core` port
//! traits: the content partition layer (C3), the tag junction and three
//! planner query strategies (C4), job persistence and the durable queue
//! (C7), and the two statistics tables (C1/C2).

pub mod content_store;
pub mod job_store;
pub mod sqlx_types;
pub mod stats_store;
pub mod tag_store;

pub use content_store::PgContentStore;
pub use job_store::{PgJobQueue, PgJobStore};
pub use stats_store::PgStatsStore;
pub use tag_store::PgTagStore;

use sqlx::PgPool;

/// Convenience struct that constructs all Postgres adapters from a single pool.
pub struct PgStores {
    pub jobs: PgJobStore,
    pub job_queue: PgJobQueue,
    pub content: PgContentStore,
    pub tags: PgTagStore,
    pub stats: PgStatsStore,
}

impl PgStores {
    pub fn new(pool: PgPool, planner_cfg: genonaut_core::planner::PlannerConfig) -> Self {
        Self {
            jobs: PgJobStore::new(pool.clone()),
            job_queue: PgJobQueue::new(pool.clone()),
            content: PgContentStore::new(pool.clone(), planner_cfg),
            tags: PgTagStore::new(pool.clone()),
            stats: PgStatsStore::new(pool),
        }
    }
}
