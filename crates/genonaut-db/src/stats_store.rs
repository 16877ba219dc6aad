//! Statistics stores (C1/C2): tag cardinality and gen-source counts. The
//! read side is a plain lookup the planner uses to pick a strategy; the
//! refresh side recomputes from the source tables and upserts idempotently,
//! the same `ON CONFLICT DO UPDATE` shape the teacher's batch-publish path
//! uses for `sem_reg.snapshots`.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use genonaut_core::error::GenonautError;
use genonaut_core::ports::{Result, StatsStore};
use genonaut_core::types::{Source, UnifiedStats};

use crate::sqlx_types::encode_source;

/// Advisory lock key serializing the two refresh operations against each
/// other — the CLI's on-demand `refresh-*` subcommands and the background
/// `StatsRefreshRunner` tick both end up here, and §4.9/§9 require the
/// refresh to be a single non-overlapping task.
const STATS_REFRESH_LOCK_KEY: i64 = 0x_5354_4154_5352_4546; // "STATSREF"

#[derive(Clone)]
pub struct PgStatsStore {
    pool: PgPool,
}

impl PgStatsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Read the cached count for `(owner, source)`; if `gen_source_stats`
    /// has no row yet (before the first scheduled refresh, or for a
    /// brand-new user) fall back to a live `COUNT(*)` so the read side never
    /// reports a spurious zero for content that genuinely exists.
    async fn owner_count_with_fallback(&self, owner: Option<Uuid>, source: Source) -> Result<i64> {
        let cached: Option<i64> = sqlx::query_scalar(
            "SELECT count FROM gen_source_stats
             WHERE user_id IS NOT DISTINCT FROM $1 AND source = $2",
        )
        .bind(owner)
        .bind(encode_source(source))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        match cached {
            Some(count) => Ok(count),
            None => self.live_count(owner, source).await,
        }
    }

    async fn live_count(&self, owner: Option<Uuid>, source: Source) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM content_all
             WHERE source = $1 AND ($2::uuid IS NULL OR creator_id = $2)",
        )
        .bind(encode_source(source))
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))
    }

    /// Transaction-scoped advisory lock — released automatically on commit
    /// or rollback, so a crashed refresh never leaves the lock held.
    async fn try_acquire_refresh_lock(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>) -> Result<bool> {
        sqlx::query_scalar("SELECT pg_try_advisory_xact_lock($1)")
            .bind(STATS_REFRESH_LOCK_KEY)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))
    }
}

#[async_trait]
impl StatsStore for PgStatsStore {
    async fn tag_cardinality(&self, tag_id: Uuid, source: Source) -> Result<Option<i64>> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT distinct_count FROM tag_cardinality_stats WHERE tag_id = $1 AND source = $2",
        )
        .bind(tag_id)
        .bind(encode_source(source))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        Ok(count)
    }

    async fn refresh_tag_cardinality(&self) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        if !Self::try_acquire_refresh_lock(&mut tx).await? {
            tracing::warn!("stats refresh already in progress, skipping tag cardinality refresh");
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO tag_cardinality_stats (tag_id, source, distinct_count, updated_at)
            SELECT tag_id, source, COUNT(DISTINCT content_id), now()
            FROM content_tags
            GROUP BY tag_id, source
            ON CONFLICT (tag_id, source) DO UPDATE SET
                distinct_count = EXCLUDED.distinct_count,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        tx.commit()
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        Ok(result.rows_affected())
    }

    async fn unified_stats(&self, user_id: Option<Uuid>) -> Result<UnifiedStats> {
        let (user_regular_count, user_auto_count) = match user_id {
            Some(_) => (
                self.owner_count_with_fallback(user_id, Source::Items).await?,
                self.owner_count_with_fallback(user_id, Source::Auto).await?,
            ),
            None => (0, 0),
        };
        let (community_regular_count, community_auto_count) = (
            self.owner_count_with_fallback(None, Source::Items).await?,
            self.owner_count_with_fallback(None, Source::Auto).await?,
        );

        Ok(UnifiedStats {
            user_regular_count,
            user_auto_count,
            community_regular_count,
            community_auto_count,
        })
    }

    async fn refresh_gen_source_stats(&self) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        if !Self::try_acquire_refresh_lock(&mut tx).await? {
            tracing::warn!("stats refresh already in progress, skipping gen-source stats refresh");
            return Ok(0);
        }

        // Per-owner rows.
        let per_owner = sqlx::query(
            r#"
            INSERT INTO gen_source_stats (user_id, source, count, updated_at)
            SELECT creator_id, source, COUNT(*), now()
            FROM content_all
            GROUP BY creator_id, source
            ON CONFLICT (user_id, source) WHERE user_id IS NOT NULL DO UPDATE SET
                count = EXCLUDED.count,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        // Community row (`user_id IS NULL`) — includes all content regardless
        // of owner, per the §9 Open Question resolution.
        let community = sqlx::query(
            r#"
            INSERT INTO gen_source_stats (user_id, source, count, updated_at)
            SELECT NULL, source, COUNT(*), now()
            FROM content_all
            GROUP BY source
            ON CONFLICT (user_id, source) WHERE user_id IS NULL DO UPDATE SET
                count = EXCLUDED.count,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        tx.commit()
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        Ok(per_owner.rows_affected() + community.rows_affected())
    }
}
