//! Content partition layer (C3) and the tag-filtered gallery read (C4 + C5).
//!
//! Reads always go through the `content_all` parent so a single keyset
//! query sees both `items` and `auto` rows; writes target `items`
//! explicitly (`insert_item` never writes `auto`, per the ingestion-only
//! resolution of the Open Question in §9). The three `Strategy` variants
//! chosen by `genonaut_core::planner::choose_strategy` are translated to
//! SQL here — the planner itself never builds a query string.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use genonaut_core::cursor::Cursor;
use genonaut_core::error::GenonautError;
use genonaut_core::planner::{Strategy, TagFilter};
use genonaut_core::ports::{ContentStore, Page, Result};
use genonaut_core::types::{ContentRow, NewContentRow, Source};

use crate::sqlx_types::{encode_source, parse_source, PgContentRow};

#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
    planner_cfg: genonaut_core::planner::PlannerConfig,
}

const CONTENT_COLUMNS: &str = "id, source::text AS source, title, content_type, path, \
     alt_paths, prompt, creator_id, quality_score, is_private, item_metadata, \
     created_at, updated_at";

impl PgContentStore {
    pub fn new(pool: PgPool, planner_cfg: genonaut_core::planner::PlannerConfig) -> Self {
        Self { pool, planner_cfg }
    }

    async fn cardinality(&self, tag_id: Uuid) -> Option<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT distinct_count FROM tag_cardinality_stats
             WHERE tag_id = $1
             ORDER BY distinct_count DESC
             LIMIT 1",
        )
        .bind(tag_id)
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten()
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn insert_item(&self, row: NewContentRow) -> Result<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        let alt_paths_json = serde_json::to_value(&row.alt_paths)
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO items (
                title, content_type, path, alt_paths, prompt, creator_id,
                is_private, item_metadata
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&row.title)
        .bind(&row.content_type)
        .bind(&row.path)
        .bind(alt_paths_json)
        .bind(&row.prompt)
        .bind(row.creator_id)
        .bind(row.is_private)
        .bind(&row.item_metadata)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        for tag_name in &row.tags {
            let tag_id: Uuid = sqlx::query_scalar(
                "INSERT INTO tags (name) VALUES ($1)
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                 RETURNING id",
            )
            .bind(tag_name.to_lowercase())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

            sqlx::query(
                "INSERT INTO content_tags (content_id, source, tag_id) VALUES ($1, 'items', $2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        Ok(id)
    }

    async fn get(&self, id: i64, source: Source) -> Result<ContentRow> {
        let row = sqlx::query_as::<_, PgContentRow>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_all WHERE id = $1 AND source = $2"
        ))
        .bind(id)
        .bind(encode_source(source))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        row.map(Into::into)
            .ok_or_else(|| GenonautError::NotFound(format!("content {id}/{source} not found")))
    }

    async fn query(
        &self,
        filter: &TagFilter,
        creator_id: Option<Uuid>,
        cursor: Option<&Cursor>,
        limit: u32,
    ) -> Result<Page<ContentRow>> {
        if filter.is_vacuous() {
            return Ok(Page {
                items: vec![],
                next_cursor: None,
                has_next: false,
            });
        }

        let mut cardinalities = std::collections::HashMap::new();
        for &tag in &filter.tags {
            if let Some(c) = self.cardinality(tag).await {
                cardinalities.insert(tag, c);
            }
        }
        let strategy = genonaut_core::planner::choose_strategy(
            filter,
            |t| cardinalities.get(&t).copied(),
            &self.planner_cfg,
        );

        let rows = self
            .run_strategy(&strategy, filter, creator_id, cursor, limit + 1)
            .await?;

        let mut items: Vec<ContentRow> = rows.into_iter().map(Into::into).collect();
        let has_next = items.len() as u32 > limit;
        if has_next {
            items.truncate(limit as usize);
        }
        let next_cursor = if has_next {
            items
                .last()
                .map(|r| Cursor::new(r.created_at, r.id, r.source))
        } else {
            None
        };

        Ok(Page {
            items,
            next_cursor,
            has_next,
        })
    }
}

impl PgContentStore {
    async fn run_strategy(
        &self,
        strategy: &Strategy,
        filter: &TagFilter,
        creator_id: Option<Uuid>,
        cursor: Option<&Cursor>,
        fetch_limit: u32,
    ) -> Result<Vec<PgContentRow>> {
        let sources: Vec<&'static str> = filter.sources.iter().map(|s| s.as_str()).collect();
        let tag_ids: Vec<Uuid> = filter.tags.iter().copied().collect();

        let bind_created_at = cursor.map(|c| c.created_at);
        let bind_id = cursor.map(|c| c.id);

        match strategy {
            Strategy::Unfiltered => {
                self.query_unfiltered(&sources, creator_id, bind_created_at, bind_id, fetch_limit)
                    .await
            }
            Strategy::SelfJoin => {
                self.query_self_join(&sources, &tag_ids, creator_id, bind_created_at, bind_id, fetch_limit)
                    .await
            }
            Strategy::GroupHaving => {
                self.query_group_having(&sources, &tag_ids, creator_id, bind_created_at, bind_id, fetch_limit)
                    .await
            }
            Strategy::TwoPhaseSingleSeed { seed_tag } => {
                self.query_two_phase(&sources, &tag_ids, &[*seed_tag], creator_id, bind_created_at, bind_id, fetch_limit)
                    .await
            }
            Strategy::TwoPhaseDualSeed { seed_tags } => {
                self.query_two_phase(&sources, &tag_ids, seed_tags, creator_id, bind_created_at, bind_id, fetch_limit)
                    .await
            }
        }
    }

    async fn query_unfiltered(
        &self,
        sources: &[&'static str],
        creator_id: Option<Uuid>,
        cursor_ts: Option<chrono::DateTime<chrono::Utc>>,
        cursor_id: Option<i64>,
        fetch_limit: u32,
    ) -> Result<Vec<PgContentRow>> {
        sqlx::query_as::<_, PgContentRow>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_all c
             WHERE c.source::text = ANY($1)
               AND ($2::uuid IS NULL OR c.creator_id = $2)
               AND ($3::timestamptz IS NULL OR (c.created_at, c.id) < ($3, $4))
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT $5"
        ))
        .bind(sources)
        .bind(creator_id)
        .bind(cursor_ts)
        .bind(cursor_id.unwrap_or(0))
        .bind(fetch_limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))
    }

    /// K <= small_k_threshold: one junction self-join per required tag.
    async fn query_self_join(
        &self,
        sources: &[&'static str],
        tag_ids: &[Uuid],
        creator_id: Option<Uuid>,
        cursor_ts: Option<chrono::DateTime<chrono::Utc>>,
        cursor_id: Option<i64>,
        fetch_limit: u32,
    ) -> Result<Vec<PgContentRow>> {
        let mut joins = String::new();
        for (i, _) in tag_ids.iter().enumerate() {
            joins.push_str(&format!(
                " JOIN content_tags ct{i} ON ct{i}.content_id = c.id \
                  AND ct{i}.source = c.source AND ct{i}.tag_id = ${param}",
                i = i,
                param = i + 6
            ));
        }
        let sql = format!(
            "SELECT {CONTENT_COLUMNS} FROM content_all c
             {joins}
             WHERE c.source::text = ANY($1)
               AND ($2::uuid IS NULL OR c.creator_id = $2)
               AND ($3::timestamptz IS NULL OR (c.created_at, c.id) < ($3, $4))
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT $5"
        );
        let mut q = sqlx::query_as::<_, PgContentRow>(&sql)
            .bind(sources)
            .bind(creator_id)
            .bind(cursor_ts)
            .bind(cursor_id.unwrap_or(0))
            .bind(fetch_limit as i64);
        for tag in tag_ids {
            q = q.bind(tag);
        }
        q.fetch_all(&self.pool)
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))
    }

    /// `WHERE tag_id IN T GROUP BY content_id, source HAVING COUNT(DISTINCT tag_id) = K`.
    async fn query_group_having(
        &self,
        sources: &[&'static str],
        tag_ids: &[Uuid],
        creator_id: Option<Uuid>,
        cursor_ts: Option<chrono::DateTime<chrono::Utc>>,
        cursor_id: Option<i64>,
        fetch_limit: u32,
    ) -> Result<Vec<PgContentRow>> {
        let sql = format!(
            "WITH matched AS (
                SELECT content_id, source
                FROM content_tags
                WHERE tag_id = ANY($1) AND source::text = ANY($2)
                GROUP BY content_id, source
                HAVING COUNT(DISTINCT tag_id) = $3
             )
             SELECT {CONTENT_COLUMNS} FROM content_all c
             JOIN matched m ON m.content_id = c.id AND m.source = c.source
             WHERE ($4::uuid IS NULL OR c.creator_id = $4)
               AND ($5::timestamptz IS NULL OR (c.created_at, c.id) < ($5, $6))
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT $7"
        );
        sqlx::query_as::<_, PgContentRow>(&sql)
            .bind(tag_ids)
            .bind(sources)
            .bind(tag_ids.len() as i64)
            .bind(creator_id)
            .bind(cursor_ts)
            .bind(cursor_id.unwrap_or(0))
            .bind(fetch_limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))
    }

    /// Seed CTE over the rarest tag(s), then a group/having pass restricted
    /// to that much smaller candidate set (§4.5 Two-phase strategies).
    async fn query_two_phase(
        &self,
        sources: &[&'static str],
        tag_ids: &[Uuid],
        seed_tags: &[Uuid],
        creator_id: Option<Uuid>,
        cursor_ts: Option<chrono::DateTime<chrono::Utc>>,
        cursor_id: Option<i64>,
        fetch_limit: u32,
    ) -> Result<Vec<PgContentRow>> {
        // `seed` must be an intersection over `seed_tags`, not a union: for
        // the dual-seed case both rarest tags are already large on their own
        // (that's why a second seed was picked at all, per the planner's
        // two_phase_dual_seed_floor), so a union would only grow the
        // candidate set instead of narrowing it. `ORDER BY` before the
        // `LIMIT` makes the truncation deterministic instead of dropping an
        // arbitrary subset of valid matches on every call.
        let sql = format!(
            "WITH seed AS (
                SELECT content_id, source
                FROM content_tags
                WHERE tag_id = ANY($1) AND source::text = ANY($2)
                GROUP BY content_id, source
                HAVING COUNT(DISTINCT tag_id) = $3
                ORDER BY content_id, source
                LIMIT $4
             ),
             matched AS (
                SELECT ct.content_id, ct.source
                FROM content_tags ct
                JOIN seed s ON s.content_id = ct.content_id AND s.source = ct.source
                WHERE ct.tag_id = ANY($5)
                GROUP BY ct.content_id, ct.source
                HAVING COUNT(DISTINCT ct.tag_id) = $6
             )
             SELECT {CONTENT_COLUMNS} FROM content_all c
             JOIN matched m ON m.content_id = c.id AND m.source = c.source
             WHERE ($7::uuid IS NULL OR c.creator_id = $7)
               AND ($8::timestamptz IS NULL OR (c.created_at, c.id) < ($8, $9))
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT $10"
        );
        sqlx::query_as::<_, PgContentRow>(&sql)
            .bind(seed_tags)
            .bind(sources)
            .bind(seed_tags.len() as i64)
            .bind(self.planner_cfg.seed_candidate_cap)
            .bind(tag_ids)
            .bind(tag_ids.len() as i64)
            .bind(creator_id)
            .bind(cursor_ts)
            .bind(cursor_id.unwrap_or(0))
            .bind(fetch_limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_columns_cast_source_to_text() {
        assert!(CONTENT_COLUMNS.contains("source::text"));
    }

    #[test]
    fn source_encode_parse_round_trips() {
        for s in [Source::Items, Source::Auto] {
            assert_eq!(parse_source(encode_source(s)), s);
        }
    }
}
