//! Tag junction writes (C4), independent of the planner's read path — used
//! by the output materializer (C8) and CLI tooling that needs to attach
//! tags to content outside the `insert_item` happy path.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use genonaut_core::error::GenonautError;
use genonaut_core::ports::{Result, TagStore};
use genonaut_core::types::{Source, Tag};

use crate::sqlx_types::{encode_source, PgTagRow};

#[derive(Clone)]
pub struct PgTagStore {
    pool: PgPool,
}

impl PgTagStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagStore for PgTagStore {
    async fn get_or_create(&self, name: &str) -> Result<Tag> {
        let row = sqlx::query_as::<_, PgTagRow>(
            "INSERT INTO tags (name) VALUES ($1)
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
             RETURNING id, name",
        )
        .bind(name.to_lowercase())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GenonautError::Internal(anyhow!(e)))?;

        Ok(row.into())
    }

    async fn link(&self, content_id: i64, source: Source, tag_ids: &[Uuid]) -> Result<()> {
        if tag_ids.is_empty() {
            return Ok(());
        }
        let source_str = encode_source(source);
        for tag_id in tag_ids {
            sqlx::query(
                "INSERT INTO content_tags (content_id, source, tag_id) VALUES ($1, $2, $3)
                 ON CONFLICT DO NOTHING",
            )
            .bind(content_id)
            .bind(source_str)
            .bind(tag_id)
            .execute(&self.pool)
            .await
            .map_err(|e| GenonautError::Internal(anyhow!(e)))?;
        }
        Ok(())
    }
}
