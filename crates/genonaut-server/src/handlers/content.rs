//! Gallery read and aggregate statistics endpoints (§6, C4/C5, C1/C2).

use std::collections::BTreeSet;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use genonaut_core::cursor::Cursor;
use genonaut_core::error::GenonautError;
use genonaut_core::planner::TagFilter;
use genonaut_core::types::Source;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    #[serde(default)]
    pub tags: Vec<Uuid>,
    pub sources: Option<String>,
    pub user_id: Option<Uuid>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

pub async fn gallery(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    if query.limit == Some(0) {
        return Err(GenonautError::Validation("limit must be greater than 0".into()).into());
    }
    let sources = parse_sources(query.sources.as_deref());
    let cursor = query.cursor.as_deref().map(Cursor::decode).transpose()?;
    let limit = query
        .limit
        .unwrap_or(state.config.pagination_default_page_size)
        .min(state.config.pagination_max_page_size);

    // §4.5 edge case: an explicit but empty `sources` selection is the empty
    // result set with no DB call.
    if sources.is_empty() {
        return Ok(Json(json!({
            "items": Vec::<serde_json::Value>::new(),
            "next_cursor": null,
            "has_next": false,
        })));
    }

    let filter = TagFilter {
        tags: query.tags.into_iter().collect(),
        sources,
    };

    let page = state
        .content
        .query(&filter, query.user_id, cursor.as_ref(), limit)
        .await?;

    Ok(Json(json!({
        "items": page.items,
        "next_cursor": page.next_cursor.map(|c| c.encode()),
        "has_next": page.has_next,
    })))
}

fn parse_sources(raw: Option<&str>) -> BTreeSet<Source> {
    match raw {
        None => BTreeSet::from([Source::Items, Source::Auto]),
        Some(csv) => csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(Source::from_str)
            .collect(),
    }
}

#[derive(Debug, Deserialize)]
pub struct UnifiedStatsQuery {
    pub user_id: Option<Uuid>,
}

pub async fn unified_stats(
    State(state): State<AppState>,
    Query(query): Query<UnifiedStatsQuery>,
) -> Result<Json<genonaut_core::types::UnifiedStats>, AppError> {
    Ok(Json(state.stats.unified_stats(query.user_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_sources_means_both_partitions() {
        assert_eq!(parse_sources(None), BTreeSet::from([Source::Items, Source::Auto]));
    }

    #[test]
    fn empty_sources_csv_means_empty_set() {
        assert_eq!(parse_sources(Some("")), BTreeSet::new());
    }

    #[test]
    fn unknown_source_names_are_dropped() {
        assert_eq!(parse_sources(Some("items,bogus")), BTreeSet::from([Source::Items]));
    }
}
