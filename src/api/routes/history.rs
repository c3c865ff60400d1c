//! Audit history read handlers.

use axum::extract::{Path, Query, State};
use axum::Json;

use crate::api::dto::{HistoryEntryDto, PageQuery};
use crate::api::state::AppState;
use crate::error::Result;
use crate::types::ListId;

/// GET /api/v1/history - Query history across all lists, newest first
#[utoipa::path(
    get,
    path = "/api/v1/history",
    tag = "history",
    params(PageQuery),
    responses((status = 200, description = "History entries, newest first", body = Vec<HistoryEntryDto>))
)]
pub async fn list_history(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<HistoryEntryDto>>> {
    let entries = state.engine.store.query_history(None, page.limit, page.offset).await?;
    Ok(Json(entries.into_iter().map(HistoryEntryDto::from).collect()))
}

/// GET /api/v1/lists/{list_id}/history - Query history scoped to one list
#[utoipa::path(
    get,
    path = "/api/v1/lists/{list_id}/history",
    tag = "history",
    params(("list_id" = i64, Path, description = "List ID"), PageQuery),
    responses((status = 200, description = "History entries for this list, newest first", body = Vec<HistoryEntryDto>))
)]
pub async fn list_history_for_list(
    State(state): State<AppState>,
    Path(list_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<HistoryEntryDto>>> {
    let entries = state
        .engine
        .store
        .query_history(Some(ListId(list_id)), page.limit, page.offset)
        .await?;
    Ok(Json(entries.into_iter().map(HistoryEntryDto::from).collect()))
}
