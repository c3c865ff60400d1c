//! List CRUD and sync-trigger handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::dto::{ListDto, ListRequest};
use crate::api::state::AppState;
use crate::error::{Error, Result};
use crate::event_hub::topics;
use crate::types::{ListId, TaskType};

/// GET /api/v1/lists - List all monitored lists
#[utoipa::path(
    get,
    path = "/api/v1/lists",
    tag = "lists",
    responses((status = 200, description = "All lists", body = Vec<ListDto>))
)]
pub async fn list_lists(State(state): State<AppState>) -> Result<Json<Vec<ListDto>>> {
    let lists = state.engine.store.list_lists(false).await?;
    Ok(Json(lists.into_iter().map(ListDto::from).collect()))
}

/// GET /api/v1/lists/{id} - Fetch one list
#[utoipa::path(
    get,
    path = "/api/v1/lists/{id}",
    tag = "lists",
    params(("id" = i64, Path, description = "List ID")),
    responses(
        (status = 200, description = "List", body = ListDto),
        (status = 404, description = "List not found")
    )
)]
pub async fn get_list(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ListDto>> {
    let list = state
        .engine
        .store
        .get_list(ListId(id))
        .await?
        .ok_or_else(|| Error::NotFound(format!("list {id}")))?;
    Ok(Json(list.into()))
}

/// POST /api/v1/lists - Add a list to monitor
#[utoipa::path(
    post,
    path = "/api/v1/lists",
    tag = "lists",
    request_body = ListRequest,
    responses((status = 201, description = "List created", body = ListDto))
)]
pub async fn create_list(
    State(state): State<AppState>,
    Json(body): Json<ListRequest>,
) -> Result<(StatusCode, Json<ListDto>)> {
    let list = state.engine.store.create_list(body.into()).await?;
    state.hub.publish(topics::LISTS).await;
    Ok((StatusCode::CREATED, Json(list.into())))
}

/// PUT /api/v1/lists/{id} - Replace a list's settings
#[utoipa::path(
    put,
    path = "/api/v1/lists/{id}",
    tag = "lists",
    params(("id" = i64, Path, description = "List ID")),
    request_body = ListRequest,
    responses(
        (status = 200, description = "List updated", body = ListDto),
        (status = 404, description = "List not found")
    )
)]
pub async fn update_list(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ListRequest>,
) -> Result<Json<ListDto>> {
    let list = state.engine.store.update_list(ListId(id), body.into()).await?;
    state.hub.publish(topics::LISTS).await;
    Ok(Json(list.into()))
}

/// DELETE /api/v1/lists/{id} - Mark a list for deletion
///
/// Sets the `deleting` flag rather than removing the row outright, so any
/// in-flight sync/download tasks referencing it are left to finish or fail
/// naturally instead of racing a hard delete.
#[utoipa::path(
    delete,
    path = "/api/v1/lists/{id}",
    tag = "lists",
    params(("id" = i64, Path, description = "List ID")),
    responses((status = 204, description = "List marked for deletion"))
)]
pub async fn delete_list(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state.engine.store.mark_list_deleting(ListId(id)).await?;
    state.hub.publish(topics::LISTS).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/lists/{id}/sync - Enqueue an immediate sync
#[utoipa::path(
    post,
    path = "/api/v1/lists/{id}/sync",
    tag = "lists",
    params(("id" = i64, Path, description = "List ID")),
    responses(
        (status = 202, description = "Sync enqueued"),
        (status = 409, description = "A sync is already active for this list")
    )
)]
pub async fn sync_list(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state
        .engine
        .store
        .get_list(ListId(id))
        .await?
        .ok_or_else(|| Error::NotFound(format!("list {id}")))?;

    let max_retries = state.config.engine.retry.max_attempts as i32;
    match state.engine.enqueue(TaskType::Sync, id, max_retries).await? {
        Some(_) => Ok(StatusCode::ACCEPTED),
        None => Err(Error::Conflict(format!("a sync is already active for list {id}"))),
    }
}
