//! Task queue read/control handlers: list, inspect, cancel, retry, and the
//! engine-wide pause/resume/stats surface.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::api::dto::{EngineStatsDto, PageQuery, TaskDto, TaskLogDto};
use crate::api::state::AppState;
use crate::engine::PauseScope;
use crate::error::Result;
use crate::types::{TaskId, TaskStatus, TaskType};

/// Query params accepted by `GET /tasks`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TaskListQuery {
    /// Filter to a single status; omit to return tasks in any state
    pub status: Option<TaskStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// Body accepted by `POST /engine/pause` and `POST /engine/resume`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PauseScopeRequest {
    /// One of `all`, `sync`, `download`
    pub scope: PauseScopeDto,
}

/// Wire form of [`crate::engine::PauseScope`].
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PauseScopeDto {
    /// Both pools
    All,
    /// Sync pool only
    Sync,
    /// Download pool only
    Download,
}

impl From<PauseScopeDto> for PauseScope {
    fn from(scope: PauseScopeDto) -> Self {
        match scope {
            PauseScopeDto::All => PauseScope::All,
            PauseScopeDto::Sync => PauseScope::Sync,
            PauseScopeDto::Download => PauseScope::Download,
        }
    }
}

/// GET /api/v1/tasks - List tasks, optionally filtered by status
///
/// Resolves each task's `entity_name` in two batched queries (one per
/// task_type present in the page) rather than one lookup per row.
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    tag = "tasks",
    params(TaskListQuery),
    responses((status = 200, description = "Tasks", body = Vec<TaskDto>))
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Vec<TaskDto>>> {
    let tasks = state.engine.store.list_tasks(query.status, query.limit).await?;
    Ok(Json(resolve_task_names(&state, tasks).await?))
}

/// GET /api/v1/tasks/{id} - Fetch one task
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = TaskDto),
        (status = 404, description = "Task not found")
    )
)]
pub async fn get_task(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<TaskDto>> {
    let task = state
        .engine
        .store
        .get_task(TaskId(id))
        .await?
        .ok_or_else(|| crate::error::Error::Task(crate::error::TaskError::NotFound { id }))?;
    let mut named = resolve_task_names(&state, vec![task]).await?;
    Ok(Json(named.remove(0)))
}

/// GET /api/v1/tasks/{id}/logs - Fetch the per-attempt audit trail for a task
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}/logs",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses((status = 200, description = "Task logs, oldest first", body = Vec<TaskLogDto>))
)]
pub async fn get_task_logs(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Vec<TaskLogDto>>> {
    let logs = state.engine.store.list_task_logs(TaskId(id)).await?;
    let dtos = logs.into_iter().map(TaskLogDto::try_from).collect::<Result<Vec<_>>>()?;
    Ok(Json(dtos))
}

/// POST /api/v1/tasks/{id}/cancel - Cancel a pending/paused task
#[utoipa::path(
    post,
    path = "/api/v1/tasks/{id}/cancel",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task cancelled"),
        (status = 409, description = "Task is not in a cancellable state")
    )
)]
pub async fn cancel_task(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state.engine.cancel(TaskId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/tasks/{id}/retry - Reset a terminal task back to pending
#[utoipa::path(
    post,
    path = "/api/v1/tasks/{id}/retry",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task reset to pending"),
        (status = 409, description = "Task is not in a terminal state")
    )
)]
pub async fn retry_task(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state.engine.retry(TaskId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/engine/stats - Current worker pool occupancy and pause state
#[utoipa::path(
    get,
    path = "/api/v1/engine/stats",
    tag = "engine",
    responses((status = 200, description = "Engine stats", body = EngineStatsDto))
)]
pub async fn engine_stats(State(state): State<AppState>) -> Result<Json<EngineStatsDto>> {
    let stats = state.engine.get_stats().await?;
    Ok(Json(stats.into()))
}

/// POST /api/v1/engine/pause - Withhold future leases for a scope
#[utoipa::path(
    post,
    path = "/api/v1/engine/pause",
    tag = "engine",
    request_body = PauseScopeRequest,
    responses((status = 204, description = "Paused"))
)]
pub async fn pause_engine(
    State(state): State<AppState>,
    Json(body): Json<PauseScopeRequest>,
) -> Result<StatusCode> {
    state.engine.pause(body.scope.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/engine/resume - Clear a pause flag and wake the dispatcher
#[utoipa::path(
    post,
    path = "/api/v1/engine/resume",
    tag = "engine",
    request_body = PauseScopeRequest,
    responses((status = 204, description = "Resumed"))
)]
pub async fn resume_engine(
    State(state): State<AppState>,
    Json(body): Json<PauseScopeRequest>,
) -> Result<StatusCode> {
    state.engine.resume(body.scope.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Resolve `entity_name` for a page of tasks in at most two queries (one per
/// distinct [`TaskType`] present), rather than one round-trip per row.
async fn resolve_task_names(state: &AppState, tasks: Vec<crate::db::Task>) -> Result<Vec<TaskDto>> {
    let sync_ids: Vec<i64> = tasks.iter().filter(|t| t.task_type == TaskType::Sync).map(|t| t.entity_id).collect();
    let download_ids: Vec<i64> =
        tasks.iter().filter(|t| t.task_type == TaskType::Download).map(|t| t.entity_id).collect();

    // Kept as two separate maps, not merged into one: a sync task's
    // entity_id (a ListId) and a download task's entity_id (a VideoId) draw
    // from independent id spaces and can collide on the same integer.
    let sync_names = if sync_ids.is_empty() {
        HashMap::new()
    } else {
        state.engine.store.batch_get_entity_names(TaskType::Sync, &sync_ids).await?
    };
    let download_names = if download_ids.is_empty() {
        HashMap::new()
    } else {
        state.engine.store.batch_get_entity_names(TaskType::Download, &download_ids).await?
    };

    Ok(tasks
        .into_iter()
        .map(|t| {
            let name = match t.task_type {
                TaskType::Sync => sync_names.get(&t.entity_id).cloned(),
                TaskType::Download => download_names.get(&t.entity_id).cloned(),
            };
            TaskDto::from_task(t, name)
        })
        .collect())
}
