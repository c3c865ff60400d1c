//! Download-permission schedule CRUD handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::dto::{ScheduleDto, ScheduleRequest};
use crate::api::state::AppState;
use crate::error::{Error, Result};
use crate::types::ScheduleId;

/// GET /api/v1/schedules - List all download-permission schedules
#[utoipa::path(
    get,
    path = "/api/v1/schedules",
    tag = "schedules",
    responses((status = 200, description = "All schedules", body = Vec<ScheduleDto>))
)]
pub async fn list_schedules(State(state): State<AppState>) -> Result<Json<Vec<ScheduleDto>>> {
    let schedules = state.engine.store.list_schedules().await?;
    Ok(Json(schedules.into_iter().map(ScheduleDto::from).collect()))
}

/// GET /api/v1/schedules/{id} - Fetch one schedule
#[utoipa::path(
    get,
    path = "/api/v1/schedules/{id}",
    tag = "schedules",
    params(("id" = i64, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule", body = ScheduleDto),
        (status = 404, description = "Schedule not found")
    )
)]
pub async fn get_schedule(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ScheduleDto>> {
    let schedule = state
        .engine
        .store
        .get_schedule(ScheduleId(id))
        .await?
        .ok_or_else(|| Error::NotFound(format!("schedule {id}")))?;
    Ok(Json(schedule.into()))
}

/// POST /api/v1/schedules - Create a schedule
#[utoipa::path(
    post,
    path = "/api/v1/schedules",
    tag = "schedules",
    request_body = ScheduleRequest,
    responses((status = 201, description = "Schedule created", body = ScheduleDto))
)]
pub async fn create_schedule(
    State(state): State<AppState>,
    Json(body): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleDto>)> {
    let schedule = state.engine.store.create_schedule(body.into()).await?;
    Ok((StatusCode::CREATED, Json(schedule.into())))
}

/// PUT /api/v1/schedules/{id} - Replace a schedule
#[utoipa::path(
    put,
    path = "/api/v1/schedules/{id}",
    tag = "schedules",
    params(("id" = i64, Path, description = "Schedule ID")),
    request_body = ScheduleRequest,
    responses(
        (status = 200, description = "Schedule updated", body = ScheduleDto),
        (status = 404, description = "Schedule not found")
    )
)]
pub async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ScheduleRequest>,
) -> Result<Json<ScheduleDto>> {
    let schedule = state.engine.store.update_schedule(ScheduleId(id), body.into()).await?;
    Ok(Json(schedule.into()))
}

/// DELETE /api/v1/schedules/{id} - Delete a schedule
#[utoipa::path(
    delete,
    path = "/api/v1/schedules/{id}",
    tag = "schedules",
    params(("id" = i64, Path, description = "Schedule ID")),
    responses((status = 204, description = "Schedule deleted"))
)]
pub async fn delete_schedule(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state.engine.store.delete_schedule(ScheduleId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
