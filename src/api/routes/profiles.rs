//! Profile CRUD handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::dto::{ProfileDto, ProfileRequest};
use crate::api::state::AppState;
use crate::error::{Error, Result};
use crate::types::ProfileId;

/// GET /api/v1/profiles - List all profiles
#[utoipa::path(
    get,
    path = "/api/v1/profiles",
    tag = "profiles",
    responses((status = 200, description = "All profiles", body = Vec<ProfileDto>))
)]
pub async fn list_profiles(State(state): State<AppState>) -> Result<Json<Vec<ProfileDto>>> {
    let profiles = state.engine.store.list_profiles().await?;
    Ok(Json(profiles.into_iter().map(ProfileDto::from).collect()))
}

/// GET /api/v1/profiles/{id} - Fetch one profile
#[utoipa::path(
    get,
    path = "/api/v1/profiles/{id}",
    tag = "profiles",
    params(("id" = i64, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Profile", body = ProfileDto),
        (status = 404, description = "Profile not found")
    )
)]
pub async fn get_profile(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ProfileDto>> {
    let profile = state
        .engine
        .store
        .get_profile(ProfileId(id))
        .await?
        .ok_or_else(|| Error::NotFound(format!("profile {id}")))?;
    Ok(Json(profile.into()))
}

/// POST /api/v1/profiles - Create a profile
#[utoipa::path(
    post,
    path = "/api/v1/profiles",
    tag = "profiles",
    request_body = ProfileRequest,
    responses((status = 201, description = "Profile created", body = ProfileDto))
)]
pub async fn create_profile(
    State(state): State<AppState>,
    Json(body): Json<ProfileRequest>,
) -> Result<(StatusCode, Json<ProfileDto>)> {
    let profile = state.engine.store.create_profile(body.into()).await?;
    Ok((StatusCode::CREATED, Json(profile.into())))
}

/// PUT /api/v1/profiles/{id} - Replace a profile
#[utoipa::path(
    put,
    path = "/api/v1/profiles/{id}",
    tag = "profiles",
    params(("id" = i64, Path, description = "Profile ID")),
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileDto),
        (status = 404, description = "Profile not found")
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ProfileRequest>,
) -> Result<Json<ProfileDto>> {
    let profile = state.engine.store.update_profile(ProfileId(id), body.into()).await?;
    Ok(Json(profile.into()))
}

/// DELETE /api/v1/profiles/{id} - Delete a profile
#[utoipa::path(
    delete,
    path = "/api/v1/profiles/{id}",
    tag = "profiles",
    params(("id" = i64, Path, description = "Profile ID")),
    responses((status = 204, description = "Profile deleted"))
)]
pub async fn delete_profile(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state.engine.store.delete_profile(ProfileId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
