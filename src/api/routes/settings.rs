//! Process-wide setting handlers: the pause flags and retention knob exposed
//! through [`crate::db::settings`], plus a generic key/value escape hatch.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::state::AppState;
use crate::db::{SETTINGS_DATA_RETENTION_DAYS, SETTINGS_DOWNLOAD_PAUSED, SETTINGS_SYNC_PAUSED, SETTINGS_WORKER_PAUSED};
use crate::error::Result;

/// Response body for `GET /settings`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsDto {
    /// All leasing withheld
    pub worker_paused: bool,
    /// Sync leasing withheld
    pub sync_paused: bool,
    /// Download leasing withheld
    pub download_paused: bool,
    /// Days to retain completed/failed tasks and history rows (0 = disabled)
    pub data_retention_days: u32,
}

/// Body accepted by `PATCH /settings`. Every field is optional; only the
/// ones present are written.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SettingsUpdateRequest {
    /// New value for `worker_paused`, if changing
    pub worker_paused: Option<bool>,
    /// New value for `sync_paused`, if changing
    pub sync_paused: Option<bool>,
    /// New value for `download_paused`, if changing
    pub download_paused: Option<bool>,
    /// New value for `data_retention_days`, if changing
    pub data_retention_days: Option<u32>,
}

/// A single raw key/value setting, for the generic escape hatch.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SettingValue {
    /// Raw stored value; absent when the key has never been set
    pub value: Option<String>,
}

/// GET /api/v1/settings - Fetch the known process-wide settings
#[utoipa::path(
    get,
    path = "/api/v1/settings",
    tag = "settings",
    responses((status = 200, description = "Current settings", body = SettingsDto))
)]
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<SettingsDto>> {
    let store = &state.engine.store;
    Ok(Json(SettingsDto {
        worker_paused: store.get_bool_setting(SETTINGS_WORKER_PAUSED).await?,
        sync_paused: store.get_bool_setting(SETTINGS_SYNC_PAUSED).await?,
        download_paused: store.get_bool_setting(SETTINGS_DOWNLOAD_PAUSED).await?,
        data_retention_days: store.get_data_retention_days().await?,
    }))
}

/// PATCH /api/v1/settings - Update one or more known settings
#[utoipa::path(
    patch,
    path = "/api/v1/settings",
    tag = "settings",
    request_body = SettingsUpdateRequest,
    responses((status = 200, description = "Settings updated", body = SettingsDto))
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Json(body): Json<SettingsUpdateRequest>,
) -> Result<Json<SettingsDto>> {
    let store = &state.engine.store;
    if let Some(v) = body.worker_paused {
        store.set_bool_setting(SETTINGS_WORKER_PAUSED, v).await?;
    }
    if let Some(v) = body.sync_paused {
        store.set_bool_setting(SETTINGS_SYNC_PAUSED, v).await?;
    }
    if let Some(v) = body.download_paused {
        store.set_bool_setting(SETTINGS_DOWNLOAD_PAUSED, v).await?;
    }
    if let Some(v) = body.data_retention_days {
        store.set_setting(SETTINGS_DATA_RETENTION_DAYS, &v.to_string()).await?;
    }
    get_settings(State(state)).await
}

/// GET /api/v1/settings/{key} - Fetch an arbitrary raw setting
#[utoipa::path(
    get,
    path = "/api/v1/settings/{key}",
    tag = "settings",
    params(("key" = String, Path, description = "Setting key")),
    responses((status = 200, description = "Setting value, `value` is null if unset", body = SettingValue))
)]
pub async fn get_raw_setting(State(state): State<AppState>, Path(key): Path<String>) -> Result<Json<SettingValue>> {
    let value = state.engine.store.get_setting(&key).await?;
    Ok(Json(SettingValue { value }))
}

/// PUT /api/v1/settings/{key} - Set an arbitrary raw setting
#[utoipa::path(
    put,
    path = "/api/v1/settings/{key}",
    tag = "settings",
    params(("key" = String, Path, description = "Setting key")),
    request_body = SettingValue,
    responses((status = 204, description = "Setting stored"))
)]
pub async fn put_raw_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SettingValue>,
) -> Result<StatusCode> {
    let value = body.value.unwrap_or_default();
    state.engine.store.set_setting(&key, &value).await?;
    Ok(StatusCode::NO_CONTENT)
}
