//! Video read and download-trigger handlers.
//!
//! Videos are discovered by sync, never created directly through the API, so
//! there is no `create_video`/`update_video` pair here (contrast
//! [`crate::api::routes::lists`]).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::dto::VideoDto;
use crate::api::state::AppState;
use crate::error::{Error, Result};
use crate::types::{ListId, TaskType, VideoId};

/// GET /api/v1/lists/{list_id}/videos - List all videos discovered for a list
#[utoipa::path(
    get,
    path = "/api/v1/lists/{list_id}/videos",
    tag = "videos",
    params(("list_id" = i64, Path, description = "List ID")),
    responses((status = 200, description = "Videos in this list", body = Vec<VideoDto>))
)]
pub async fn list_videos(State(state): State<AppState>, Path(list_id): Path<i64>) -> Result<Json<Vec<VideoDto>>> {
    let videos = state.engine.store.list_videos_by_list(ListId(list_id)).await?;
    Ok(Json(videos.into_iter().map(VideoDto::from).collect()))
}

/// GET /api/v1/videos/{id} - Fetch one video
#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}",
    tag = "videos",
    params(("id" = i64, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Video", body = VideoDto),
        (status = 404, description = "Video not found")
    )
)]
pub async fn get_video(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<VideoDto>> {
    let video = state
        .engine
        .store
        .get_video(VideoId(id))
        .await?
        .ok_or_else(|| Error::NotFound(format!("video {id}")))?;
    Ok(Json(video.into()))
}

/// POST /api/v1/videos/{id}/download - Enqueue an immediate download
#[utoipa::path(
    post,
    path = "/api/v1/videos/{id}/download",
    tag = "videos",
    params(("id" = i64, Path, description = "Video ID")),
    responses(
        (status = 202, description = "Download enqueued"),
        (status = 404, description = "Video not found"),
        (status = 409, description = "A download is already active for this video")
    )
)]
pub async fn download_video(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state
        .engine
        .store
        .get_video(VideoId(id))
        .await?
        .ok_or_else(|| Error::NotFound(format!("video {id}")))?;

    let max_retries = state.config.engine.retry.max_attempts as i32;
    match state.engine.enqueue(TaskType::Download, id, max_retries).await? {
        Some(_) => Ok(StatusCode::ACCEPTED),
        None => Err(Error::Conflict(format!("a download is already active for video {id}"))),
    }
}
