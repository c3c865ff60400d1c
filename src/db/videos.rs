//! Video CRUD operations.

use crate::error::StoreError;
use crate::types::{ListId, MediaType, VideoId};
use crate::{Error, Result};
use chrono::{TimeZone, Utc};
use sqlx::FromRow;
use std::collections::HashSet;
use std::str::FromStr;

use super::{NewVideo, Store, Video};

#[derive(Debug, Clone, FromRow)]
struct VideoRow {
    id: i64,
    list_id: i64,
    external_video_id: String,
    title: String,
    url: String,
    duration: Option<i64>,
    upload_date: Option<String>,
    thumbnail: Option<String>,
    description: Option<String>,
    extractor: String,
    media_type: String,
    labels: String,
    downloaded: bool,
    download_path: Option<String>,
    error_message: Option<String>,
    retry_count: i32,
    blacklisted: bool,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<VideoRow> for Video {
    type Error = Error;

    fn try_from(row: VideoRow) -> Result<Self> {
        Ok(Video {
            id: VideoId(row.id),
            list_id: ListId(row.list_id),
            external_video_id: row.external_video_id,
            title: row.title,
            url: row.url,
            duration: row.duration,
            upload_date: row.upload_date,
            thumbnail: row.thumbnail,
            description: row.description,
            extractor: row.extractor,
            media_type: MediaType::from_str(&row.media_type)?,
            labels: serde_json::from_str(&row.labels).unwrap_or(serde_json::Value::Null),
            downloaded: row.downloaded,
            download_path: row.download_path,
            error_message: row.error_message,
            retry_count: row.retry_count,
            blacklisted: row.blacklisted,
            created_at: timestamp(row.created_at),
            updated_at: timestamp(row.updated_at),
        })
    }
}

fn timestamp(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

const VIDEO_COLUMNS: &str = "id, list_id, external_video_id, title, url, duration, upload_date, \
    thumbnail, description, extractor, media_type, labels, downloaded, download_path, \
    error_message, retry_count, blacklisted, created_at, updated_at";

impl Store {
    /// Insert a new Video discovered during sync
    pub async fn insert_video(&self, video: &NewVideo) -> Result<Video> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO videos (
                list_id, external_video_id, title, url, duration, upload_date,
                thumbnail, description, extractor, media_type, blacklisted,
                error_message, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(video.list_id)
        .bind(&video.external_video_id)
        .bind(&video.title)
        .bind(&video.url)
        .bind(video.duration)
        .bind(&video.upload_date)
        .bind(&video.thumbnail)
        .bind(&video.description)
        .bind(&video.extractor)
        .bind(video.media_type.to_string())
        .bind(video.blacklisted)
        .bind(&video.blacklist_reason)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to insert video: {e}"))))?;

        let id = VideoId(result.last_insert_rowid());
        self.get_video(id)
            .await?
            .ok_or_else(|| Error::Store(StoreError::NotFound("video vanished after insert".into())))
    }

    /// Fetch a Video by ID
    pub async fn get_video(&self, id: VideoId) -> Result<Option<Video>> {
        let row = sqlx::query_as::<_, VideoRow>(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to get video: {e}"))))?;

        row.map(Video::try_from).transpose()
    }

    /// List every Video belonging to a List
    pub async fn list_videos_by_list(&self, list_id: ListId) -> Result<Vec<Video>> {
        let rows = sqlx::query_as::<_, VideoRow>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE list_id = ? ORDER BY created_at DESC"
        ))
        .bind(list_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to list videos: {e}"))))?;

        rows.into_iter().map(Video::try_from).collect()
    }

    /// The set of `external_video_id`s already known for a List, used by
    /// SyncHandler to tell the media backend what's new.
    pub async fn existing_external_ids(&self, list_id: ListId) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT external_video_id FROM videos WHERE list_id = ?")
            .bind(list_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to list external ids: {e}"))))?;

        Ok(ids.into_iter().collect())
    }

    /// Up to `limit` videos eligible for automatic download: not downloaded, not
    /// blacklisted, belonging to an auto_download-enabled List, and either never
    /// attempted or already past at least one retry.
    pub async fn find_downloadable(&self, limit: i64) -> Result<Vec<Video>> {
        let rows = sqlx::query_as::<_, VideoRow>(
            r#"
            SELECT v.id, v.list_id, v.external_video_id, v.title, v.url, v.duration,
                   v.upload_date, v.thumbnail, v.description, v.extractor, v.media_type,
                   v.labels, v.downloaded, v.download_path, v.error_message, v.retry_count,
                   v.blacklisted, v.created_at, v.updated_at
            FROM videos v
            JOIN lists l ON l.id = v.list_id
            WHERE v.downloaded = 0
              AND v.blacklisted = 0
              AND l.auto_download = 1
              AND l.deleting = 0
              AND (v.error_message IS NULL OR v.retry_count > 0)
            ORDER BY v.created_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to find downloadable videos: {e}"))))?;

        rows.into_iter().map(Video::try_from).collect()
    }

    /// Mark a Video as successfully downloaded, merging in backend-reported labels
    pub async fn mark_video_downloaded(
        &self,
        id: VideoId,
        path: &str,
        labels: serde_json::Value,
    ) -> Result<()> {
        let existing = self
            .get_video(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("video {} not found", id.get())))?;

        let merged = merge_labels(existing.labels, labels);
        let merged_json = serde_json::to_string(&merged).map_err(Error::Serialization)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "UPDATE videos SET downloaded = 1, download_path = ?, error_message = NULL, labels = ?, updated_at = ? WHERE id = ?",
        )
        .bind(path)
        .bind(&merged_json)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to mark video downloaded: {e}"))))?;

        Ok(())
    }

    /// Record a failed download attempt
    pub async fn mark_video_failed(&self, id: VideoId, error_message: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE videos SET error_message = ?, retry_count = retry_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(error_message)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to mark video failed: {e}"))))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("video {} not found", id.get())));
        }
        Ok(())
    }
}

fn merge_labels(existing: serde_json::Value, incoming: serde_json::Value) -> serde_json::Value {
    let mut base = match existing {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    if let serde_json::Value::Object(incoming_map) = incoming {
        for (k, v) in incoming_map {
            base.insert(k, v);
        }
    }
    serde_json::Value::Object(base)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_labels_preserves_existing_unless_overwritten() {
        let existing = serde_json::json!({"resolution": "1080p", "codec": "h264"});
        let incoming = serde_json::json!({"codec": "av1"});
        let merged = merge_labels(existing, incoming);
        assert_eq!(merged["resolution"], "1080p");
        assert_eq!(merged["codec"], "av1");
    }

    #[test]
    fn merge_labels_handles_non_object_existing() {
        let merged = merge_labels(serde_json::Value::Null, serde_json::json!({"a": 1}));
        assert_eq!(merged["a"], 1);
    }
}
