//! API-facing request/response shapes.
//!
//! The `Store` domain structs in [`crate::db`] are intentionally not
//! `Serialize`/`Deserialize` — they're the persistence model. These DTOs are
//! the wire model, mirroring how the teacher keeps `DownloadInfo` (in
//! `types.rs`) distinct from its raw `download_rows` query struct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::{DownloadSchedule, HistoryEntry, List, ListFields, Profile, ProfileFields, ScheduleFields, Task, TaskLog, Video};
use crate::engine::EngineStats;
use crate::types::{
    ListId, ListType, MediaType, ProfileId, SponsorBlockBehavior, SyncFrequency, TaskId, TaskLogLevel, TaskStatus,
    TaskType, VideoId, Weekday,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileDto {
    pub id: ProfileId,
    pub name: String,
    pub output_format: String,
    pub resolution: i32,
    pub preferred_codecs: Vec<String>,
    pub include_shorts: bool,
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,
    pub download_subtitles: bool,
    pub embed_subtitles: bool,
    pub auto_generated_subtitles: bool,
    pub subtitle_languages: Vec<String>,
    pub audio_track_language: Option<String>,
    pub output_template: String,
    pub sponsorblock_behavior: SponsorBlockBehavior,
    pub sponsorblock_categories: Vec<String>,
    pub extra_args: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Profile> for ProfileDto {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            name: p.name,
            output_format: p.output_format,
            resolution: p.resolution,
            preferred_codecs: p.preferred_codecs,
            include_shorts: p.include_shorts,
            embed_metadata: p.embed_metadata,
            embed_thumbnail: p.embed_thumbnail,
            download_subtitles: p.download_subtitles,
            embed_subtitles: p.embed_subtitles,
            auto_generated_subtitles: p.auto_generated_subtitles,
            subtitle_languages: p.subtitle_languages,
            audio_track_language: p.audio_track_language,
            output_template: p.output_template,
            sponsorblock_behavior: p.sponsorblock_behavior,
            sponsorblock_categories: p.sponsorblock_categories,
            extra_args: p.extra_args,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Body accepted by `POST /profiles` and `PUT /profiles/:id`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProfileRequest {
    pub name: String,
    pub output_format: String,
    pub resolution: i32,
    #[serde(default)]
    pub preferred_codecs: Vec<String>,
    #[serde(default)]
    pub include_shorts: bool,
    #[serde(default)]
    pub embed_metadata: bool,
    #[serde(default)]
    pub embed_thumbnail: bool,
    #[serde(default)]
    pub download_subtitles: bool,
    #[serde(default)]
    pub embed_subtitles: bool,
    #[serde(default)]
    pub auto_generated_subtitles: bool,
    #[serde(default)]
    pub subtitle_languages: Vec<String>,
    #[serde(default)]
    pub audio_track_language: Option<String>,
    pub output_template: String,
    #[serde(default)]
    pub sponsorblock_behavior: SponsorBlockBehavior,
    #[serde(default)]
    pub sponsorblock_categories: Vec<String>,
    #[serde(default = "default_extra_args")]
    pub extra_args: serde_json::Value,
}

fn default_extra_args() -> serde_json::Value {
    serde_json::json!({})
}

impl From<ProfileRequest> for ProfileFields {
    fn from(r: ProfileRequest) -> Self {
        Self {
            name: r.name,
            output_format: r.output_format,
            resolution: r.resolution,
            preferred_codecs: r.preferred_codecs,
            include_shorts: r.include_shorts,
            embed_metadata: r.embed_metadata,
            embed_thumbnail: r.embed_thumbnail,
            download_subtitles: r.download_subtitles,
            embed_subtitles: r.embed_subtitles,
            auto_generated_subtitles: r.auto_generated_subtitles,
            subtitle_languages: r.subtitle_languages,
            audio_track_language: r.audio_track_language,
            output_template: r.output_template,
            sponsorblock_behavior: r.sponsorblock_behavior,
            sponsorblock_categories: r.sponsorblock_categories,
            extra_args: r.extra_args,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ListDto {
    pub id: ListId,
    pub url: String,
    pub profile_id: ProfileId,
    pub name: String,
    pub list_type: ListType,
    pub from_date: Option<String>,
    pub sync_frequency: SyncFrequency,
    pub enabled: bool,
    pub auto_download: bool,
    pub title_blacklist: Option<String>,
    pub min_duration: Option<i64>,
    pub max_duration: Option<i64>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub tags: Vec<String>,
    pub last_synced: Option<DateTime<Utc>>,
    pub deleting: bool,
    pub created_at: DateTime<Utc>,
}

impl From<List> for ListDto {
    fn from(l: List) -> Self {
        Self {
            id: l.id,
            url: l.url,
            profile_id: l.profile_id,
            name: l.name,
            list_type: l.list_type,
            from_date: l.from_date,
            sync_frequency: l.sync_frequency,
            enabled: l.enabled,
            auto_download: l.auto_download,
            title_blacklist: l.title_blacklist,
            min_duration: l.min_duration,
            max_duration: l.max_duration,
            description: l.description,
            thumbnail: l.thumbnail,
            tags: l.tags,
            last_synced: l.last_synced,
            deleting: l.deleting,
            created_at: l.created_at,
        }
    }
}

/// Body accepted by `POST /lists` and `PUT /lists/:id`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListRequest {
    pub url: String,
    pub profile_id: ProfileId,
    pub name: String,
    pub list_type: ListType,
    #[serde(default)]
    pub from_date: Option<String>,
    #[serde(default)]
    pub sync_frequency: SyncFrequency,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub auto_download: bool,
    #[serde(default)]
    pub title_blacklist: Option<String>,
    #[serde(default)]
    pub min_duration: Option<i64>,
    #[serde(default)]
    pub max_duration: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl From<ListRequest> for ListFields {
    fn from(r: ListRequest) -> Self {
        Self {
            url: r.url,
            profile_id: r.profile_id,
            name: r.name,
            list_type: r.list_type,
            from_date: r.from_date,
            sync_frequency: r.sync_frequency,
            enabled: r.enabled,
            auto_download: r.auto_download,
            title_blacklist: r.title_blacklist,
            min_duration: r.min_duration,
            max_duration: r.max_duration,
            description: r.description,
            thumbnail: r.thumbnail,
            tags: r.tags,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VideoDto {
    pub id: VideoId,
    pub list_id: ListId,
    pub external_video_id: String,
    pub title: String,
    pub url: String,
    pub duration: Option<i64>,
    pub upload_date: Option<String>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub extractor: String,
    pub media_type: MediaType,
    pub labels: serde_json::Value,
    pub downloaded: bool,
    pub download_path: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub blacklisted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Video> for VideoDto {
    fn from(v: Video) -> Self {
        Self {
            id: v.id,
            list_id: v.list_id,
            external_video_id: v.external_video_id,
            title: v.title,
            url: v.url,
            duration: v.duration,
            upload_date: v.upload_date,
            thumbnail: v.thumbnail,
            description: v.description,
            extractor: v.extractor,
            media_type: v.media_type,
            labels: v.labels,
            downloaded: v.downloaded,
            download_path: v.download_path,
            error_message: v.error_message,
            retry_count: v.retry_count,
            blacklisted: v.blacklisted,
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskDto {
    pub id: TaskId,
    pub task_type: TaskType,
    pub entity_id: i64,
    /// Display name of the entity this task targets, when resolvable
    pub entity_name: Option<String>,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskDto {
    pub fn from_task(t: Task, entity_name: Option<String>) -> Self {
        Self {
            id: t.id,
            task_type: t.task_type,
            entity_id: t.entity_id,
            entity_name,
            status: t.status,
            result: t.result,
            error: t.error,
            retry_count: t.retry_count,
            max_retries: t.max_retries,
            created_at: t.created_at,
            started_at: t.started_at,
            completed_at: t.completed_at,
        }
    }
}

impl From<Task> for TaskDto {
    fn from(t: Task) -> Self {
        Self::from_task(t, None)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskLogDto {
    pub id: i64,
    pub task_id: i64,
    pub attempt: i32,
    pub level: TaskLogLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TaskLog> for TaskLogDto {
    type Error = crate::error::Error;

    fn try_from(log: TaskLog) -> Result<Self, Self::Error> {
        let level = crate::db::Store::task_log_level(&log)?;
        Ok(Self {
            id: log.id,
            task_id: log.task_id,
            attempt: log.attempt,
            level,
            message: log.message,
            created_at: DateTime::from_timestamp(log.created_at, 0).unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScheduleDto {
    pub id: crate::types::ScheduleId,
    pub name: String,
    pub enabled: bool,
    pub days_of_week: Vec<Weekday>,
    pub start_time: String,
    pub end_time: String,
}

impl From<DownloadSchedule> for ScheduleDto {
    fn from(s: DownloadSchedule) -> Self {
        Self { id: s.id, name: s.name, enabled: s.enabled, days_of_week: s.days_of_week, start_time: s.start_time, end_time: s.end_time }
    }
}

/// Body accepted by `POST /schedules` and `PUT /schedules/:id`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ScheduleRequest {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub days_of_week: Vec<Weekday>,
    pub start_time: String,
    pub end_time: String,
}

impl From<ScheduleRequest> for ScheduleFields {
    fn from(r: ScheduleRequest) -> Self {
        Self { name: r.name, enabled: r.enabled, days_of_week: r.days_of_week, start_time: r.start_time, end_time: r.end_time }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryEntryDto {
    pub id: i64,
    pub list_id: Option<ListId>,
    pub event_type: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<HistoryEntry> for HistoryEntryDto {
    fn from(h: HistoryEntry) -> Self {
        Self { id: h.id, list_id: h.list_id, event_type: h.event_type, message: h.message, created_at: h.created_at }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EngineStatsDto {
    pub running_sync: usize,
    pub running_download: usize,
    pub max_sync: usize,
    pub max_download: usize,
    pub paused: bool,
    pub sync_paused: bool,
    pub download_paused: bool,
}

impl From<EngineStats> for EngineStatsDto {
    fn from(s: EngineStats) -> Self {
        Self {
            running_sync: s.running_sync,
            running_download: s.running_download,
            max_sync: s.max_sync,
            max_download: s.max_download,
            paused: s.paused,
            sync_paused: s.sync_paused,
            download_paused: s.download_paused,
        }
    }
}

/// Progress snapshot, mirroring [`crate::progress::ProgressEntry`] for the wire.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProgressDto {
    pub video_id: VideoId,
    pub status: String,
    pub percent: f64,
    pub speed: Option<String>,
    pub eta: Option<i64>,
    pub error: Option<String>,
}

impl From<crate::progress::ProgressEntry> for ProgressDto {
    fn from(p: crate::progress::ProgressEntry) -> Self {
        Self { video_id: p.video_id, status: p.status, percent: p.percent, speed: p.speed, eta: p.eta, error: p.error }
    }
}

/// Pagination query params shared by list-like endpoints.
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}
