//! Database layer for vidqueue
//!
//! Handles SQLite persistence for profiles, lists, videos, the task queue, and
//! audit history.
//!
//! ## Submodules
//!
//! Methods on [`Store`] are organized by domain:
//! - [`migrations`] — database lifecycle, schema migrations
//! - [`profiles`] — Profile CRUD
//! - [`lists`] — List CRUD
//! - [`videos`] — Video CRUD
//! - [`tasks`] — Task queue CRUD and the dispatcher's leasing queries
//! - [`task_logs`] — append-only per-attempt audit trail for Tasks
//! - [`schedules`] — DownloadSchedule CRUD
//! - [`settings`] — process-wide key/value store
//! - [`history`] — HistoryEntry CRUD

use crate::types::{
    ListId, ListType, MediaType, ProfileId, ScheduleId, SponsorBlockBehavior, SyncFrequency,
    TaskId, TaskLogLevel, TaskStatus, TaskType, VideoId, Weekday,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::collections::HashMap;

mod history;
mod lists;
mod migrations;
mod profiles;
mod schedules;
mod settings;
mod task_logs;
mod tasks;
mod videos;

pub use schedules::ScheduleFields;
pub use settings::{SettingsKey, SETTINGS_DATA_RETENTION_DAYS, SETTINGS_DOWNLOAD_PAUSED, SETTINGS_SYNC_PAUSED, SETTINGS_WORKER_PAUSED};

/// A download configuration applied to the videos of any List that references it
#[derive(Debug, Clone)]
pub struct Profile {
    /// Unique database ID
    pub id: ProfileId,
    /// Unique display name
    pub name: String,
    /// Container format to remux into
    pub output_format: String,
    /// Resolution ceiling in pixels (0 = audio-only)
    pub resolution: i32,
    /// Preferred codecs, in priority order
    pub preferred_codecs: Vec<String>,
    /// Whether shorts/live content is retained on sync
    pub include_shorts: bool,
    /// Embed metadata (title, description, etc.) into the output file
    pub embed_metadata: bool,
    /// Embed the video thumbnail as cover art
    pub embed_thumbnail: bool,
    /// Download subtitle tracks
    pub download_subtitles: bool,
    /// Embed subtitles into the container rather than writing sidecar files
    pub embed_subtitles: bool,
    /// Include auto-generated subtitle tracks
    pub auto_generated_subtitles: bool,
    /// Subtitle languages to request
    pub subtitle_languages: Vec<String>,
    /// Preferred audio track language
    pub audio_track_language: Option<String>,
    /// Output filename template
    pub output_template: String,
    /// SponsorBlock segment handling
    pub sponsorblock_behavior: SponsorBlockBehavior,
    /// SponsorBlock categories to detect
    pub sponsorblock_categories: Vec<String>,
    /// Opaque additional backend options
    pub extra_args: serde_json::Value,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a [`Profile`]
#[derive(Debug, Clone)]
pub struct ProfileFields {
    /// Unique display name
    pub name: String,
    /// Container format to remux into
    pub output_format: String,
    /// Resolution ceiling in pixels (0 = audio-only)
    pub resolution: i32,
    /// Preferred codecs, in priority order
    pub preferred_codecs: Vec<String>,
    /// Whether shorts/live content is retained on sync
    pub include_shorts: bool,
    /// Embed metadata into the output file
    pub embed_metadata: bool,
    /// Embed the video thumbnail as cover art
    pub embed_thumbnail: bool,
    /// Download subtitle tracks
    pub download_subtitles: bool,
    /// Embed subtitles into the container
    pub embed_subtitles: bool,
    /// Include auto-generated subtitle tracks
    pub auto_generated_subtitles: bool,
    /// Subtitle languages to request
    pub subtitle_languages: Vec<String>,
    /// Preferred audio track language
    pub audio_track_language: Option<String>,
    /// Output filename template
    pub output_template: String,
    /// SponsorBlock segment handling
    pub sponsorblock_behavior: SponsorBlockBehavior,
    /// SponsorBlock categories to detect
    pub sponsorblock_categories: Vec<String>,
    /// Opaque additional backend options
    pub extra_args: serde_json::Value,
}

/// A monitored source (channel or playlist)
#[derive(Debug, Clone)]
pub struct List {
    /// Unique database ID
    pub id: ListId,
    /// Unique source URL
    pub url: String,
    /// Profile applied to this list's videos
    pub profile_id: ProfileId,
    /// Display name
    pub name: String,
    /// Channel or playlist
    pub list_type: ListType,
    /// Optional YYYYMMDD lower bound on videos to sync
    pub from_date: Option<String>,
    /// Sync cadence
    pub sync_frequency: SyncFrequency,
    /// Whether this list is actively synced
    pub enabled: bool,
    /// Whether new videos are auto-enqueued for download
    pub auto_download: bool,
    /// Optional case-insensitive title blacklist regex
    pub title_blacklist: Option<String>,
    /// Minimum duration in seconds to retain a video
    pub min_duration: Option<i64>,
    /// Maximum duration in seconds to retain a video
    pub max_duration: Option<i64>,
    /// Free-text description
    pub description: Option<String>,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Timestamp of the last successful sync
    pub last_synced: Option<DateTime<Utc>>,
    /// Soft-delete marker blocking re-enqueue during cascading removal
    pub deleting: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a [`List`]
#[derive(Debug, Clone)]
pub struct ListFields {
    /// Unique source URL
    pub url: String,
    /// Profile applied to this list's videos
    pub profile_id: ProfileId,
    /// Display name
    pub name: String,
    /// Channel or playlist
    pub list_type: ListType,
    /// Optional YYYYMMDD lower bound on videos to sync
    pub from_date: Option<String>,
    /// Sync cadence
    pub sync_frequency: SyncFrequency,
    /// Whether this list is actively synced
    pub enabled: bool,
    /// Whether new videos are auto-enqueued for download
    pub auto_download: bool,
    /// Optional case-insensitive title blacklist regex
    pub title_blacklist: Option<String>,
    /// Minimum duration in seconds to retain a video
    pub min_duration: Option<i64>,
    /// Maximum duration in seconds to retain a video
    pub max_duration: Option<i64>,
    /// Free-text description
    pub description: Option<String>,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Free-form tags
    pub tags: Vec<String>,
}

/// A discovered item within a [`List`]
#[derive(Debug, Clone)]
pub struct Video {
    /// Unique database ID
    pub id: VideoId,
    /// Parent list
    pub list_id: ListId,
    /// Platform-native video ID (unique together with `list_id`)
    pub external_video_id: String,
    /// Title at time of discovery
    pub title: String,
    /// Canonical watch URL
    pub url: String,
    /// Duration in seconds
    pub duration: Option<i64>,
    /// Upload date, YYYYMMDD
    pub upload_date: Option<String>,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Free-text description
    pub description: Option<String>,
    /// Source platform identifier (e.g. "youtube")
    pub extractor: String,
    /// Video, short, or live
    pub media_type: MediaType,
    /// Opaque resolution/codec annotations populated after download
    pub labels: serde_json::Value,
    /// Whether the backend has successfully downloaded this video
    pub downloaded: bool,
    /// Path on disk once downloaded
    pub download_path: Option<String>,
    /// Most recent error message, if any
    pub error_message: Option<String>,
    /// Number of download attempts so far
    pub retry_count: i32,
    /// Excluded from download by blacklist match
    pub blacklisted: bool,
    /// Discovery timestamp
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent mutation (download outcome, retry, etc.)
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when inserting a new [`Video`]
#[derive(Debug, Clone)]
pub struct NewVideo {
    /// Parent list
    pub list_id: ListId,
    /// Platform-native video ID
    pub external_video_id: String,
    /// Title at time of discovery
    pub title: String,
    /// Canonical watch URL
    pub url: String,
    /// Duration in seconds
    pub duration: Option<i64>,
    /// Upload date, YYYYMMDD
    pub upload_date: Option<String>,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Free-text description
    pub description: Option<String>,
    /// Source platform identifier
    pub extractor: String,
    /// Video, short, or live
    pub media_type: MediaType,
    /// Excluded from download by blacklist match
    pub blacklisted: bool,
    /// Reason(s) the blacklist matched, stored as `error_message`
    pub blacklist_reason: Option<String>,
}

/// A unit of scheduled work
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique database ID
    pub id: TaskId,
    /// Sync or download
    pub task_type: TaskType,
    /// Weak reference: a List id for `sync`, a Video id for `download`
    pub entity_id: i64,
    /// Current lifecycle state
    pub status: TaskStatus,
    /// Opaque success payload, JSON-encoded
    pub result: Option<String>,
    /// Most recent error message
    pub error: Option<String>,
    /// Number of attempts made so far
    pub retry_count: i32,
    /// Attempts allowed before the task is marked permanently failed
    pub max_retries: i32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent lease
    pub started_at: Option<DateTime<Utc>>,
    /// Timestamp the task reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

/// An append-only audit row tied to a [`Task`] attempt
#[derive(Debug, Clone, FromRow)]
pub struct TaskLog {
    /// Unique database ID
    pub id: i64,
    /// Owning task
    pub task_id: i64,
    /// Attempt number this entry describes
    pub attempt: i32,
    /// Severity
    pub level: String,
    /// Free-text message
    pub message: String,
    /// Creation timestamp (unix seconds)
    pub created_at: i64,
}

/// A named permissive time window evaluated by [`crate::schedule_gate::ScheduleGate`]
#[derive(Debug, Clone)]
pub struct DownloadSchedule {
    /// Unique database ID
    pub id: ScheduleId,
    /// Display name
    pub name: String,
    /// Whether this schedule currently participates in gating
    pub enabled: bool,
    /// Days this window applies; empty matches no day (the window never admits)
    pub days_of_week: Vec<Weekday>,
    /// Window start, `HH:MM`
    pub start_time: String,
    /// Window end, `HH:MM`; less than `start_time` wraps past midnight
    pub end_time: String,
}

/// An append-only audit row, optionally tied to a [`List`]
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Unique database ID
    pub id: i64,
    /// List this entry concerns, if any
    pub list_id: Option<ListId>,
    /// Event kind (e.g. "sync_completed", "download_failed")
    pub event_type: String,
    /// Free-text message
    pub message: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Result of a bulk insert operation
#[derive(Debug, Clone, Default)]
pub struct BulkInsertResult {
    /// Number of tasks actually inserted
    pub inserted: Vec<Task>,
    /// Entity ids skipped because an active task already targeted them
    pub skipped: Vec<i64>,
}

/// Database handle for vidqueue
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Close the underlying connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Map rows keyed by integer id from a `(id, name)` pair query, used by
/// `batch_get_entity_names`
pub(crate) fn rows_to_name_map(rows: Vec<(i64, String)>) -> HashMap<i64, String> {
    rows.into_iter().collect()
}

