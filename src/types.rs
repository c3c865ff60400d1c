//! Core domain types for vidqueue

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// Generates a surrogate-key newtype wrapping `i64` with the conversions and
/// sqlx impls every id in this crate needs (see `DownloadId` in the usenet-dl
/// lineage this crate grew from).
macro_rules! newtype_id {
    ($name:ident) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
            ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Create a new id from a raw integer
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the inner i64 value
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl PartialEq<i64> for $name {
            fn eq(&self, other: &i64) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<$name> for i64 {
            fn eq(&self, other: &$name) -> bool {
                *self == other.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl sqlx::Type<sqlx::Sqlite> for $name {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $name {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                Ok(Self(id))
            }
        }
    };
}

newtype_id!(ProfileId);
newtype_id!(ListId);
newtype_id!(VideoId);
newtype_id!(TaskId);
newtype_id!(ScheduleId);

/// Type of scheduled work a [`Task`](crate::db::Task) performs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Fetch a List's current video set and diff against what's stored
    Sync,
    /// Invoke the media backend to download one Video
    Download,
}

impl TaskType {
    /// Stable lowercase string used for storage and log messages
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Sync => "sync",
            TaskType::Download => "download",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(TaskType::Sync),
            "download" => Ok(TaskType::Download),
            other => Err(crate::Error::Validation(format!(
                "unknown task type: {other}"
            ))),
        }
    }
}

/// Lifecycle state of a [`Task`](crate::db::Task). See the state machine in the design docs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting to be leased by the dispatcher
    Pending,
    /// Leased; a worker is currently executing it
    Running,
    /// Withheld from leasing by an explicit pause
    Paused,
    /// Terminal: the handler returned successfully
    Completed,
    /// Terminal: retries exhausted or the handler declared the failure unrecoverable
    Failed,
    /// Terminal: cancelled while pending or paused
    Cancelled,
}

impl TaskStatus {
    /// Active states participating in the dedup guard (`Store::find_active_task`)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskStatus::Pending | TaskStatus::Running | TaskStatus::Paused
        )
    }

    /// Terminal states from which no automatic transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Stable lowercase string used for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "paused" => Ok(TaskStatus::Paused),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(crate::Error::Validation(format!(
                "unknown task status: {other}"
            ))),
        }
    }
}

/// Severity of a [`TaskLog`](crate::db::TaskLog) entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskLogLevel {
    /// Routine progress note ("Starting attempt 1", "Completed successfully")
    Info,
    /// A transient failure that will be retried
    Warning,
    /// A permanent failure
    Error,
}

impl TaskLogLevel {
    /// Stable lowercase string used for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskLogLevel::Info => "info",
            TaskLogLevel::Warning => "warning",
            TaskLogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for TaskLogLevel {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(TaskLogLevel::Info),
            "warning" => Ok(TaskLogLevel::Warning),
            "error" => Ok(TaskLogLevel::Error),
            other => Err(crate::Error::Validation(format!(
                "unknown task log level: {other}"
            ))),
        }
    }
}

/// Kind of monitored source a [`List`](crate::db::List) represents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    /// A channel / uploader feed
    Channel,
    /// A single playlist
    Playlist,
}

impl std::str::FromStr for ListType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channel" => Ok(ListType::Channel),
            "playlist" => Ok(ListType::Playlist),
            other => Err(crate::Error::Validation(format!(
                "unknown list type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ListType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListType::Channel => write!(f, "channel"),
            ListType::Playlist => write!(f, "playlist"),
        }
    }
}

/// Sync cadence for a List, mapped to an hour count by [`SyncFrequency::hours`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SyncFrequency {
    /// Every hour
    Hourly,
    /// Every 6 hours
    #[serde(rename = "6h")]
    SixHours,
    /// Every 12 hours
    #[serde(rename = "12h")]
    TwelveHours,
    /// Once a day
    Daily,
    /// Once a week
    Weekly,
    /// Once a month (720h)
    Monthly,
}

impl SyncFrequency {
    /// Cadence expressed in hours, matching the source's `SYNC_FREQUENCIES` table
    pub fn hours(&self) -> i64 {
        match self {
            SyncFrequency::Hourly => 1,
            SyncFrequency::SixHours => 6,
            SyncFrequency::TwelveHours => 12,
            SyncFrequency::Daily => 24,
            SyncFrequency::Weekly => 168,
            SyncFrequency::Monthly => 720,
        }
    }

    /// Stable string used for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncFrequency::Hourly => "hourly",
            SyncFrequency::SixHours => "6h",
            SyncFrequency::TwelveHours => "12h",
            SyncFrequency::Daily => "daily",
            SyncFrequency::Weekly => "weekly",
            SyncFrequency::Monthly => "monthly",
        }
    }
}

impl std::str::FromStr for SyncFrequency {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(SyncFrequency::Hourly),
            "6h" => Ok(SyncFrequency::SixHours),
            "12h" => Ok(SyncFrequency::TwelveHours),
            "daily" => Ok(SyncFrequency::Daily),
            "weekly" => Ok(SyncFrequency::Weekly),
            "monthly" => Ok(SyncFrequency::Monthly),
            other => Err(crate::Error::Validation(format!(
                "unknown sync frequency: {other}"
            ))),
        }
    }
}

/// Kind of item a Video represents, populated during sync
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// A regular video
    Video,
    /// A short-form video (YouTube Shorts and equivalents)
    Short,
    /// Was broadcast live
    Live,
}

impl std::str::FromStr for MediaType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(MediaType::Video),
            "short" => Ok(MediaType::Short),
            "live" => Ok(MediaType::Live),
            other => Err(crate::Error::Validation(format!(
                "unknown media type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Video => write!(f, "video"),
            MediaType::Short => write!(f, "short"),
            MediaType::Live => write!(f, "live"),
        }
    }
}

/// SponsorBlock segment handling for a Profile
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SponsorBlockBehavior {
    /// SponsorBlock integration disabled
    #[default]
    Disabled,
    /// Remove matched segments from the downloaded file
    Delete,
    /// Mark matched segments as chapters instead of removing them
    MarkChapter,
}

impl std::str::FromStr for SponsorBlockBehavior {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(SponsorBlockBehavior::Disabled),
            "delete" => Ok(SponsorBlockBehavior::Delete),
            "mark_chapter" => Ok(SponsorBlockBehavior::MarkChapter),
            other => Err(crate::Error::Validation(format!(
                "unknown sponsorblock behavior: {other}"
            ))),
        }
    }
}

impl SponsorBlockBehavior {
    /// Stable string used for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SponsorBlockBehavior::Disabled => "disabled",
            SponsorBlockBehavior::Delete => "delete",
            SponsorBlockBehavior::MarkChapter => "mark_chapter",
        }
    }
}

/// SponsorBlock categories a Profile may request be detected
pub const SPONSORBLOCK_CATEGORIES: &[&str] = &[
    "sponsor",
    "intro",
    "outro",
    "selfpromo",
    "preview",
    "interaction",
    "music_offtopic",
    "filler",
];

/// Container formats a Profile may remux into
pub const OUTPUT_FORMATS: &[&str] = &["3gp", "aac", "flv", "m4a", "mp3", "mp4", "ogg", "wav", "webm"];

/// Day of week used by [`DownloadSchedule`](crate::db::DownloadSchedule)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    /// Monday
    Mon,
    /// Tuesday
    Tue,
    /// Wednesday
    Wed,
    /// Thursday
    Thu,
    /// Friday
    Fri,
    /// Saturday
    Sat,
    /// Sunday
    Sun,
}

impl Weekday {
    /// Map from chrono's `Weekday` to ours
    pub fn from_chrono(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Mon,
            chrono::Weekday::Tue => Weekday::Tue,
            chrono::Weekday::Wed => Weekday::Wed,
            chrono::Weekday::Thu => Weekday::Thu,
            chrono::Weekday::Fri => Weekday::Fri,
            chrono::Weekday::Sat => Weekday::Sat,
            chrono::Weekday::Sun => Weekday::Sun,
        }
    }

    /// Stable lowercase string used for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Mon => "mon",
            Weekday::Tue => "tue",
            Weekday::Wed => "wed",
            Weekday::Thu => "thu",
            Weekday::Fri => "fri",
            Weekday::Sat => "sat",
            Weekday::Sun => "sun",
        }
    }
}

impl std::str::FromStr for Weekday {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mon" => Ok(Weekday::Mon),
            "tue" => Ok(Weekday::Tue),
            "wed" => Ok(Weekday::Wed),
            "thu" => Ok(Weekday::Thu),
            "fri" => Ok(Weekday::Fri),
            "sat" => Ok(Weekday::Sat),
            "sun" => Ok(Weekday::Sun),
            other => Err(crate::Error::Validation(format!("unknown weekday: {other}"))),
        }
    }
}

/// Opaque label map attached to a Video (resolution/codec annotations, etc.)
pub type LabelMap = HashMap<String, serde_json::Value>;

/// Event emitted by the engine for the Notifier sink
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// A video finished downloading successfully
    DownloadCompleted {
        /// The video that finished downloading
        video_id: VideoId,
        /// Final path on disk
        path: String,
    },
    /// A new video was discovered during sync
    VideoDiscovered {
        /// The newly discovered video
        video_id: VideoId,
        /// The list it was discovered in
        list_id: ListId,
    },
    /// A list sync finished
    SyncCompleted {
        /// The list that was synced
        list_id: ListId,
        /// Count of newly discovered videos
        new_videos: usize,
    },
}

impl NotificationEvent {
    /// Machine-readable event kind, matching the `type` discriminant this
    /// enum serializes as. Used by notifier sinks to filter against a
    /// configured event allowlist.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::DownloadCompleted { .. } => "download_completed",
            NotificationEvent::VideoDiscovered { .. } => "video_discovered",
            NotificationEvent::SyncCompleted { .. } => "sync_completed",
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn task_status_is_active_matches_dedup_guard_set() {
        assert!(TaskStatus::Pending.is_active());
        assert!(TaskStatus::Running.is_active());
        assert!(TaskStatus::Paused.is_active());
        assert!(!TaskStatus::Completed.is_active());
        assert!(!TaskStatus::Failed.is_active());
        assert!(!TaskStatus::Cancelled.is_active());
    }

    #[test]
    fn task_status_is_terminal_matches_terminal_set() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }

    #[test]
    fn task_status_round_trips_through_str() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Paused,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            let s = status.as_str();
            assert_eq!(TaskStatus::from_str(s).unwrap(), status);
        }
    }

    #[test]
    fn sync_frequency_hours_match_source_table() {
        assert_eq!(SyncFrequency::Hourly.hours(), 1);
        assert_eq!(SyncFrequency::SixHours.hours(), 6);
        assert_eq!(SyncFrequency::TwelveHours.hours(), 12);
        assert_eq!(SyncFrequency::Daily.hours(), 24);
        assert_eq!(SyncFrequency::Weekly.hours(), 168);
        assert_eq!(SyncFrequency::Monthly.hours(), 720);
    }

    #[test]
    fn task_id_from_str_parses_valid_integer() {
        let id = TaskId::from_str("123").unwrap();
        assert_eq!(id.get(), 123);
    }

    #[test]
    fn task_id_from_str_rejects_non_numeric() {
        assert!(TaskId::from_str("abc").is_err());
    }

    #[test]
    fn task_id_partial_eq_with_i64() {
        let id = VideoId::new(10);
        assert!(id == 10_i64);
        assert!(10_i64 == id);
        assert!(id != 11_i64);
    }

    #[test]
    fn weekday_round_trips_through_str() {
        for day in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            assert_eq!(Weekday::from_str(day.as_str()).unwrap(), day);
        }
    }

    #[test]
    fn weekday_from_chrono_maps_every_day() {
        assert_eq!(Weekday::from_chrono(chrono::Weekday::Mon), Weekday::Mon);
        assert_eq!(Weekday::from_chrono(chrono::Weekday::Sun), Weekday::Sun);
    }

    #[test]
    fn task_type_round_trips_through_str() {
        assert_eq!(TaskType::from_str("sync").unwrap(), TaskType::Sync);
        assert_eq!(TaskType::from_str("download").unwrap(), TaskType::Download);
        assert!(TaskType::from_str("bogus").is_err());
    }
}
