//! In-memory, TTL-evicting progress tracker for in-flight downloads.
//!
//! Populated by [`crate::media_backend::MediaBackend`] progress callbacks and
//! read by the API/stream layer. Entries are process-local scratch state, not
//! persisted — a crash loses in-flight progress, which is fine since the
//! owning Task/Video rows are the source of truth for whether the work itself
//! completed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::types::VideoId;

/// Entries older than this are treated as stale and evicted on next access.
const ENTRY_TTL: Duration = Duration::from_secs(300);

/// A point-in-time snapshot of one video's download progress.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEntry {
    /// The video this entry describes
    pub video_id: VideoId,
    /// Current phase: "pending", "downloading", "processing", "completed", "error"
    pub status: String,
    /// Completion percentage, 0.0-100.0
    pub percent: f64,
    /// Human-readable transfer rate (e.g. "1.2MiB/s"), if known
    pub speed: Option<String>,
    /// Estimated seconds remaining, if known
    pub eta: Option<i64>,
    /// Error message, set only when `status == "error"`
    pub error: Option<String>,
}

impl ProgressEntry {
    fn new(video_id: VideoId) -> Self {
        Self {
            video_id,
            status: "pending".to_string(),
            percent: 0.0,
            speed: None,
            eta: None,
            error: None,
        }
    }
}

/// Tracks live download progress per video, keyed by [`VideoId`].
#[derive(Clone, Default)]
pub struct ProgressTracker {
    entries: Arc<Mutex<HashMap<VideoId, (ProgressEntry, Instant)>>>,
}

impl ProgressTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a video, resetting any prior entry.
    pub async fn mark_pending(&self, video_id: VideoId) {
        self.set(video_id, ProgressEntry::new(video_id)).await;
    }

    /// Record a `downloading` progress update. `percent_str` is whatever the
    /// media backend reports (e.g. `"42.7%"`) and is parsed tolerantly —
    /// anything unparseable is treated as no change to the running percent.
    pub async fn update_downloading(
        &self,
        video_id: VideoId,
        percent_str: &str,
        speed: Option<String>,
        eta: Option<i64>,
    ) {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(video_id)
            .or_insert_with(|| (ProgressEntry::new(video_id), Instant::now()));

        entry.0.status = "downloading".to_string();
        if let Some(percent) = parse_percent(percent_str) {
            entry.0.percent = percent;
        }
        entry.0.speed = speed;
        entry.0.eta = eta;
        entry.1 = Instant::now();
    }

    /// Record that the backend finished transferring and moved to
    /// post-processing (remux/merge/embed).
    pub async fn mark_processing(&self, video_id: VideoId) {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(video_id)
            .or_insert_with(|| (ProgressEntry::new(video_id), Instant::now()));
        entry.0.status = "processing".to_string();
        entry.0.percent = 100.0;
        entry.1 = Instant::now();
    }

    /// Record successful completion.
    pub async fn mark_done(&self, video_id: VideoId) {
        let mut entry = ProgressEntry::new(video_id);
        entry.status = "completed".to_string();
        entry.percent = 100.0;
        self.set(video_id, entry).await;
    }

    /// Record a failure.
    pub async fn mark_error(&self, video_id: VideoId, error: impl Into<String>) {
        let mut entry = ProgressEntry::new(video_id);
        entry.status = "error".to_string();
        entry.error = Some(error.into());
        self.set(video_id, entry).await;
    }

    /// Fetch the current entry for a video, evicting it first if stale.
    pub async fn get(&self, video_id: VideoId) -> Option<ProgressEntry> {
        let mut entries = self.entries.lock().await;
        evict_stale(&mut entries);
        entries.get(&video_id).map(|(entry, _)| entry.clone())
    }

    /// Snapshot every currently tracked entry, evicting stale ones first.
    pub async fn snapshot(&self) -> Vec<ProgressEntry> {
        let mut entries = self.entries.lock().await;
        evict_stale(&mut entries);
        entries.values().map(|(entry, _)| entry.clone()).collect()
    }

    /// Stop tracking a video outright (used once its Task reaches a terminal state).
    pub async fn remove(&self, video_id: VideoId) {
        self.entries.lock().await.remove(&video_id);
    }

    async fn set(&self, video_id: VideoId, entry: ProgressEntry) {
        self.entries.lock().await.insert(video_id, (entry, Instant::now()));
    }
}

fn evict_stale(entries: &mut HashMap<VideoId, (ProgressEntry, Instant)>) {
    let now = Instant::now();
    entries.retain(|_, (_, seen_at)| now.duration_since(*seen_at) <= ENTRY_TTL);
}

/// Tolerantly parse a backend-reported percentage string like `"42.7%"`,
/// `" 100.0% "`, or a bare `"0"`. Returns `None` if nothing numeric is found.
fn parse_percent(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_end_matches('%').trim();
    trimmed.parse::<f64>().ok().map(|p| p.clamp(0.0, 100.0))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_percent_handles_percent_sign_and_whitespace() {
        assert_eq!(parse_percent("42.7%"), Some(42.7));
        assert_eq!(parse_percent(" 100.0% "), Some(100.0));
        assert_eq!(parse_percent("0"), Some(0.0));
    }

    #[test]
    fn parse_percent_rejects_garbage() {
        assert_eq!(parse_percent("N/A"), None);
        assert_eq!(parse_percent(""), None);
    }

    #[test]
    fn parse_percent_clamps_out_of_range_values() {
        assert_eq!(parse_percent("142.0%"), Some(100.0));
        assert_eq!(parse_percent("-5%"), Some(0.0));
    }

    #[tokio::test]
    async fn mark_pending_then_downloading_updates_percent() {
        let tracker = ProgressTracker::new();
        let video_id = VideoId(1);

        tracker.mark_pending(video_id).await;
        tracker
            .update_downloading(video_id, "37.5%", Some("1.2MiB/s".to_string()), Some(120))
            .await;

        let entry = tracker.get(video_id).await.unwrap();
        assert_eq!(entry.status, "downloading");
        assert_eq!(entry.percent, 37.5);
        assert_eq!(entry.speed.as_deref(), Some("1.2MiB/s"));
        assert_eq!(entry.eta, Some(120));
    }

    #[tokio::test]
    async fn update_downloading_on_untracked_video_starts_a_new_entry() {
        let tracker = ProgressTracker::new();
        let video_id = VideoId(2);

        tracker.update_downloading(video_id, "10%", None, None).await;

        let entry = tracker.get(video_id).await.unwrap();
        assert_eq!(entry.status, "downloading");
        assert_eq!(entry.percent, 10.0);
    }

    #[tokio::test]
    async fn mark_done_sets_completed_and_full_percent() {
        let tracker = ProgressTracker::new();
        let video_id = VideoId(3);

        tracker.mark_pending(video_id).await;
        tracker.mark_done(video_id).await;

        let entry = tracker.get(video_id).await.unwrap();
        assert_eq!(entry.status, "completed");
        assert_eq!(entry.percent, 100.0);
    }

    #[tokio::test]
    async fn mark_error_records_message() {
        let tracker = ProgressTracker::new();
        let video_id = VideoId(4);

        tracker.mark_error(video_id, "404 not found").await;

        let entry = tracker.get(video_id).await.unwrap();
        assert_eq!(entry.status, "error");
        assert_eq!(entry.error.as_deref(), Some("404 not found"));
    }

    #[tokio::test]
    async fn remove_drops_the_entry() {
        let tracker = ProgressTracker::new();
        let video_id = VideoId(5);

        tracker.mark_pending(video_id).await;
        tracker.remove(video_id).await;

        assert!(tracker.get(video_id).await.is_none());
    }

    #[tokio::test]
    async fn snapshot_returns_all_tracked_entries() {
        let tracker = ProgressTracker::new();
        tracker.mark_pending(VideoId(1)).await;
        tracker.mark_pending(VideoId(2)).await;

        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.len(), 2);
    }
}
