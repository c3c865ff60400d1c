//! Executes one video-download task: resolve the owning Profile, stream
//! progress into [`crate::progress::ProgressTracker`], and apply the
//! backend's outcome to the Video row.

use std::sync::Arc;

use serde::Serialize;

use crate::db::{Profile, Store, Video};
use crate::error::{Error, Result};
use crate::event_hub::{topics, EventHub};
use crate::media_backend::{DownloadOutcome, MediaBackend, ProgressHook, ProgressUpdate};
use crate::notifier::NotifierRegistry;
use crate::progress::ProgressTracker;
use crate::types::{NotificationEvent, VideoId};

use super::Engine;

/// The JSON result stored on a completed download task.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum DownloadResult {
    /// The backend produced a file
    #[serde(rename = "downloaded")]
    Downloaded {
        /// Path on disk
        path: String,
    },
    /// The video was already marked downloaded; nothing to do
    #[serde(rename = "already_downloaded")]
    AlreadyDownloaded,
}

/// Executes a single download task against its collaborators.
pub struct DownloadHandler {
    store: Store,
    hub: EventHub,
    backend: Arc<dyn MediaBackend>,
    notifiers: NotifierRegistry,
    progress: ProgressTracker,
}

impl DownloadHandler {
    /// Build a handler from its collaborators.
    pub fn new(
        store: Store,
        hub: EventHub,
        backend: Arc<dyn MediaBackend>,
        notifiers: NotifierRegistry,
        progress: ProgressTracker,
    ) -> Self {
        Self { store, hub, backend, notifiers, progress }
    }

    /// Run the download for `video_id` to completion.
    pub async fn run(&self, video_id: VideoId) -> Result<DownloadResult> {
        let video = self
            .store
            .get_video(video_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("video {}", video_id.get())))?;

        if video.downloaded {
            return Ok(DownloadResult::AlreadyDownloaded);
        }

        let list = self
            .store
            .get_list(video.list_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("list {}", video.list_id.get())))?;
        let profile = self
            .store
            .get_profile(list.profile_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile {}", list.profile_id.get())))?;

        self.progress.mark_pending(video_id).await;
        self.hub.publish(topics::PROGRESS).await;
        let outcome = self.download(&video, &profile).await;

        match outcome {
            Ok(DownloadOutcome::Success { path, labels }) => {
                self.store.mark_video_downloaded(video_id, &path, labels).await?;
                self.progress.mark_done(video_id).await;
                self.hub.publish(topics::PROGRESS).await;
                self.hub.publish(&topics::list_videos(video.list_id.get())).await;
                self.store
                    .insert_history(
                        Some(video.list_id),
                        "download_completed",
                        &format!("downloaded '{}' to {path}", video.title),
                    )
                    .await?;
                self.hub.publish(&topics::list_history(video.list_id.get())).await;
                self.hub.publish(topics::HISTORY).await;
                self.notifiers.notify(NotificationEvent::DownloadCompleted { video_id, path: path.clone() });
                Ok(DownloadResult::Downloaded { path })
            }
            Ok(DownloadOutcome::Failure { reason }) => {
                self.store.mark_video_failed(video_id, &reason).await?;
                self.progress.mark_error(video_id, reason.clone()).await;
                self.hub.publish(topics::PROGRESS).await;
                self.hub.publish(&topics::list_videos(video.list_id.get())).await;
                self.store
                    .insert_history(
                        Some(video.list_id),
                        "download_failed",
                        &format!("failed to download '{}': {reason}", video.title),
                    )
                    .await?;
                self.hub.publish(&topics::list_history(video.list_id.get())).await;
                self.hub.publish(topics::HISTORY).await;
                Err(Error::MediaBackend(crate::error::MediaBackendError::ProcessFailed(reason)))
            }
            Err(error) => {
                self.store.mark_video_failed(video_id, &error.to_string()).await?;
                self.progress.mark_error(video_id, error.to_string()).await;
                self.hub.publish(topics::PROGRESS).await;
                Err(error)
            }
        }
    }

    async fn download(&self, video: &Video, profile: &Profile) -> Result<DownloadOutcome> {
        let progress = self.progress.clone();
        let hub = self.hub.clone();
        let video_id = video.id;
        let hook: ProgressHook = Arc::new(move |update: ProgressUpdate| {
            let progress = progress.clone();
            let hub = hub.clone();
            match update.status.as_str() {
                "downloading" => {
                    let percent_str = update.percent_str.unwrap_or_default();
                    tokio::spawn(async move {
                        progress.update_downloading(video_id, &percent_str, update.speed, update.eta).await;
                        hub.publish(topics::PROGRESS).await;
                    });
                }
                "finished" => {
                    tokio::spawn(async move {
                        progress.mark_processing(video_id).await;
                        hub.publish(topics::PROGRESS).await;
                    });
                }
                _ => {}
            }
        });

        self.backend.download(video, profile, hook).await
    }
}

impl Engine {
    pub(super) async fn run_download_handler(&self, video_id: i64) -> Result<Option<String>> {
        let handler = DownloadHandler::new(
            self.store.clone(),
            self.hub.clone(),
            self.backend.clone(),
            self.notifiers.clone(),
            self.progress.clone(),
        );
        let result = handler.run(VideoId(video_id)).await?;
        Ok(Some(serde_json::to_string(&result).map_err(Error::Serialization)?))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ListFields, NewVideo, ProfileFields};
    use crate::media_backend::ScriptedMediaBackend;
    use crate::types::{ListType, MediaType, SponsorBlockBehavior, SyncFrequency};

    async fn seeded_store() -> (Store, VideoId) {
        let store = Store::new("sqlite::memory:", false).await.unwrap();
        let profile = store
            .create_profile(ProfileFields {
                name: "default".into(),
                output_format: "mp4".into(),
                resolution: 1080,
                preferred_codecs: vec![],
                include_shorts: true,
                embed_metadata: true,
                embed_thumbnail: true,
                download_subtitles: false,
                embed_subtitles: false,
                auto_generated_subtitles: false,
                subtitle_languages: vec![],
                audio_track_language: None,
                output_template: "%(title)s.%(ext)s".into(),
                sponsorblock_behavior: SponsorBlockBehavior::Disabled,
                sponsorblock_categories: vec![],
                extra_args: serde_json::json!({}),
            })
            .await
            .unwrap();

        let list = store
            .create_list(ListFields {
                url: "https://example.com/c/x".into(),
                profile_id: profile.id,
                name: "channel".into(),
                list_type: ListType::Channel,
                from_date: None,
                sync_frequency: SyncFrequency::Daily,
                enabled: true,
                auto_download: true,
                title_blacklist: None,
                min_duration: None,
                max_duration: None,
                description: None,
                thumbnail: None,
                tags: vec![],
            })
            .await
            .unwrap();

        let video = store
            .insert_video(&NewVideo {
                list_id: list.id,
                external_video_id: "abc".into(),
                title: "A video".into(),
                url: "https://example.com/watch?v=abc".into(),
                duration: Some(120),
                upload_date: Some("20240101".into()),
                thumbnail: None,
                description: None,
                extractor: "youtube".into(),
                media_type: MediaType::Video,
                blacklisted: false,
                blacklist_reason: None,
            })
            .await
            .unwrap();

        (store, video.id)
    }

    #[tokio::test]
    async fn download_success_marks_video_downloaded() {
        let (store, video_id) = seeded_store().await;
        let backend = Arc::new(ScriptedMediaBackend::new());

        let handler = DownloadHandler::new(
            store.clone(),
            EventHub::new(),
            backend,
            NotifierRegistry::empty(),
            ProgressTracker::new(),
        );

        let result = handler.run(video_id).await.unwrap();
        assert!(matches!(result, DownloadResult::Downloaded { .. }));

        let video = store.get_video(video_id).await.unwrap().unwrap();
        assert!(video.downloaded);
        assert!(video.error_message.is_none());
    }

    #[tokio::test]
    async fn download_already_downloaded_is_a_noop() {
        let (store, video_id) = seeded_store().await;
        store.mark_video_downloaded(video_id, "/already/there.mp4", serde_json::json!({})).await.unwrap();

        let backend = Arc::new(ScriptedMediaBackend::new());
        let handler = DownloadHandler::new(
            store.clone(),
            EventHub::new(),
            backend,
            NotifierRegistry::empty(),
            ProgressTracker::new(),
        );

        let result = handler.run(video_id).await.unwrap();
        assert!(matches!(result, DownloadResult::AlreadyDownloaded));
    }

    #[tokio::test]
    async fn download_failure_marks_video_failed_and_returns_err() {
        let (store, video_id) = seeded_store().await;
        let backend = Arc::new(ScriptedMediaBackend::new());
        backend.set_download_outcome("abc", DownloadOutcome::Failure { reason: "geo-blocked".into() });

        let handler = DownloadHandler::new(
            store.clone(),
            EventHub::new(),
            backend,
            NotifierRegistry::empty(),
            ProgressTracker::new(),
        );

        let result = handler.run(video_id).await;
        assert!(result.is_err());

        let video = store.get_video(video_id).await.unwrap().unwrap();
        assert!(!video.downloaded);
        assert_eq!(video.error_message.as_deref(), Some("geo-blocked"));
        assert_eq!(video.retry_count, 1);
    }

    #[tokio::test]
    async fn download_missing_video_raises_not_found() {
        let store = Store::new("sqlite::memory:", false).await.unwrap();
        let backend = Arc::new(ScriptedMediaBackend::new());
        let handler = DownloadHandler::new(
            store,
            EventHub::new(),
            backend,
            NotifierRegistry::empty(),
            ProgressTracker::new(),
        );

        let result = handler.run(VideoId(999)).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
