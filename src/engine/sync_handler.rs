//! Executes one list-sync task: fetch metadata, diff, insert new videos,
//! apply blacklist and shorts/live filters.

use std::collections::HashSet;
use std::sync::Arc;

use regex::RegexBuilder;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::db::{List, NewVideo, Profile, Store};
use crate::error::{Error, Result};
use crate::event_hub::{topics, EventHub};
use crate::media_backend::{DiscoveredVideo, MediaBackend};
use crate::notifier::NotifierRegistry;
use crate::types::{ListId, MediaType, NotificationEvent};

use super::Engine;

/// `{new_videos, total_found}`, the payload stored as a completed sync
/// task's JSON result.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    /// Videos actually inserted (after blacklist/shorts filtering)
    pub new_videos: usize,
    /// Entries the backend reported, before filtering
    pub total_found: usize,
}

/// Executes a single list-sync task against its collaborators. Held
/// independently of [`Engine`] so it can be unit-tested against a
/// [`crate::media_backend::ScriptedMediaBackend`] without spinning up a
/// dispatcher.
pub struct SyncHandler {
    store: Store,
    hub: EventHub,
    backend: Arc<dyn MediaBackend>,
    notifiers: NotifierRegistry,
}

impl SyncHandler {
    /// Build a handler from its collaborators.
    pub fn new(store: Store, hub: EventHub, backend: Arc<dyn MediaBackend>, notifiers: NotifierRegistry) -> Self {
        Self { store, hub, backend, notifiers }
    }

    /// Run the sync for `list_id` to completion.
    pub async fn run(&self, list_id: ListId) -> Result<SyncOutcome> {
        let list = self
            .store
            .get_list(list_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("list {}", list_id.get())))?;

        let profile = self
            .store
            .get_profile(list.profile_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile {}", list.profile_id.get())))?;

        let url = effective_url(&list.url, profile.include_shorts);
        let blacklist = compile_blacklist(list.title_blacklist.as_deref());
        let existing_ids = self.store.existing_external_ids(list_id).await?;

        let counters = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let insert_lock = Arc::new(AsyncMutex::new(()));

        let store = self.store.clone();
        let hub = self.hub.clone();
        let notifiers = self.notifiers.clone();
        let list = Arc::new(list);
        let profile = Arc::new(profile);
        let blacklist = Arc::new(blacklist);
        let list_for_cb = list.clone();
        let counters_for_cb = counters.clone();

        let total_found = self
            .backend
            .extract_videos(
                &url,
                list.from_date.as_deref(),
                &existing_ids,
                Arc::new(move |discovered: DiscoveredVideo| {
                    let store = store.clone();
                    let hub = hub.clone();
                    let notifiers = notifiers.clone();
                    let list = list_for_cb.clone();
                    let profile = profile.clone();
                    let blacklist = blacklist.clone();
                    let lock = insert_lock.clone();
                    let counters = counters_for_cb.clone();
                    Box::pin(async move {
                        // Shorts/live the profile excludes never reach the store at all.
                        if !profile.include_shorts && discovered.media_type != MediaType::Video {
                            return Ok(());
                        }

                        let reasons = blacklist_reasons(&blacklist, &discovered, list.min_duration, list.max_duration);
                        let new_video = NewVideo {
                            list_id: list.id,
                            external_video_id: discovered.external_video_id.clone(),
                            title: discovered.title.clone(),
                            url: discovered.url.clone(),
                            duration: discovered.duration,
                            upload_date: discovered.upload_date.clone(),
                            thumbnail: discovered.thumbnail.clone(),
                            description: discovered.description.clone(),
                            extractor: discovered.extractor.clone(),
                            media_type: discovered.media_type,
                            blacklisted: !reasons.is_empty(),
                            blacklist_reason: (!reasons.is_empty()).then(|| reasons.join("; ")),
                        };

                        // Serialize inserts: the backend may invoke this callback
                        // from several concurrent fetchers, and SQLite tolerates
                        // only one writer transaction at a time.
                        let _guard = lock.lock().await;
                        let video = store.insert_video(&new_video).await?;
                        drop(_guard);

                        counters.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        hub.publish(&topics::list_videos(list.id.get())).await;
                        notifiers.notify(NotificationEvent::VideoDiscovered { video_id: video.id, list_id: list.id });
                        Ok(())
                    })
                }),
            )
            .await
            .map_err(|e| match e {
                Error::MediaBackend(inner) => Error::MediaBackend(inner),
                other => other,
            })?;

        self.store.touch_list_synced(list_id).await?;

        let new_videos = counters.load(std::sync::atomic::Ordering::Relaxed);
        self.store
            .insert_history(
                Some(list_id),
                "list_synced",
                &format!("synced '{}': {new_videos} new videos of {total_found} found", list.name),
            )
            .await?;

        self.hub.publish(&topics::list_videos(list_id.get())).await;
        self.hub.publish(&topics::list_history(list_id.get())).await;
        self.hub.publish(topics::HISTORY).await;
        self.hub.publish(topics::LISTS).await;
        self.notifiers.notify(NotificationEvent::SyncCompleted { list_id, new_videos });

        Ok(SyncOutcome { new_videos, total_found })
    }
}

/// Rewrites a YouTube-style URL to its `/videos` sub-path when the profile
/// excludes shorts/live and the URL doesn't already name a specific
/// sub-path. Other platforms are returned unchanged — the sub-path
/// convention is YouTube-specific.
fn effective_url(url: &str, include_shorts: bool) -> String {
    if include_shorts {
        return url.to_string();
    }
    if !url.contains("youtube.com") && !url.contains("youtu.be") {
        return url.to_string();
    }

    let trimmed = url.trim_end_matches('/');
    if trimmed.contains("/videos") || trimmed.contains("/shorts") || trimmed.contains("/streams") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/videos")
    }
}

fn compile_blacklist(pattern: Option<&str>) -> Option<regex::Regex> {
    let pattern = pattern?;
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(error) => {
            tracing::warn!(%error, pattern, "invalid title blacklist regex, ignoring");
            None
        }
    }
}

fn blacklist_reasons(
    blacklist: &Option<regex::Regex>,
    video: &DiscoveredVideo,
    min_duration: Option<i64>,
    max_duration: Option<i64>,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if let Some(regex) = blacklist {
        if regex.is_match(&video.title) {
            reasons.push("title matches blacklist pattern".to_string());
        }
    }

    if let Some(duration) = video.duration {
        if let Some(min) = min_duration {
            if duration < min {
                reasons.push(format!("duration {duration}s below minimum {min}s"));
            }
        }
        if let Some(max) = max_duration {
            if duration > max {
                reasons.push(format!("duration {duration}s above maximum {max}s"));
            }
        }
    }

    reasons
}

impl Engine {
    pub(super) async fn run_sync_handler(&self, list_id: i64) -> Result<Option<String>> {
        let handler = SyncHandler::new(self.store.clone(), self.hub.clone(), self.backend.clone(), self.notifiers.clone());
        let outcome = handler.run(ListId(list_id)).await?;
        Ok(Some(serde_json::to_string(&outcome).map_err(Error::Serialization)?))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ListFields, ProfileFields};
    use crate::event_hub::EventHub;
    use crate::media_backend::ScriptedMediaBackend;
    use crate::notifier::NotifierRegistry;
    use crate::types::{ListType, SponsorBlockBehavior, SyncFrequency};

    async fn seeded_store() -> (Store, crate::types::ProfileId, crate::types::ListId) {
        let store = Store::new("sqlite::memory:", false).await.unwrap();
        let profile = store
            .create_profile(ProfileFields {
                name: "default".into(),
                output_format: "mp4".into(),
                resolution: 1080,
                preferred_codecs: vec!["h264".into()],
                include_shorts: false,
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
                url: "https://www.youtube.com/@example".into(),
                profile_id: profile.id,
                name: "Example Channel".into(),
                list_type: ListType::Channel,
                from_date: None,
                sync_frequency: SyncFrequency::Daily,
                enabled: true,
                auto_download: false,
                title_blacklist: Some("clickbait".into()),
                min_duration: Some(60),
                max_duration: None,
                description: None,
                thumbnail: None,
                tags: vec![],
            })
            .await
            .unwrap();

        (store, profile.id, list.id)
    }

    fn discovered(id: &str, title: &str, duration: i64, media_type: MediaType) -> DiscoveredVideo {
        DiscoveredVideo {
            external_video_id: id.to_string(),
            title: title.to_string(),
            url: format!("https://www.youtube.com/watch?v={id}"),
            duration: Some(duration),
            upload_date: Some("20240101".into()),
            thumbnail: None,
            description: None,
            extractor: "youtube".into(),
            media_type,
            labels: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn sync_rewrites_url_to_videos_subpath_when_shorts_excluded() {
        let (store, _profile, list_id) = seeded_store().await;
        let backend = Arc::new(ScriptedMediaBackend::new());
        backend.set_videos(
            "https://www.youtube.com/@example/videos",
            vec![discovered("abc123", "A normal video", 300, MediaType::Video)],
        );

        let handler = SyncHandler::new(store.clone(), EventHub::new(), backend, NotifierRegistry::empty());
        let outcome = handler.run(list_id).await.unwrap();

        assert_eq!(outcome.new_videos, 1);
        assert_eq!(outcome.total_found, 1);
    }

    #[tokio::test]
    async fn sync_marks_blacklisted_title_without_excluding_it() {
        let (store, _profile, list_id) = seeded_store().await;
        let backend = Arc::new(ScriptedMediaBackend::new());
        backend.set_videos(
            "https://www.youtube.com/@example/videos",
            vec![discovered("bait1", "Huge CLICKBAIT title", 300, MediaType::Video)],
        );

        let handler = SyncHandler::new(store.clone(), EventHub::new(), backend, NotifierRegistry::empty());
        handler.run(list_id).await.unwrap();

        let videos = store.list_videos_by_list(list_id).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert!(videos[0].blacklisted);
        assert!(videos[0].error_message.as_deref().unwrap().contains("blacklist"));
    }

    #[tokio::test]
    async fn sync_blacklists_videos_shorter_than_min_duration() {
        let (store, _profile, list_id) = seeded_store().await;
        let backend = Arc::new(ScriptedMediaBackend::new());
        backend.set_videos(
            "https://www.youtube.com/@example/videos",
            vec![discovered("short1", "Too short", 10, MediaType::Video)],
        );

        let handler = SyncHandler::new(store.clone(), EventHub::new(), backend, NotifierRegistry::empty());
        handler.run(list_id).await.unwrap();

        let videos = store.list_videos_by_list(list_id).await.unwrap();
        assert!(videos[0].blacklisted);
        assert!(videos[0].error_message.as_deref().unwrap().contains("duration"));
    }

    #[tokio::test]
    async fn sync_missing_list_raises_not_found() {
        let store = Store::new("sqlite::memory:", false).await.unwrap();
        let backend = Arc::new(ScriptedMediaBackend::new());
        let handler = SyncHandler::new(store, EventHub::new(), backend, NotifierRegistry::empty());

        let result = handler.run(ListId(999)).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
