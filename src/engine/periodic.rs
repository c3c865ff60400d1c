//! Three cooperative-timer background jobs that keep the task queue fed
//! without an external cron: sync lists on their configured cadence,
//! opportunistically enqueue eligible downloads, and prune old rows.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::Result;
use crate::types::TaskType;

use super::Engine;

const SYNC_DUE_LISTS_INTERVAL: Duration = Duration::from_secs(30 * 60);
const ENQUEUE_DOWNLOADS_INTERVAL: Duration = Duration::from_secs(5 * 60);
const PRUNE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on how many downloads `enqueue_pending_downloads` enqueues
/// per tick, so one slow cycle never floods the queue past what the
/// download pool could reasonably burn through before the next tick.
const MAX_DOWNLOADS_PER_CYCLE: i64 = 100;

/// Outcome of one `sync_due_lists` tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleSyncsSummary {
    /// Lists for which a sync task was newly enqueued
    pub enqueued: usize,
    /// Due lists skipped because a sync task was already active for them
    pub skipped: usize,
}

/// Outcome of one `enqueue_pending_downloads` tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleDownloadsSummary {
    /// Videos for which a download task was newly enqueued
    pub enqueued: usize,
    /// Eligible videos skipped because a download task was already active
    pub skipped: usize,
    /// Set when the whole tick was a no-op because the schedule gate is closed
    pub reason: Option<String>,
}

/// Outcome of one `prune_retained` tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneSummary {
    /// Terminal task rows deleted
    pub tasks_deleted: u64,
    /// History rows deleted
    pub history_deleted: u64,
}

/// Drives the three periodic jobs on their own independent timers. Holds an
/// [`Engine`] handle rather than owning collaborators directly, since all
/// three jobs are really just privileged callers of the engine's own public
/// enqueue API.
pub struct PeriodicScheduler {
    engine: Engine,
}

impl PeriodicScheduler {
    /// Build a scheduler around an engine handle.
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Spawn all three jobs on the current Tokio runtime. Each exits once
    /// the engine starts shutting down.
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        vec![
            {
                let engine = self.engine.clone();
                tokio::spawn(async move { run_loop(engine, SYNC_DUE_LISTS_INTERVAL, Engine::sync_due_lists).await })
            },
            {
                let engine = self.engine.clone();
                tokio::spawn(async move {
                    run_loop(engine, ENQUEUE_DOWNLOADS_INTERVAL, Engine::enqueue_pending_downloads).await
                })
            },
            {
                let engine = self.engine.clone();
                tokio::spawn(async move { run_loop(engine, PRUNE_INTERVAL, Engine::prune_retained).await })
            },
        ]
    }
}

/// Shared driver for a periodic job: ticks on `interval`, stops once the
/// engine is shutting down, and logs (without propagating) any error a tick
/// returns so one bad tick never kills the loop.
async fn run_loop<F, Fut, T>(engine: Engine, interval: Duration, job: F)
where
    F: Fn(&Engine) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    T: std::fmt::Debug,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // consume the immediate first tick `interval()` always fires
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = engine.shutdown.notified() => return,
        }
        if engine.is_shutting_down() {
            return;
        }
        match job(&engine).await {
            Ok(summary) => tracing::debug!(?summary, "periodic job completed"),
            Err(error) => tracing::error!(%error, "periodic job failed"),
        }
    }
}

impl Engine {
    /// Enqueue a sync task for every List whose last-sync age exceeds its
    /// configured cadence (or that has never synced).
    pub async fn sync_due_lists(&self) -> Result<ScheduleSyncsSummary> {
        let due = self.store.list_due_for_sync().await?;
        let mut summary = ScheduleSyncsSummary::default();

        for list in due {
            match self.enqueue(TaskType::Sync, list.id.get(), self.config.retry.max_attempts as i32).await? {
                Some(_) => summary.enqueued += 1,
                None => summary.skipped += 1,
            }
        }

        if summary.enqueued > 0 {
            tracing::info!(enqueued = summary.enqueued, skipped = summary.skipped, "scheduled due syncs");
        }
        Ok(summary)
    }

    /// Enqueue a download task for up to [`MAX_DOWNLOADS_PER_CYCLE`] videos
    /// eligible for automatic download, honoring the schedule gate.
    pub async fn enqueue_pending_downloads(&self) -> Result<ScheduleDownloadsSummary> {
        if !self.schedule_gate.is_download_allowed().await? {
            return Ok(ScheduleDownloadsSummary {
                reason: Some("schedule".to_string()),
                ..Default::default()
            });
        }

        let candidates = self.store.find_downloadable(MAX_DOWNLOADS_PER_CYCLE).await?;
        let mut summary = ScheduleDownloadsSummary::default();

        for video in candidates {
            match self.enqueue(TaskType::Download, video.id.get(), self.config.retry.max_attempts as i32).await? {
                Some(_) => summary.enqueued += 1,
                None => summary.skipped += 1,
            }
        }

        if summary.enqueued > 0 {
            tracing::info!(enqueued = summary.enqueued, skipped = summary.skipped, "scheduled pending downloads");
        }
        Ok(summary)
    }

    /// Delete terminal Task and History rows past the configured retention
    /// window. A `data_retention_days` of `0` disables pruning entirely —
    /// pending/running tasks are never touched regardless.
    pub async fn prune_retained(&self) -> Result<PruneSummary> {
        let retention_days = self.store.get_data_retention_days().await?;

        if retention_days == 0 {
            return Ok(PruneSummary::default());
        }

        let tasks_deleted = self.store.prune_old_tasks(retention_days).await?;
        let history_deleted = self.store.prune_old_history(retention_days).await?;

        if tasks_deleted > 0 || history_deleted > 0 {
            tracing::info!(tasks_deleted, history_deleted, retention_days, "pruned retained rows");
        }
        Ok(PruneSummary { tasks_deleted, history_deleted })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::db::{ListFields, ProfileFields, Store};
    use crate::event_hub::EventHub;
    use crate::media_backend::ScriptedMediaBackend;
    use crate::notifier::NotifierRegistry;
    use crate::types::{ListType, SponsorBlockBehavior, SyncFrequency};
    use std::sync::Arc;

    async fn engine_with_list() -> (Engine, crate::types::ListId) {
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

        let engine = Engine::new(
            store,
            EventHub::new(),
            Arc::new(ScriptedMediaBackend::new()),
            NotifierRegistry::empty(),
            EngineConfig::default(),
        );
        (engine, list.id)
    }

    #[tokio::test]
    async fn sync_due_lists_enqueues_never_synced_list() {
        let (engine, list_id) = engine_with_list().await;
        let summary = engine.sync_due_lists().await.unwrap();
        assert_eq!(summary.enqueued, 1);
        assert_eq!(summary.skipped, 0);

        let active = engine.store.find_active_task(TaskType::Sync, list_id.get()).await.unwrap();
        assert!(active.is_some());
    }

    #[tokio::test]
    async fn sync_due_lists_skips_list_with_active_task() {
        let (engine, list_id) = engine_with_list().await;
        engine.sync_due_lists().await.unwrap();
        let summary = engine.sync_due_lists().await.unwrap();
        assert_eq!(summary.enqueued, 0);
        assert_eq!(summary.skipped, 1);
        let _ = list_id;
    }

    #[tokio::test]
    async fn enqueue_pending_downloads_respects_schedule_gate() {
        let (engine, _list_id) = engine_with_list().await;
        engine.store.create_schedule(crate::db::ScheduleFields {
            name: "quiet hours".into(),
            enabled: true,
            days_of_week: vec![],
            start_time: "00:00".into(),
            end_time: "23:59".into(),
        }).await.unwrap();

        // an empty days_of_week matches no day at all, so the schedule never
        // admits regardless of the time window
        let summary = engine.enqueue_pending_downloads().await.unwrap();
        assert_eq!(summary.reason.as_deref(), Some("schedule"));
        assert_eq!(summary.enqueued, 0);
    }

    #[tokio::test]
    async fn prune_retained_is_a_noop_when_retention_disabled() {
        let (engine, _list_id) = engine_with_list().await;
        let summary = engine.prune_retained().await.unwrap();
        assert_eq!(summary, PruneSummary::default());
    }

    #[tokio::test]
    async fn prune_retained_deletes_old_terminal_tasks() {
        let (engine, list_id) = engine_with_list().await;

        let task = engine.enqueue(TaskType::Sync, list_id.get(), 3).await.unwrap().unwrap();
        engine.store.mark_task_completed(task.id, None).await.unwrap();

        // retention still 0 -> disabled, nothing pruned
        let summary = engine.prune_retained().await.unwrap();
        assert_eq!(summary.tasks_deleted, 0);

        engine.store.set_setting(crate::db::SETTINGS_DATA_RETENTION_DAYS, "30").await.unwrap();
        let summary = engine.prune_retained().await.unwrap();
        // the just-completed task is within the retention window, so nothing to prune yet
        assert_eq!(summary.tasks_deleted, 0);
    }
}
