//! The persistent task engine: dispatcher, worker pools, and the public
//! enqueue/pause/cancel/retry contract.
//!
//! Organized by domain, mirroring [`crate::db`]'s submodule split:
//! - [`dispatch`] — the dispatcher loop and per-task execution
//! - [`sync_handler`] — `SyncHandler`, invoked per leased sync task
//! - [`download_handler`] — `DownloadHandler`, invoked per leased download task
//! - [`periodic`] — the three cooperative-timer background jobs

mod dispatch;
mod download_handler;
mod periodic;
mod sync_handler;

pub use download_handler::DownloadHandler;
pub use periodic::{PeriodicScheduler, PruneSummary, ScheduleDownloadsSummary, ScheduleSyncsSummary};
pub use sync_handler::SyncHandler;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::db::{BulkInsertResult, Store, Task, SETTINGS_DOWNLOAD_PAUSED, SETTINGS_SYNC_PAUSED, SETTINGS_WORKER_PAUSED};
use crate::error::{Error, Result, TaskError};
use crate::event_hub::{topics, EventHub};
use crate::media_backend::MediaBackend;
use crate::notifier::NotifierRegistry;
use crate::progress::ProgressTracker;
use crate::schedule_gate::ScheduleGate;
use crate::types::{TaskId, TaskType};

/// Aggregate dispatcher/pool stats, as returned by [`Engine::get_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Sync tasks currently leased and executing
    pub running_sync: usize,
    /// Download tasks currently leased and executing
    pub running_download: usize,
    /// Configured sync worker pool size
    pub max_sync: usize,
    /// Configured download worker pool size
    pub max_download: usize,
    /// Whether all leasing is paused
    pub paused: bool,
    /// Whether sync leasing specifically is paused
    pub sync_paused: bool,
    /// Whether download leasing specifically is paused
    pub download_paused: bool,
}

/// Scope of a [`Engine::pause`]/[`Engine::resume`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseScope {
    /// Pause/resume both task types
    All,
    /// Pause/resume only sync leasing
    Sync,
    /// Pause/resume only download leasing
    Download,
}

/// Per-pool running-task counters, held under independent atomics so the
/// dispatcher never has to take a lock shared with Store access.
#[derive(Default)]
struct RunningCounts {
    sync: AtomicUsize,
    download: AtomicUsize,
}

impl RunningCounts {
    fn get(&self, task_type: TaskType) -> usize {
        match task_type {
            TaskType::Sync => self.sync.load(Ordering::Acquire),
            TaskType::Download => self.download.load(Ordering::Acquire),
        }
    }

    fn increment(&self, task_type: TaskType) {
        match task_type {
            TaskType::Sync => self.sync.fetch_add(1, Ordering::AcqRel),
            TaskType::Download => self.download.fetch_add(1, Ordering::AcqRel),
        };
    }

    fn decrement(&self, task_type: TaskType) {
        match task_type {
            TaskType::Sync => self.sync.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(v.saturating_sub(1))),
            TaskType::Download => self.download.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(v.saturating_sub(1))),
        }
        .ok();
    }
}

/// The persistent task engine: a Store-backed queue dispatched across bounded
/// sync/download worker pools. All fields are `Arc`-wrapped so `Engine` is
/// cheaply `Clone`, matching the shared-handle shape handlers and the API
/// layer both hold onto.
#[derive(Clone)]
pub struct Engine {
    pub(crate) store: Store,
    pub(crate) hub: EventHub,
    pub(crate) progress: ProgressTracker,
    pub(crate) schedule_gate: ScheduleGate,
    pub(crate) backend: Arc<dyn MediaBackend>,
    pub(crate) notifiers: NotifierRegistry,
    pub(crate) config: EngineConfig,
    running: Arc<RunningCounts>,
    task_event: Arc<Notify>,
    shutdown: Arc<Notify>,
    shutting_down: Arc<std::sync::atomic::AtomicBool>,
}

impl Engine {
    /// Build an engine around the given collaborators. Does not start the
    /// dispatcher loop — call [`Engine::spawn_dispatcher`] once construction
    /// is complete (after [`Engine::recover`] has run).
    pub fn new(
        store: Store,
        hub: EventHub,
        backend: Arc<dyn MediaBackend>,
        notifiers: NotifierRegistry,
        config: EngineConfig,
    ) -> Self {
        Self {
            schedule_gate: ScheduleGate::new(store.clone()),
            store,
            hub,
            progress: ProgressTracker::new(),
            backend,
            notifiers,
            config,
            running: Arc::new(RunningCounts::default()),
            task_event: Arc::new(Notify::new()),
            shutdown: Arc::new(Notify::new()),
            shutting_down: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Crash recovery: flip every orphaned `running` task back to `pending`.
    /// The only legitimate owner of a running row is a live dispatcher; any
    /// survivor found at startup belongs to a process that no longer exists.
    /// Call once, before [`Engine::spawn_dispatcher`].
    pub async fn recover(&self) -> Result<u64> {
        let recovered = self.store.reset_stale_running().await?;
        if recovered > 0 {
            tracing::info!(recovered, "recovered orphaned running tasks at startup");
            self.hub.publish(topics::TASKS).await;
        }
        Ok(recovered)
    }

    /// Spawn the dispatcher loop on the current Tokio runtime. Returns a
    /// handle the caller may await during graceful shutdown.
    pub fn spawn_dispatcher(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move { engine.dispatch_loop().await })
    }

    /// Signal the dispatcher to stop accepting new leases and return once any
    /// in-flight tasks have had a bounded grace period to finish. Tasks still
    /// running when the grace period elapses are recovered via
    /// [`Engine::recover`] on next process start.
    pub async fn shutdown(&self, grace_period: Duration) {
        self.shutting_down.store(true, Ordering::Release);
        self.shutdown.notify_waiters();
        tokio::time::sleep(grace_period).await;
    }

    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// External wake signal: call after inserting a task row outside the
    /// engine's own enqueue methods (e.g. a route handler that wrote
    /// directly) so the dispatcher checks immediately rather than waiting for
    /// the next poll tick.
    pub fn notify(&self) {
        self.task_event.notify_one();
    }

    /// Insert a `pending` task for `(task_type, entity_id)` unless one is
    /// already active. Returns `None` if a duplicate was rejected.
    pub async fn enqueue(&self, task_type: TaskType, entity_id: i64, max_retries: i32) -> Result<Option<Task>> {
        let task = self.store.insert_task_if_absent(task_type, entity_id, max_retries).await?;
        if let Some(task) = &task {
            tracing::info!(task_id = task.id.get(), %task_type, entity_id, "enqueued task");
            self.publish_task_change(task_type, entity_id).await;
            self.notify();
        }
        Ok(task)
    }

    /// Insert tasks for every entity id lacking an active task, in one
    /// round-trip. Skipped ids are reported rather than silently dropped.
    pub async fn enqueue_bulk(&self, task_type: TaskType, entity_ids: &[i64], max_retries: i32) -> Result<BulkInsertResult> {
        let result = self.store.bulk_insert_tasks(task_type, entity_ids, max_retries).await?;
        if !result.inserted.is_empty() {
            tracing::info!(
                task_type = %task_type,
                queued = result.inserted.len(),
                skipped = result.skipped.len(),
                "bulk enqueued tasks"
            );
            self.hub.publish(topics::TASKS).await;
            self.notify();
        }
        Ok(result)
    }

    /// Toggle the persisted pause flag(s) for `scope`. Pause does not preempt
    /// tasks already running; it only withholds future leases.
    pub async fn pause(&self, scope: PauseScope) -> Result<()> {
        match scope {
            PauseScope::All => self.store.set_bool_setting(SETTINGS_WORKER_PAUSED, true).await?,
            PauseScope::Sync => self.store.set_bool_setting(SETTINGS_SYNC_PAUSED, true).await?,
            PauseScope::Download => self.store.set_bool_setting(SETTINGS_DOWNLOAD_PAUSED, true).await?,
        }
        tracing::info!(?scope, "paused");
        Ok(())
    }

    /// Clear the persisted pause flag(s) for `scope` and wake the dispatcher.
    pub async fn resume(&self, scope: PauseScope) -> Result<()> {
        match scope {
            PauseScope::All => self.store.set_bool_setting(SETTINGS_WORKER_PAUSED, false).await?,
            PauseScope::Sync => self.store.set_bool_setting(SETTINGS_SYNC_PAUSED, false).await?,
            PauseScope::Download => self.store.set_bool_setting(SETTINGS_DOWNLOAD_PAUSED, false).await?,
        }
        tracing::info!(?scope, "resumed");
        self.notify();
        Ok(())
    }

    /// Cancel a `pending`/`paused` task. Running tasks cannot be cancelled —
    /// see the design notes on why cancellation mid-download is unsupported.
    pub async fn cancel(&self, task_id: TaskId) -> Result<()> {
        self.store.cancel_task(task_id).await?;
        self.hub.publish(topics::TASKS).await;
        Ok(())
    }

    /// Reset a terminal task back to `pending` with its retry counter
    /// cleared, permitted from `{failed, completed, cancelled}`.
    pub async fn retry(&self, task_id: TaskId) -> Result<()> {
        self.store.retry_task(task_id).await?;
        self.hub.publish(topics::TASKS).await;
        self.notify();
        Ok(())
    }

    /// Current pool occupancy and pause-flag snapshot.
    pub async fn get_stats(&self) -> Result<EngineStats> {
        let worker_paused = self.store.get_bool_setting(SETTINGS_WORKER_PAUSED).await?;
        let sync_paused = self.store.get_bool_setting(SETTINGS_SYNC_PAUSED).await?;
        let download_paused = self.store.get_bool_setting(SETTINGS_DOWNLOAD_PAUSED).await?;

        Ok(EngineStats {
            running_sync: self.running.get(TaskType::Sync),
            running_download: self.running.get(TaskType::Download),
            max_sync: self.config.max_sync_workers,
            max_download: self.config.max_download_workers,
            paused: worker_paused,
            sync_paused,
            download_paused,
        })
    }

    async fn publish_task_change(&self, task_type: TaskType, entity_id: i64) {
        self.hub.publish(topics::TASKS).await;
        if let Some(list_id) = self.resolve_list_id(task_type, entity_id).await {
            self.hub.publish(&topics::list_tasks(list_id)).await;
        }
    }

    /// Resolve the List a task's weakly-referenced entity belongs to, for
    /// list-scoped topic publication. A sync task's entity_id *is* a list_id;
    /// a download task's entity_id is a video_id, so its parent list is
    /// looked up. Returns `None` silently if the entity has since been
    /// deleted — list-scoped notification is best-effort.
    async fn resolve_list_id(&self, task_type: TaskType, entity_id: i64) -> Option<i64> {
        match task_type {
            TaskType::Sync => Some(entity_id),
            TaskType::Download => self
                .store
                .get_video(crate::types::VideoId(entity_id))
                .await
                .ok()
                .flatten()
                .map(|video| video.list_id.get()),
        }
    }
}

/// Whether a handler's error should skip the retry ladder entirely. A
/// missing entity or a validation failure will not resolve itself on a
/// later attempt; everything else is assumed transient and gets the normal
/// retry treatment.
pub(crate) fn is_permanent_failure(error: &Error) -> bool {
    matches!(
        error,
        Error::NotFound(_) | Error::Task(TaskError::NoHandler { .. }) | Error::Validation(_)
    )
}
