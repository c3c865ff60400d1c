//! The dispatcher loop and per-task execution.

use crate::db::{SETTINGS_DOWNLOAD_PAUSED, SETTINGS_SYNC_PAUSED, SETTINGS_WORKER_PAUSED};
use crate::event_hub::topics;
use crate::types::{TaskLogLevel, TaskType};

use super::{is_permanent_failure, Engine};

impl Engine {
    /// Runs until [`Engine::shutdown`] is called. Each iteration blocks on
    /// either the `task_event` wakeup or a poll-interval timeout, then leases
    /// and submits whatever each pool has capacity for.
    pub(super) async fn dispatch_loop(&self) {
        tracing::info!(
            max_sync = self.config.max_sync_workers,
            max_download = self.config.max_download_workers,
            "dispatcher started"
        );

        loop {
            tokio::select! {
                _ = self.task_event.notified() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = self.shutdown.notified() => {
                    tracing::info!("dispatcher shutting down");
                    return;
                }
            }

            if self.is_shutting_down() {
                return;
            }

            if let Err(error) = self.tick().await {
                tracing::error!(%error, "dispatcher tick failed");
            }
        }
    }

    async fn tick(&self) -> crate::Result<()> {
        if self.store.get_bool_setting(SETTINGS_WORKER_PAUSED).await? {
            return Ok(());
        }

        self.dispatch_type(TaskType::Sync, SETTINGS_SYNC_PAUSED).await?;
        self.dispatch_type(TaskType::Download, SETTINGS_DOWNLOAD_PAUSED).await?;
        Ok(())
    }

    async fn dispatch_type(&self, task_type: TaskType, pause_key: &str) -> crate::Result<()> {
        if self.store.get_bool_setting(pause_key).await? {
            return Ok(());
        }

        // The schedule gate is consulted only on the automatic enqueue path
        // (`Engine::enqueue_pending_downloads`), never here. A download task
        // already sitting in the queue — manually or automatically enqueued —
        // is leased and run on the normal schedule regardless of the current
        // window, so a manual download is never blocked by a closed window.
        let max_workers = match task_type {
            TaskType::Sync => self.config.max_sync_workers,
            TaskType::Download => self.config.max_download_workers,
        };
        let available = max_workers.saturating_sub(self.running.get(task_type));
        if available == 0 {
            return Ok(());
        }

        let leased = self.store.lease_pending(task_type, available as i64).await?;
        for task in leased {
            self.running.increment(task_type);
            self.hub.publish(topics::TASKS).await;
            if let Some(list_id) = self.resolve_list_id(task_type, task.entity_id).await {
                self.hub.publish(&topics::list_tasks(list_id)).await;
            }

            let engine = self.clone();
            tokio::spawn(async move {
                engine.execute(task.id, task.entity_id, task.retry_count, task.max_retries, task_type).await;
                engine.running.decrement(task_type);
                engine.notify();
            });
        }

        Ok(())
    }

    /// Runs one leased task to completion, updating its Store row and
    /// publishing the resulting state change. Guaranteed to decrement the
    /// pool's running count via its caller, even if this panics partway
    /// through — the caller's decrement happens in the spawned task body
    /// after this returns, not inside a `finally`-style guard, since Rust
    /// has no equivalent; a panic here would abort the whole process under
    /// the default panic strategy, which is an acceptable failure mode for a
    /// handler bug.
    async fn execute(&self, task_id: crate::types::TaskId, entity_id: i64, retry_count: i32, max_retries: i32, task_type: TaskType) {
        let attempt = retry_count + 1;
        if let Err(error) = self
            .store
            .append_task_log(task_id, attempt, TaskLogLevel::Info, &format!("Starting attempt {attempt}"))
            .await
        {
            tracing::error!(%error, task_id = task_id.get(), "failed to append start log");
        }

        let outcome = match task_type {
            TaskType::Sync => self.run_sync_handler(entity_id).await,
            TaskType::Download => self.run_download_handler(entity_id).await,
        };

        match outcome {
            Ok(result) => self.complete_task(task_id, attempt, result).await,
            Err(error) if is_permanent_failure(&error) => {
                self.fail_permanently(task_id, attempt, &error.to_string()).await
            }
            Err(error) => self.fail_transiently(task_id, attempt, max_retries, &error.to_string()).await,
        }
    }

    async fn complete_task(&self, task_id: crate::types::TaskId, attempt: i32, result: Option<String>) {
        if let Err(error) = self.store.mark_task_completed(task_id, result.clone()).await {
            tracing::error!(%error, task_id = task_id.get(), "failed to mark task completed");
            return;
        }
        let message = match &result {
            Some(payload) => format!("Completed successfully: {payload}"),
            None => "Completed successfully".to_string(),
        };
        self.log_and_publish(task_id, attempt, TaskLogLevel::Info, &message).await;
    }

    async fn fail_transiently(&self, task_id: crate::types::TaskId, attempt: i32, max_retries: i32, error: &str) {
        match self.store.mark_task_failed(task_id, error).await {
            Ok(true) => {
                let message = format!("Failed (attempt {attempt}/{max_retries}): {error}. Will retry.");
                self.log_and_publish(task_id, attempt, TaskLogLevel::Warning, &message).await;
            }
            Ok(false) => {
                let message = format!("Failed permanently after {attempt} attempts: {error}");
                self.log_and_publish(task_id, attempt, TaskLogLevel::Error, &message).await;
            }
            Err(store_error) => {
                tracing::error!(%store_error, task_id = task_id.get(), "failed to record task failure");
            }
        }
    }

    async fn fail_permanently(&self, task_id: crate::types::TaskId, attempt: i32, error: &str) {
        // Force straight to `failed` regardless of retry budget: a NotFound
        // or validation failure will not resolve itself on a later attempt.
        if let Err(store_error) = self.store.fail_task_permanently(task_id, error).await {
            tracing::error!(%store_error, task_id = task_id.get(), "failed to record permanent failure");
            return;
        }
        let message = format!("Failed permanently after {attempt} attempts: {error}");
        self.log_and_publish(task_id, attempt, TaskLogLevel::Error, &message).await;
    }

    async fn log_and_publish(&self, task_id: crate::types::TaskId, attempt: i32, level: TaskLogLevel, message: &str) {
        if let Err(error) = self.store.append_task_log(task_id, attempt, level, message).await {
            tracing::error!(%error, task_id = task_id.get(), "failed to append task log");
        }
        self.hub.publish(topics::TASKS).await;
        self.hub.publish(topics::TASKS_STATS).await;
    }
}
