//! Task queue CRUD and the dispatcher's leasing queries.

use crate::error::{StoreError, TaskError};
use crate::types::{TaskId, TaskStatus, TaskType};
use crate::{Error, Result};
use chrono::{TimeZone, Utc};
use sqlx::FromRow;
use std::collections::HashMap;
use std::str::FromStr;

use super::{BulkInsertResult, Store, Task};

/// Tasks are inserted/requeried in batches this large to stay well under SQLite's
/// per-statement bound-parameter ceiling.
const BULK_INSERT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, FromRow)]
struct TaskRow {
    id: i64,
    task_type: String,
    entity_id: i64,
    status: String,
    result: Option<String>,
    error: Option<String>,
    retry_count: i32,
    max_retries: i32,
    created_at: i64,
    started_at: Option<i64>,
    completed_at: Option<i64>,
}

impl TryFrom<TaskRow> for Task {
    type Error = Error;

    fn try_from(row: TaskRow) -> Result<Self> {
        Ok(Task {
            id: TaskId(row.id),
            task_type: TaskType::from_str(&row.task_type)?,
            entity_id: row.entity_id,
            status: TaskStatus::from_str(&row.status)?,
            result: row.result,
            error: row.error,
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            created_at: timestamp(row.created_at),
            started_at: row.started_at.map(timestamp),
            completed_at: row.completed_at.map(timestamp),
        })
    }
}

fn timestamp(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

const TASK_COLUMNS: &str =
    "id, task_type, entity_id, status, result, error, retry_count, max_retries, created_at, started_at, completed_at";

impl Store {
    /// Fetch a Task by ID
    pub async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to get task: {e}"))))?;

        row.map(Task::try_from).transpose()
    }

    /// List tasks, optionally filtered by status, newest first
    pub async fn list_tasks(&self, status: Option<TaskStatus>, limit: i64) -> Result<Vec<Task>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, TaskRow>(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE status = ? ORDER BY created_at DESC LIMIT ?"
                ))
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, TaskRow>(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC LIMIT ?"
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to list tasks: {e}"))))?;

        rows.into_iter().map(Task::try_from).collect()
    }

    /// The dedup probe: is there already an active task for this (type, entity)?
    pub async fn find_active_task(&self, task_type: TaskType, entity_id: i64) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE task_type = ? AND entity_id = ? \
             AND status IN ('pending', 'running', 'paused') LIMIT 1"
        ))
        .bind(task_type.as_str())
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to probe active task: {e}"))))?;

        row.map(Task::try_from).transpose()
    }

    /// Unchecked insert; callers must already hold the dedup guarantee (see
    /// [`Store::insert_task_if_absent`] for the guarded version).
    pub async fn insert_task(&self, task_type: TaskType, entity_id: i64, max_retries: i32) -> Result<Task> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO tasks (task_type, entity_id, status, retry_count, max_retries, created_at) \
             VALUES (?, ?, 'pending', 0, ?, ?)",
        )
        .bind(task_type.as_str())
        .bind(entity_id)
        .bind(max_retries)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to insert task: {e}"))))?;

        let id = TaskId(result.last_insert_rowid());
        self.get_task(id)
            .await?
            .ok_or_else(|| Error::Store(StoreError::NotFound("task vanished after insert".into())))
    }

    /// Insert a task for `(task_type, entity_id)` unless one is already active,
    /// in a single transaction so the dedup check and the insert are atomic
    /// against concurrent callers (the partial unique index is the backstop).
    pub async fn insert_task_if_absent(
        &self,
        task_type: TaskType,
        entity_id: i64,
        max_retries: i32,
    ) -> Result<Option<Task>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to begin transaction: {e}"))))?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM tasks WHERE task_type = ? AND entity_id = ? \
             AND status IN ('pending', 'running', 'paused') LIMIT 1",
        )
        .bind(task_type.as_str())
        .bind(entity_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to probe active task: {e}"))))?;

        if existing.is_some() {
            tx.rollback().await.ok();
            return Ok(None);
        }

        let now = chrono::Utc::now().timestamp();
        let insert_result = sqlx::query(
            "INSERT INTO tasks (task_type, entity_id, status, retry_count, max_retries, created_at) \
             VALUES (?, ?, 'pending', 0, ?, ?)",
        )
        .bind(task_type.as_str())
        .bind(entity_id)
        .bind(max_retries)
        .bind(now)
        .execute(&mut *tx)
        .await;

        let id = match insert_result {
            Ok(result) => result.last_insert_rowid(),
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await.ok();
                return Ok(None);
            }
            Err(e) => {
                tx.rollback().await.ok();
                return Err(Error::Store(StoreError::QueryFailed(format!("failed to insert task: {e}"))));
            }
        };

        tx.commit()
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to commit task insert: {e}"))))?;

        self.get_task(TaskId(id))
            .await?
            .map(Some)
            .ok_or_else(|| Error::Store(StoreError::NotFound("task vanished after insert".into())))
    }

    /// Insert tasks for every entity id that doesn't already have an active task,
    /// chunked to respect SQLite's bound-parameter ceiling. The whole call is not
    /// one giant transaction — each chunk commits independently — but within a
    /// chunk the dedup-check-then-insert pairs are atomic per entity.
    pub async fn bulk_insert_tasks(
        &self,
        task_type: TaskType,
        entity_ids: &[i64],
        max_retries: i32,
    ) -> Result<BulkInsertResult> {
        let mut result = BulkInsertResult::default();

        for chunk in entity_ids.chunks(BULK_INSERT_CHUNK_SIZE) {
            for &entity_id in chunk {
                match self.insert_task_if_absent(task_type, entity_id, max_retries).await? {
                    Some(task) => result.inserted.push(task),
                    None => result.skipped.push(entity_id),
                }
            }
        }

        Ok(result)
    }

    /// Atomically lease up to `limit` pending tasks of `task_type`, oldest first,
    /// transitioning them to `running` with `started_at = now`.
    pub async fn lease_pending(&self, task_type: TaskType, limit: i64) -> Result<Vec<Task>> {
        if limit <= 0 {
            return Ok(vec![]);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to begin transaction: {e}"))))?;

        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM tasks WHERE task_type = ? AND status = 'pending' \
             ORDER BY created_at ASC LIMIT ?",
        )
        .bind(task_type.as_str())
        .bind(limit)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to select pending tasks: {e}"))))?;

        if ids.is_empty() {
            tx.commit().await.ok();
            return Ok(vec![]);
        }

        let now = chrono::Utc::now().timestamp();
        for id in &ids {
            sqlx::query("UPDATE tasks SET status = 'running', started_at = ? WHERE id = ?")
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to lease task: {e}"))))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to commit lease: {e}"))))?;

        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.get_task(TaskId(id)).await? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    /// Transition a task to `completed`
    pub async fn mark_task_completed(&self, id: TaskId, result: Option<String>) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let affected = sqlx::query(
            "UPDATE tasks SET status = 'completed', result = ?, completed_at = ? WHERE id = ?",
        )
        .bind(result)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to mark task completed: {e}"))))?
        .rows_affected();

        if affected == 0 {
            return Err(Error::Task(TaskError::NotFound { id: id.get() }));
        }
        Ok(())
    }

    /// Record a failed attempt: either requeue for retry or fail permanently,
    /// depending on whether `retry_count` (after incrementing) is still under
    /// `max_retries`. Returns `true` if the task will retry, `false` if failed.
    pub async fn mark_task_failed(&self, id: TaskId, error: &str) -> Result<bool> {
        let task = self
            .get_task(id)
            .await?
            .ok_or(Error::Task(TaskError::NotFound { id: id.get() }))?;

        let new_retry_count = task.retry_count + 1;
        if new_retry_count < task.max_retries {
            sqlx::query(
                "UPDATE tasks SET status = 'pending', started_at = NULL, error = ?, retry_count = ? WHERE id = ?",
            )
            .bind(error)
            .bind(new_retry_count)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to requeue task: {e}"))))?;
            Ok(true)
        } else {
            let now = chrono::Utc::now().timestamp();
            sqlx::query(
                "UPDATE tasks SET status = 'failed', error = ?, retry_count = ?, completed_at = ? WHERE id = ?",
            )
            .bind(error)
            .bind(new_retry_count)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to fail task: {e}"))))?;
            Ok(false)
        }
    }

    /// Force a task straight to `failed`, regardless of its retry budget.
    /// Used when a handler's failure is known unrecoverable (e.g. the target
    /// entity was deleted) rather than merely transient.
    pub async fn fail_task_permanently(&self, id: TaskId, error: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let affected = sqlx::query(
            "UPDATE tasks SET status = 'failed', error = ?, retry_count = retry_count + 1, completed_at = ? WHERE id = ?",
        )
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to fail task permanently: {e}"))))?
        .rows_affected();

        if affected == 0 {
            return Err(Error::Task(TaskError::NotFound { id: id.get() }));
        }
        Ok(())
    }

    /// At process start, recover orphaned `running` tasks left by a crashed process
    pub async fn reset_stale_running(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE tasks SET status = 'pending', started_at = NULL WHERE status = 'running'")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to reset stale running tasks: {e}"))))?;

        Ok(result.rows_affected())
    }

    /// Cancel a task. Permitted only from `pending`/`paused`.
    pub async fn cancel_task(&self, id: TaskId) -> Result<()> {
        let task = self
            .get_task(id)
            .await?
            .ok_or(Error::Task(TaskError::NotFound { id: id.get() }))?;

        if !matches!(task.status, TaskStatus::Pending | TaskStatus::Paused) {
            return Err(Error::Task(TaskError::InvalidState {
                id: id.get(),
                operation: "cancel".to_string(),
                current_state: task.status.as_str().to_string(),
            }));
        }

        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE tasks SET status = 'cancelled', completed_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to cancel task: {e}"))))?;

        Ok(())
    }

    /// Pause a task. Permitted only from `pending`.
    pub async fn pause_task(&self, id: TaskId) -> Result<()> {
        let task = self
            .get_task(id)
            .await?
            .ok_or(Error::Task(TaskError::NotFound { id: id.get() }))?;

        if task.status != TaskStatus::Pending {
            return Err(Error::Task(TaskError::InvalidState {
                id: id.get(),
                operation: "pause".to_string(),
                current_state: task.status.as_str().to_string(),
            }));
        }

        sqlx::query("UPDATE tasks SET status = 'paused' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to pause task: {e}"))))?;

        Ok(())
    }

    /// Resume a paused task back to pending.
    pub async fn resume_task(&self, id: TaskId) -> Result<()> {
        let task = self
            .get_task(id)
            .await?
            .ok_or(Error::Task(TaskError::NotFound { id: id.get() }))?;

        if task.status != TaskStatus::Paused {
            return Err(Error::Task(TaskError::InvalidState {
                id: id.get(),
                operation: "resume".to_string(),
                current_state: task.status.as_str().to_string(),
            }));
        }

        sqlx::query("UPDATE tasks SET status = 'pending' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to resume task: {e}"))))?;

        Ok(())
    }

    /// Retry a terminal task: resets status/counters so it is leased again.
    /// Permitted from `{failed, completed, cancelled}`.
    pub async fn retry_task(&self, id: TaskId) -> Result<()> {
        let task = self
            .get_task(id)
            .await?
            .ok_or(Error::Task(TaskError::NotFound { id: id.get() }))?;

        if !task.status.is_terminal() {
            return Err(Error::Task(TaskError::InvalidState {
                id: id.get(),
                operation: "retry".to_string(),
                current_state: task.status.as_str().to_string(),
            }));
        }

        sqlx::query(
            "UPDATE tasks SET status = 'pending', error = NULL, retry_count = 0, \
             started_at = NULL, completed_at = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to retry task: {e}"))))?;

        Ok(())
    }

    /// Count tasks currently running, per task type
    pub async fn count_running(&self, task_type: TaskType) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE task_type = ? AND status = 'running'")
            .bind(task_type.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to count running tasks: {e}"))))
    }

    /// Batched display-name lookup for a set of weakly-referenced Task targets.
    /// `task_type` selects whether ids are resolved against `lists` or `videos`.
    pub async fn batch_get_entity_names(
        &self,
        task_type: TaskType,
        ids: &[i64],
    ) -> Result<HashMap<i64, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let table = match task_type {
            TaskType::Sync => "lists",
            TaskType::Download => "videos",
        };

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("SELECT id, name FROM {table} WHERE id IN ({placeholders})");
        // videos has no `name` column; alias `title` so both branches share a shape.
        let sql = if table == "videos" {
            format!("SELECT id, title AS name FROM videos WHERE id IN ({placeholders})")
        } else {
            sql
        };

        let mut query = sqlx::query_as::<_, (i64, String)>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to batch resolve entity names: {e}"))))?;

        Ok(super::rows_to_name_map(rows))
    }

    /// Delete terminal Task rows older than `retention_days`; pending/running
    /// rows are never touched.
    pub async fn prune_old_tasks(&self, retention_days: u32) -> Result<u64> {
        let cutoff = (Utc::now() - chrono::Duration::days(retention_days as i64)).timestamp();
        let result = sqlx::query(
            "DELETE FROM tasks WHERE status IN ('completed', 'failed', 'cancelled') AND completed_at < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to prune tasks: {e}"))))?;

        Ok(result.rows_affected())
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> Store {
        Store::new("sqlite::memory:", false).await.unwrap()
    }

    #[tokio::test]
    async fn insert_task_if_absent_rejects_second_active_task() {
        let store = test_store().await;
        let first = store.insert_task_if_absent(TaskType::Sync, 1, 3).await.unwrap();
        assert!(first.is_some());
        let second = store.insert_task_if_absent(TaskType::Sync, 1, 3).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn insert_task_if_absent_allows_after_completion() {
        let store = test_store().await;
        let task = store.insert_task_if_absent(TaskType::Sync, 1, 3).await.unwrap().unwrap();
        store.mark_task_completed(task.id, None).await.unwrap();
        let second = store.insert_task_if_absent(TaskType::Sync, 1, 3).await.unwrap();
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn lease_pending_transitions_to_running() {
        let store = test_store().await;
        store.insert_task(TaskType::Download, 1, 3).await.unwrap();
        store.insert_task(TaskType::Download, 2, 3).await.unwrap();

        let leased = store.lease_pending(TaskType::Download, 10).await.unwrap();
        assert_eq!(leased.len(), 2);
        assert!(leased.iter().all(|t| t.status == TaskStatus::Running));
        assert!(leased.iter().all(|t| t.started_at.is_some()));
    }

    #[tokio::test]
    async fn lease_pending_respects_limit_and_fifo_order() {
        let store = test_store().await;
        store.insert_task(TaskType::Sync, 1, 3).await.unwrap();
        store.insert_task(TaskType::Sync, 2, 3).await.unwrap();
        store.insert_task(TaskType::Sync, 3, 3).await.unwrap();

        let leased = store.lease_pending(TaskType::Sync, 2).await.unwrap();
        assert_eq!(leased.len(), 2);
        assert_eq!(leased[0].entity_id, 1);
        assert_eq!(leased[1].entity_id, 2);
    }

    #[tokio::test]
    async fn mark_task_failed_retries_until_max_retries_then_fails() {
        let store = test_store().await;
        let task = store.insert_task(TaskType::Download, 1, 2).await.unwrap();

        let will_retry = store.mark_task_failed(task.id, "transient").await.unwrap();
        assert!(will_retry);
        let task = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1);

        let will_retry = store.mark_task_failed(task.id, "transient again").await.unwrap();
        assert!(!will_retry);
        let task = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn reset_stale_running_recovers_orphaned_tasks() {
        let store = test_store().await;
        store.insert_task(TaskType::Sync, 1, 3).await.unwrap();
        store.lease_pending(TaskType::Sync, 1).await.unwrap();

        let recovered = store.reset_stale_running().await.unwrap();
        assert_eq!(recovered, 1);

        let tasks = store.list_tasks(Some(TaskStatus::Pending), 10).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].started_at.is_none());
    }

    #[tokio::test]
    async fn cancel_task_rejects_running() {
        let store = test_store().await;
        let task = store.insert_task(TaskType::Sync, 1, 3).await.unwrap();
        store.lease_pending(TaskType::Sync, 1).await.unwrap();
        let result = store.cancel_task(task.id).await;
        assert!(matches!(result, Err(Error::Task(TaskError::InvalidState { .. }))));
    }

    #[tokio::test]
    async fn cancel_task_allows_pending() {
        let store = test_store().await;
        let task = store.insert_task(TaskType::Sync, 1, 3).await.unwrap();
        store.cancel_task(task.id).await.unwrap();
        let task = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn retry_task_resets_counters() {
        let store = test_store().await;
        let task = store.insert_task(TaskType::Sync, 1, 1).await.unwrap();
        store.mark_task_failed(task.id, "boom").await.unwrap();
        let task = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);

        store.retry_task(task.id).await.unwrap();
        let task = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 0);
        assert!(task.error.is_none());
    }

    #[tokio::test]
    async fn bulk_insert_tasks_skips_duplicates_and_reports_them() {
        let store = test_store().await;
        store.insert_task(TaskType::Download, 1, 3).await.unwrap();

        let result = store
            .bulk_insert_tasks(TaskType::Download, &[1, 2, 3], 3)
            .await
            .unwrap();

        assert_eq!(result.inserted.len(), 2);
        assert_eq!(result.skipped, vec![1]);
    }

    #[tokio::test]
    async fn fail_task_permanently_skips_the_retry_ladder() {
        let store = test_store().await;
        let task = store.insert_task(TaskType::Download, 1, 3).await.unwrap();

        store.fail_task_permanently(task.id, "video deleted upstream").await.unwrap();

        let task = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.retry_count, 1);
        assert_eq!(task.error.as_deref(), Some("video deleted upstream"));
    }

    #[tokio::test]
    async fn prune_old_tasks_leaves_recent_and_non_terminal_rows() {
        let store = test_store().await;
        let task = store.insert_task(TaskType::Sync, 1, 3).await.unwrap();
        store.mark_task_completed(task.id, None).await.unwrap();

        let pruned = store.prune_old_tasks(30).await.unwrap();
        assert_eq!(pruned, 0);

        let still_there = store.get_task(task.id).await.unwrap();
        assert!(still_there.is_some());
    }
}
