//! Append-only per-attempt audit trail for Tasks.

use crate::error::StoreError;
use crate::types::{TaskId, TaskLogLevel};
use crate::{Error, Result};
use std::str::FromStr;

use super::{Store, TaskLog};

impl Store {
    /// Append a log entry to a Task's attempt timeline
    pub async fn append_task_log(
        &self,
        task_id: TaskId,
        attempt: i32,
        level: TaskLogLevel,
        message: &str,
    ) -> Result<TaskLog> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO task_logs (task_id, attempt, level, message, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(task_id)
        .bind(attempt)
        .bind(level.as_str())
        .bind(message)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to append task log: {e}"))))?;

        Ok(TaskLog {
            id: result.last_insert_rowid(),
            task_id: task_id.get(),
            attempt,
            level: level.as_str().to_string(),
            message: message.to_string(),
            created_at: now,
        })
    }

    /// Fetch the full attempt timeline for a Task, ordered oldest first
    pub async fn list_task_logs(&self, task_id: TaskId) -> Result<Vec<TaskLog>> {
        let rows = sqlx::query_as::<_, TaskLog>(
            "SELECT id, task_id, attempt, level, message, created_at FROM task_logs \
             WHERE task_id = ? ORDER BY created_at ASC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to list task logs: {e}"))))?;

        Ok(rows)
    }

    /// Parsed severity of a task log row
    pub fn task_log_level(log: &TaskLog) -> Result<TaskLogLevel> {
        TaskLogLevel::from_str(&log.level)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskType;

    async fn test_store() -> Store {
        Store::new("sqlite::memory:", false).await.unwrap()
    }

    #[tokio::test]
    async fn append_and_list_task_logs_in_order() {
        let store = test_store().await;
        let task = store.insert_task(TaskType::Sync, 1, 3).await.unwrap();

        store
            .append_task_log(task.id, 1, TaskLogLevel::Info, "Starting attempt 1")
            .await
            .unwrap();
        store
            .append_task_log(task.id, 1, TaskLogLevel::Warning, "will retry")
            .await
            .unwrap();
        store
            .append_task_log(task.id, 2, TaskLogLevel::Error, "failed permanently")
            .await
            .unwrap();

        let logs = store.list_task_logs(task.id).await.unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].message, "Starting attempt 1");
        assert_eq!(logs[1].level, "warning");
        assert_eq!(logs[2].attempt, 2);
    }

    #[test]
    fn task_log_level_parses_stored_string() {
        let log = TaskLog {
            id: 1,
            task_id: 1,
            attempt: 1,
            level: "error".to_string(),
            message: "boom".to_string(),
            created_at: 0,
        };
        assert_eq!(Store::task_log_level(&log).unwrap(), TaskLogLevel::Error);
    }
}
