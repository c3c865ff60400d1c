//! History (audit log) CRUD operations.

use crate::error::StoreError;
use crate::types::ListId;
use crate::{Error, Result};
use chrono::{TimeZone, Utc};
use sqlx::FromRow;

use super::{HistoryEntry, Store};

#[derive(Debug, Clone, FromRow)]
struct HistoryRow {
    id: i64,
    list_id: Option<i64>,
    event_type: String,
    message: String,
    created_at: i64,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        HistoryEntry {
            id: row.id,
            list_id: row.list_id.map(ListId),
            event_type: row.event_type,
            message: row.message,
            created_at: timestamp(row.created_at),
        }
    }
}

fn timestamp(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

const HISTORY_COLUMNS: &str = "id, list_id, event_type, message, created_at";

impl Store {
    /// Append a new history entry, optionally tied to a List
    pub async fn insert_history(
        &self,
        list_id: Option<ListId>,
        event_type: &str,
        message: &str,
    ) -> Result<HistoryEntry> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO history (list_id, event_type, message, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(list_id)
        .bind(event_type)
        .bind(message)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to insert history entry: {e}"))))?;

        let id = result.last_insert_rowid();
        self.get_history_entry(id)
            .await?
            .ok_or_else(|| Error::Store(StoreError::NotFound("history entry vanished after insert".into())))
    }

    /// Fetch a single history entry by id
    pub async fn get_history_entry(&self, id: i64) -> Result<Option<HistoryEntry>> {
        let row = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM history WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to get history entry: {e}"))))?;

        Ok(row.map(HistoryEntry::from))
    }

    /// Query history, newest first, optionally scoped to a single List
    pub async fn query_history(
        &self,
        list_id: Option<ListId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoryEntry>> {
        let rows = match list_id {
            Some(list_id) => {
                sqlx::query_as::<_, HistoryRow>(&format!(
                    "SELECT {HISTORY_COLUMNS} FROM history WHERE list_id = ? \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ))
                .bind(list_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, HistoryRow>(&format!(
                    "SELECT {HISTORY_COLUMNS} FROM history ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to query history: {e}"))))?;

        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    /// Delete history rows older than `retention_days`
    pub async fn prune_old_history(&self, retention_days: u32) -> Result<u64> {
        let cutoff = (Utc::now() - chrono::Duration::days(retention_days as i64)).timestamp();
        let result = sqlx::query("DELETE FROM history WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to prune history: {e}"))))?;

        Ok(result.rows_affected())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> Store {
        Store::new("sqlite::memory:", false).await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_history_entry() {
        let store = test_store().await;
        let entry = store
            .insert_history(None, "sync_completed", "synced 3 new videos")
            .await
            .unwrap();

        let fetched = store.get_history_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(fetched.event_type, "sync_completed");
        assert_eq!(fetched.message, "synced 3 new videos");
        assert!(fetched.list_id.is_none());
    }

    #[tokio::test]
    async fn query_history_filters_by_list_and_orders_newest_first() {
        let store = test_store().await;
        store.insert_history(Some(ListId(1)), "a", "first").await.unwrap();
        store.insert_history(Some(ListId(2)), "b", "other list").await.unwrap();
        store.insert_history(Some(ListId(1)), "c", "second").await.unwrap();

        let entries = store.query_history(Some(ListId(1)), 10, 0).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[1].message, "first");
    }

    #[tokio::test]
    async fn prune_old_history_removes_only_entries_past_cutoff() {
        let store = test_store().await;
        store.insert_history(None, "recent", "kept").await.unwrap();

        let pruned = store.prune_old_history(30).await.unwrap();
        assert_eq!(pruned, 0);
        assert_eq!(store.query_history(None, 10, 0).await.unwrap().len(), 1);
    }
}
