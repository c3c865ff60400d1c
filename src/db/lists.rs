//! List CRUD operations.

use crate::error::StoreError;
use crate::types::{ListId, ListType, ProfileId, SyncFrequency};
use crate::{Error, Result};
use chrono::{TimeZone, Utc};
use sqlx::FromRow;
use std::str::FromStr;

use super::{List, ListFields, Store};

#[derive(Debug, Clone, FromRow)]
struct ListRow {
    id: i64,
    url: String,
    profile_id: i64,
    name: String,
    list_type: String,
    from_date: Option<String>,
    sync_frequency: String,
    enabled: bool,
    auto_download: bool,
    title_blacklist: Option<String>,
    min_duration: Option<i64>,
    max_duration: Option<i64>,
    description: Option<String>,
    thumbnail: Option<String>,
    tags: String,
    last_synced: Option<i64>,
    deleting: bool,
    created_at: i64,
}

impl TryFrom<ListRow> for List {
    type Error = Error;

    fn try_from(row: ListRow) -> Result<Self> {
        Ok(List {
            id: ListId(row.id),
            url: row.url,
            profile_id: ProfileId(row.profile_id),
            name: row.name,
            list_type: ListType::from_str(&row.list_type)?,
            from_date: row.from_date,
            sync_frequency: SyncFrequency::from_str(&row.sync_frequency)?,
            enabled: row.enabled,
            auto_download: row.auto_download,
            title_blacklist: row.title_blacklist,
            min_duration: row.min_duration,
            max_duration: row.max_duration,
            description: row.description,
            thumbnail: row.thumbnail,
            tags: serde_json::from_str(&row.tags).map_err(Error::Serialization)?,
            last_synced: row.last_synced.map(timestamp),
            deleting: row.deleting,
            created_at: timestamp(row.created_at),
        })
    }
}

fn timestamp(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

const LIST_COLUMNS: &str = "id, url, profile_id, name, list_type, from_date, sync_frequency, \
    enabled, auto_download, title_blacklist, min_duration, max_duration, description, \
    thumbnail, tags, last_synced, deleting, created_at";

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

impl Store {
    /// Create a new List
    pub async fn create_list(&self, fields: ListFields) -> Result<List> {
        let now = chrono::Utc::now().timestamp();
        let tags = serde_json::to_string(&fields.tags).map_err(Error::Serialization)?;

        let result = sqlx::query(
            r#"
            INSERT INTO lists (
                url, profile_id, name, list_type, from_date, sync_frequency, enabled,
                auto_download, title_blacklist, min_duration, max_duration, description,
                thumbnail, tags, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&fields.url)
        .bind(fields.profile_id)
        .bind(&fields.name)
        .bind(fields.list_type.to_string())
        .bind(&fields.from_date)
        .bind(fields.sync_frequency.as_str())
        .bind(fields.enabled)
        .bind(fields.auto_download)
        .bind(&fields.title_blacklist)
        .bind(fields.min_duration)
        .bind(fields.max_duration)
        .bind(&fields.description)
        .bind(&fields.thumbnail)
        .bind(&tags)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("a list with url '{}' already exists", fields.url))
            } else {
                Error::Store(StoreError::QueryFailed(format!("failed to insert list: {e}")))
            }
        })?;

        let id = ListId(result.last_insert_rowid());
        self.get_list(id)
            .await?
            .ok_or_else(|| Error::Store(StoreError::NotFound("list vanished after insert".into())))
    }

    /// Fetch a List by ID
    pub async fn get_list(&self, id: ListId) -> Result<Option<List>> {
        let row = sqlx::query_as::<_, ListRow>(&format!("SELECT {LIST_COLUMNS} FROM lists WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to get list: {e}"))))?;

        row.map(List::try_from).transpose()
    }

    /// List all Lists, optionally filtered to only enabled ones
    pub async fn list_lists(&self, enabled_only: bool) -> Result<Vec<List>> {
        let sql = if enabled_only {
            format!("SELECT {LIST_COLUMNS} FROM lists WHERE enabled = 1 ORDER BY name ASC")
        } else {
            format!("SELECT {LIST_COLUMNS} FROM lists ORDER BY name ASC")
        };

        let rows = sqlx::query_as::<_, ListRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to list lists: {e}"))))?;

        rows.into_iter().map(List::try_from).collect()
    }

    /// Lists whose last-sync age exceeds their configured cadence, or that have
    /// never synced at all; used by the periodic `sync_due_lists` job.
    pub async fn list_due_for_sync(&self) -> Result<Vec<List>> {
        let all = self.list_lists(true).await?;
        let now = Utc::now();
        Ok(all
            .into_iter()
            .filter(|list| !list.deleting)
            .filter(|list| match list.last_synced {
                None => true,
                Some(last) => {
                    let age_hours = (now - last).num_seconds() as f64 / 3600.0;
                    age_hours >= list.sync_frequency.hours() as f64
                }
            })
            .collect())
    }

    /// Update an existing List's fields
    pub async fn update_list(&self, id: ListId, fields: ListFields) -> Result<List> {
        let tags = serde_json::to_string(&fields.tags).map_err(Error::Serialization)?;

        let result = sqlx::query(
            r#"
            UPDATE lists SET
                url = ?, profile_id = ?, name = ?, list_type = ?, from_date = ?,
                sync_frequency = ?, enabled = ?, auto_download = ?, title_blacklist = ?,
                min_duration = ?, max_duration = ?, description = ?, thumbnail = ?, tags = ?
            WHERE id = ?
            "#,
        )
        .bind(&fields.url)
        .bind(fields.profile_id)
        .bind(&fields.name)
        .bind(fields.list_type.to_string())
        .bind(&fields.from_date)
        .bind(fields.sync_frequency.as_str())
        .bind(fields.enabled)
        .bind(fields.auto_download)
        .bind(&fields.title_blacklist)
        .bind(fields.min_duration)
        .bind(fields.max_duration)
        .bind(&fields.description)
        .bind(&fields.thumbnail)
        .bind(&tags)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("a list with url '{}' already exists", fields.url))
            } else {
                Error::Store(StoreError::QueryFailed(format!("failed to update list: {e}")))
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("list {} not found", id.get())));
        }

        self.get_list(id)
            .await?
            .ok_or_else(|| Error::Store(StoreError::NotFound("list vanished after update".into())))
    }

    /// Mark a list as `deleting` to block re-enqueue while cascading removal proceeds
    pub async fn mark_list_deleting(&self, id: ListId) -> Result<()> {
        let result = sqlx::query("UPDATE lists SET deleting = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to mark list deleting: {e}"))))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("list {} not found", id.get())));
        }
        Ok(())
    }

    /// Update `last_synced` to the current time
    pub async fn touch_list_synced(&self, id: ListId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE lists SET last_synced = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to touch list: {e}"))))?;
        Ok(())
    }

    /// Delete a List and cascade its Videos/History rows
    pub async fn delete_list(&self, id: ListId) -> Result<()> {
        let result = sqlx::query("DELETE FROM lists WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to delete list: {e}"))))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("list {} not found", id.get())));
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ProfileFields;
    use crate::types::SponsorBlockBehavior;

    async fn store_with_profile() -> (Store, ProfileId) {
        let store = Store::new("sqlite::memory:", false).await.unwrap();
        let profile = store
            .create_profile(ProfileFields {
                name: "default".to_string(),
                output_format: "mp4".to_string(),
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
                output_template: "%(title)s.%(ext)s".to_string(),
                sponsorblock_behavior: SponsorBlockBehavior::Disabled,
                sponsorblock_categories: vec![],
                extra_args: serde_json::json!({}),
            })
            .await
            .unwrap();
        (store, profile.id)
    }

    fn sample_fields(url: &str, profile_id: ProfileId) -> ListFields {
        ListFields {
            url: url.to_string(),
            profile_id,
            name: "a channel".to_string(),
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
            tags: vec!["music".to_string()],
        }
    }

    #[tokio::test]
    async fn create_and_get_list_round_trips() {
        let (store, profile_id) = store_with_profile().await;
        let list = store
            .create_list(sample_fields("https://example.com/c/x", profile_id))
            .await
            .unwrap();
        let fetched = store.get_list(list.id).await.unwrap().unwrap();
        assert_eq!(fetched.url, "https://example.com/c/x");
        assert_eq!(fetched.tags, vec!["music".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_url_is_rejected() {
        let (store, profile_id) = store_with_profile().await;
        store
            .create_list(sample_fields("https://example.com/c/dup", profile_id))
            .await
            .unwrap();
        let second = store
            .create_list(sample_fields("https://example.com/c/dup", profile_id))
            .await;
        assert!(matches!(second, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn never_synced_list_is_due() {
        let (store, profile_id) = store_with_profile().await;
        store
            .create_list(sample_fields("https://example.com/c/new", profile_id))
            .await
            .unwrap();
        let due = store.list_due_for_sync().await.unwrap();
        assert_eq!(due.len(), 1);
    }

    #[tokio::test]
    async fn recently_synced_list_is_not_due() {
        let (store, profile_id) = store_with_profile().await;
        let list = store
            .create_list(sample_fields("https://example.com/c/fresh", profile_id))
            .await
            .unwrap();
        store.touch_list_synced(list.id).await.unwrap();
        let due = store.list_due_for_sync().await.unwrap();
        assert!(due.is_empty());
    }
}
