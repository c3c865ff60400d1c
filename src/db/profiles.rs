//! Profile CRUD operations.

use crate::error::StoreError;
use crate::types::{ProfileId, SponsorBlockBehavior};
use crate::{Error, Result};
use chrono::{TimeZone, Utc};
use sqlx::FromRow;
use std::str::FromStr;

use super::{Profile, ProfileFields, Store};

#[derive(Debug, Clone, FromRow)]
struct ProfileRow {
    id: i64,
    name: String,
    output_format: String,
    resolution: i32,
    preferred_codecs: String,
    include_shorts: bool,
    embed_metadata: bool,
    embed_thumbnail: bool,
    download_subtitles: bool,
    embed_subtitles: bool,
    auto_generated_subtitles: bool,
    subtitle_languages: String,
    audio_track_language: Option<String>,
    output_template: String,
    sponsorblock_behavior: String,
    sponsorblock_categories: String,
    extra_args: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = Error;

    fn try_from(row: ProfileRow) -> Result<Self> {
        Ok(Profile {
            id: ProfileId(row.id),
            name: row.name,
            output_format: row.output_format,
            resolution: row.resolution,
            preferred_codecs: parse_json_vec(&row.preferred_codecs)?,
            include_shorts: row.include_shorts,
            embed_metadata: row.embed_metadata,
            embed_thumbnail: row.embed_thumbnail,
            download_subtitles: row.download_subtitles,
            embed_subtitles: row.embed_subtitles,
            auto_generated_subtitles: row.auto_generated_subtitles,
            subtitle_languages: parse_json_vec(&row.subtitle_languages)?,
            audio_track_language: row.audio_track_language,
            output_template: row.output_template,
            sponsorblock_behavior: SponsorBlockBehavior::from_str(&row.sponsorblock_behavior)?,
            sponsorblock_categories: parse_json_vec(&row.sponsorblock_categories)?,
            extra_args: serde_json::from_str(&row.extra_args).unwrap_or(serde_json::Value::Null),
            created_at: timestamp(row.created_at),
            updated_at: timestamp(row.updated_at),
        })
    }
}

fn parse_json_vec(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).map_err(Error::Serialization)
}

fn timestamp(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

const PROFILE_COLUMNS: &str = "id, name, output_format, resolution, preferred_codecs, \
    include_shorts, embed_metadata, embed_thumbnail, download_subtitles, embed_subtitles, \
    auto_generated_subtitles, subtitle_languages, audio_track_language, output_template, \
    sponsorblock_behavior, sponsorblock_categories, extra_args, created_at, updated_at";

impl Store {
    /// Create a new Profile
    pub async fn create_profile(&self, fields: ProfileFields) -> Result<Profile> {
        let now = chrono::Utc::now().timestamp();
        let preferred_codecs = serde_json::to_string(&fields.preferred_codecs).map_err(Error::Serialization)?;
        let subtitle_languages = serde_json::to_string(&fields.subtitle_languages).map_err(Error::Serialization)?;
        let sponsorblock_categories = serde_json::to_string(&fields.sponsorblock_categories).map_err(Error::Serialization)?;
        let extra_args = serde_json::to_string(&fields.extra_args).map_err(Error::Serialization)?;

        let result = sqlx::query(
            r#"
            INSERT INTO profiles (
                name, output_format, resolution, preferred_codecs, include_shorts,
                embed_metadata, embed_thumbnail, download_subtitles, embed_subtitles,
                auto_generated_subtitles, subtitle_languages, audio_track_language,
                output_template, sponsorblock_behavior, sponsorblock_categories,
                extra_args, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.output_format)
        .bind(fields.resolution)
        .bind(&preferred_codecs)
        .bind(fields.include_shorts)
        .bind(fields.embed_metadata)
        .bind(fields.embed_thumbnail)
        .bind(fields.download_subtitles)
        .bind(fields.embed_subtitles)
        .bind(fields.auto_generated_subtitles)
        .bind(&subtitle_languages)
        .bind(&fields.audio_track_language)
        .bind(&fields.output_template)
        .bind(fields.sponsorblock_behavior.as_str())
        .bind(&sponsorblock_categories)
        .bind(&extra_args)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("a profile named '{}' already exists", fields.name))
            } else {
                Error::Store(StoreError::QueryFailed(format!("failed to insert profile: {e}")))
            }
        })?;

        let id = ProfileId(result.last_insert_rowid());
        self.get_profile(id)
            .await?
            .ok_or_else(|| Error::Store(StoreError::NotFound("profile vanished after insert".into())))
    }

    /// Fetch a Profile by ID
    pub async fn get_profile(&self, id: ProfileId) -> Result<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to get profile: {e}"))))?;

        row.map(Profile::try_from).transpose()
    }

    /// List all Profiles
    pub async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to list profiles: {e}"))))?;

        rows.into_iter().map(Profile::try_from).collect()
    }

    /// Update an existing Profile's fields
    pub async fn update_profile(&self, id: ProfileId, fields: ProfileFields) -> Result<Profile> {
        let now = chrono::Utc::now().timestamp();
        let preferred_codecs = serde_json::to_string(&fields.preferred_codecs).map_err(Error::Serialization)?;
        let subtitle_languages = serde_json::to_string(&fields.subtitle_languages).map_err(Error::Serialization)?;
        let sponsorblock_categories = serde_json::to_string(&fields.sponsorblock_categories).map_err(Error::Serialization)?;
        let extra_args = serde_json::to_string(&fields.extra_args).map_err(Error::Serialization)?;

        let result = sqlx::query(
            r#"
            UPDATE profiles SET
                name = ?, output_format = ?, resolution = ?, preferred_codecs = ?,
                include_shorts = ?, embed_metadata = ?, embed_thumbnail = ?,
                download_subtitles = ?, embed_subtitles = ?, auto_generated_subtitles = ?,
                subtitle_languages = ?, audio_track_language = ?, output_template = ?,
                sponsorblock_behavior = ?, sponsorblock_categories = ?, extra_args = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.output_format)
        .bind(fields.resolution)
        .bind(&preferred_codecs)
        .bind(fields.include_shorts)
        .bind(fields.embed_metadata)
        .bind(fields.embed_thumbnail)
        .bind(fields.download_subtitles)
        .bind(fields.embed_subtitles)
        .bind(fields.auto_generated_subtitles)
        .bind(&subtitle_languages)
        .bind(&fields.audio_track_language)
        .bind(&fields.output_template)
        .bind(fields.sponsorblock_behavior.as_str())
        .bind(&sponsorblock_categories)
        .bind(&extra_args)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("a profile named '{}' already exists", fields.name))
            } else {
                Error::Store(StoreError::QueryFailed(format!("failed to update profile: {e}")))
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("profile {} not found", id.get())));
        }

        self.get_profile(id)
            .await?
            .ok_or_else(|| Error::Store(StoreError::NotFound("profile vanished after update".into())))
    }

    /// Delete a Profile. Fails if any List still references it.
    pub async fn delete_profile(&self, id: ProfileId) -> Result<()> {
        let in_use: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lists WHERE profile_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to check profile usage: {e}"))))?;

        if in_use > 0 {
            return Err(Error::Conflict(format!(
                "profile {} is referenced by {in_use} list(s)",
                id.get()
            )));
        }

        let result = sqlx::query("DELETE FROM profiles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to delete profile: {e}"))))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("profile {} not found", id.get())));
        }

        Ok(())
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    fn sample_fields(name: &str) -> ProfileFields {
        ProfileFields {
            name: name.to_string(),
            output_format: "mp4".to_string(),
            resolution: 1080,
            preferred_codecs: vec!["h264".to_string()],
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
        }
    }

    async fn test_store() -> Store {
        Store::new("sqlite::memory:", false).await.unwrap()
    }

    #[tokio::test]
    async fn create_and_get_profile_round_trips() {
        let store = test_store().await;
        let profile = store.create_profile(sample_fields("default")).await.unwrap();
        let fetched = store.get_profile(profile.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "default");
        assert_eq!(fetched.resolution, 1080);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let store = test_store().await;
        store.create_profile(sample_fields("dup")).await.unwrap();
        let second = store.create_profile(sample_fields("dup")).await;
        assert!(matches!(second, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn delete_profile_in_use_is_rejected() {
        let store = test_store().await;
        let profile = store.create_profile(sample_fields("in-use")).await.unwrap();
        store
            .create_list(super::super::ListFields {
                url: "https://example.com/channel".to_string(),
                profile_id: profile.id,
                name: "a list".to_string(),
                list_type: crate::types::ListType::Channel,
                from_date: None,
                sync_frequency: crate::types::SyncFrequency::Daily,
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

        let result = store.delete_profile(profile.id).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn delete_missing_profile_is_not_found() {
        let store = test_store().await;
        let result = store.delete_profile(ProfileId(999)).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
