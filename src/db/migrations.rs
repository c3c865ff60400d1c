//! Database lifecycle and schema migrations.

use crate::error::StoreError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::str::FromStr;

use super::Store;

impl Store {
    /// Open (creating if missing) the database at `database_url` and run migrations.
    ///
    /// `network_share` selects `DELETE` journaling instead of `WAL`, required when the
    /// database file lives on a network filesystem that cannot support WAL's shared
    /// memory file.
    pub async fn new(database_url: &str, network_share: bool) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| Error::Store(StoreError::ConnectionFailed(format!(
                "failed to parse database url: {e}"
            ))))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(if network_share {
                SqliteJournalMode::Delete
            } else {
                SqliteJournalMode::Wal
            });

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| Error::Store(StoreError::ConnectionFailed(format!(
                "failed to connect to database: {e}"
            ))))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Build a `Store` around an already-open pool, running migrations. Used by tests
    /// that want an in-memory database (`sqlite::memory:`).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Store(StoreError::ConnectionFailed(format!("failed to acquire connection: {e}")))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Store(StoreError::MigrationFailed(format!(
            "failed to create schema_version table: {e}"
        ))))?;

        let current_version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!(
                "failed to query schema version: {e}"
            ))))?;

        let current_version = current_version.unwrap_or(0);

        if current_version < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: create the full initial schema.
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("applying database migration v1");

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to begin transaction: {e}"))))?;

        let result = async {
            Self::create_profiles_schema(conn).await?;
            Self::create_lists_schema(conn).await?;
            Self::create_videos_schema(conn).await?;
            Self::create_tasks_schema(conn).await?;
            Self::create_task_logs_schema(conn).await?;
            Self::create_schedules_schema(conn).await?;
            Self::create_settings_schema(conn).await?;
            Self::create_history_schema(conn).await?;
            Self::record_migration(conn, 1).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to commit migration v1: {e}"))))?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!("database migration v1 complete");
        Ok(())
    }

    async fn create_profiles_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                output_format TEXT NOT NULL DEFAULT 'mp4',
                resolution INTEGER NOT NULL DEFAULT 0,
                preferred_codecs TEXT NOT NULL DEFAULT '[]',
                include_shorts INTEGER NOT NULL DEFAULT 1,
                embed_metadata INTEGER NOT NULL DEFAULT 1,
                embed_thumbnail INTEGER NOT NULL DEFAULT 1,
                download_subtitles INTEGER NOT NULL DEFAULT 0,
                embed_subtitles INTEGER NOT NULL DEFAULT 0,
                auto_generated_subtitles INTEGER NOT NULL DEFAULT 0,
                subtitle_languages TEXT NOT NULL DEFAULT '[]',
                audio_track_language TEXT,
                output_template TEXT NOT NULL DEFAULT '%(title)s.%(ext)s',
                sponsorblock_behavior TEXT NOT NULL DEFAULT 'disabled',
                sponsorblock_categories TEXT NOT NULL DEFAULT '[]',
                extra_args TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create profiles table: {e}"))))?;

        Ok(())
    }

    async fn create_lists_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE lists (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                profile_id INTEGER NOT NULL REFERENCES profiles(id),
                name TEXT NOT NULL,
                list_type TEXT NOT NULL,
                from_date TEXT,
                sync_frequency TEXT NOT NULL DEFAULT 'daily',
                enabled INTEGER NOT NULL DEFAULT 1,
                auto_download INTEGER NOT NULL DEFAULT 1,
                title_blacklist TEXT,
                min_duration INTEGER,
                max_duration INTEGER,
                description TEXT,
                thumbnail TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                last_synced INTEGER,
                deleting INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create lists table: {e}"))))?;

        sqlx::query("CREATE INDEX idx_lists_profile ON lists(profile_id)")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create index: {e}"))))?;

        sqlx::query("CREATE INDEX idx_lists_enabled ON lists(enabled)")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create index: {e}"))))?;

        Ok(())
    }

    async fn create_videos_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE videos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                list_id INTEGER NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                external_video_id TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                duration INTEGER,
                upload_date TEXT,
                thumbnail TEXT,
                description TEXT,
                extractor TEXT NOT NULL,
                media_type TEXT NOT NULL DEFAULT 'video',
                labels TEXT NOT NULL DEFAULT '{}',
                downloaded INTEGER NOT NULL DEFAULT 0,
                download_path TEXT,
                error_message TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                blacklisted INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(list_id, external_video_id)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create videos table: {e}"))))?;

        sqlx::query("CREATE INDEX idx_videos_list ON videos(list_id)")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create index: {e}"))))?;

        sqlx::query("CREATE INDEX idx_videos_downloaded ON videos(list_id, downloaded, blacklisted)")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create index: {e}"))))?;

        sqlx::query("CREATE INDEX idx_videos_updated ON videos(list_id, updated_at)")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create index: {e}"))))?;

        Ok(())
    }

    async fn create_tasks_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                result TEXT,
                error TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL DEFAULT 3,
                created_at INTEGER NOT NULL,
                started_at INTEGER,
                completed_at INTEGER
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create tasks table: {e}"))))?;

        sqlx::query("CREATE INDEX idx_tasks_lease ON tasks(task_type, status, created_at)")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create index: {e}"))))?;

        // Enforces the dedup guard at the database level: only one active row per
        // (task_type, entity_id) where active is encoded via the partial-unique trick
        // of including status in a filtered index.
        sqlx::query(
            "CREATE UNIQUE INDEX idx_tasks_active_dedup ON tasks(task_type, entity_id) \
             WHERE status IN ('pending', 'running', 'paused')",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create index: {e}"))))?;

        sqlx::query("CREATE INDEX idx_tasks_status ON tasks(status)")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create index: {e}"))))?;

        Ok(())
    }

    async fn create_task_logs_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE task_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                attempt INTEGER NOT NULL,
                level TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create task_logs table: {e}"))))?;

        sqlx::query("CREATE INDEX idx_task_logs_task ON task_logs(task_id, created_at)")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create index: {e}"))))?;

        Ok(())
    }

    async fn create_schedules_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE download_schedules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                days_of_week TEXT NOT NULL DEFAULT '[]',
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create download_schedules table: {e}"))))?;

        Ok(())
    }

    async fn create_settings_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create settings table: {e}"))))?;

        Ok(())
    }

    async fn create_history_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                list_id INTEGER REFERENCES lists(id) ON DELETE CASCADE,
                event_type TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create history table: {e}"))))?;

        sqlx::query("CREATE INDEX idx_history_list ON history(list_id, created_at DESC)")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create index: {e}"))))?;

        sqlx::query("CREATE INDEX idx_history_created ON history(created_at DESC)")
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to create index: {e}"))))?;

        Ok(())
    }

    async fn record_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(format!("failed to record migration: {e}"))))?;

        Ok(())
    }
}
