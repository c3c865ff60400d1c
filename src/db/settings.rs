//! Process-wide key/value settings store.
//!
//! The core reads/writes four reserved keys: [`SETTINGS_WORKER_PAUSED`],
//! [`SETTINGS_SYNC_PAUSED`], [`SETTINGS_DOWNLOAD_PAUSED`] (consulted by the
//! dispatcher before leasing) and [`SETTINGS_DATA_RETENTION_DAYS`] (consulted
//! by the `prune_retained` periodic job).

use crate::error::StoreError;
use crate::{Error, Result};

use super::Store;

/// Reserved settings key gating all task leasing
pub const SETTINGS_WORKER_PAUSED: &str = "worker_paused";
/// Reserved settings key gating sync task leasing
pub const SETTINGS_SYNC_PAUSED: &str = "sync_paused";
/// Reserved settings key gating download task leasing
pub const SETTINGS_DOWNLOAD_PAUSED: &str = "download_paused";
/// Reserved settings key controlling `prune_retained`'s retention window
pub const SETTINGS_DATA_RETENTION_DAYS: &str = "data_retention_days";

/// A settings key, either one of the reserved core keys or an arbitrary caller key
pub type SettingsKey = str;

impl Store {
    /// Read a raw setting value, if set
    pub async fn get_setting(&self, key: &SettingsKey) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to get setting {key}: {e}"))))?;

        Ok(value)
    }

    /// Write (or overwrite) a raw setting value
    pub async fn set_setting(&self, key: &SettingsKey, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to set setting {key}: {e}"))))?;

        Ok(())
    }

    /// Read a boolean setting, defaulting to `false` if unset or unparseable
    pub async fn get_bool_setting(&self, key: &SettingsKey) -> Result<bool> {
        Ok(self
            .get_setting(key)
            .await?
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false))
    }

    /// Write a boolean setting as `"true"`/`"false"`
    pub async fn set_bool_setting(&self, key: &SettingsKey, value: bool) -> Result<()> {
        self.set_setting(key, if value { "true" } else { "false" }).await
    }

    /// Read the `data_retention_days` setting, defaulting to 0 (retention disabled)
    pub async fn get_data_retention_days(&self) -> Result<u32> {
        Ok(self
            .get_setting(SETTINGS_DATA_RETENTION_DAYS)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
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
    async fn get_setting_returns_none_when_unset() {
        let store = test_store().await;
        assert!(store.get_setting(SETTINGS_WORKER_PAUSED).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_and_get_bool_setting_round_trips() {
        let store = test_store().await;
        store.set_bool_setting(SETTINGS_DOWNLOAD_PAUSED, true).await.unwrap();
        assert!(store.get_bool_setting(SETTINGS_DOWNLOAD_PAUSED).await.unwrap());

        store.set_bool_setting(SETTINGS_DOWNLOAD_PAUSED, false).await.unwrap();
        assert!(!store.get_bool_setting(SETTINGS_DOWNLOAD_PAUSED).await.unwrap());
    }

    #[tokio::test]
    async fn set_setting_overwrites_existing_value() {
        let store = test_store().await;
        store.set_setting("custom", "first").await.unwrap();
        store.set_setting("custom", "second").await.unwrap();
        assert_eq!(store.get_setting("custom").await.unwrap().unwrap(), "second");
    }

    #[tokio::test]
    async fn data_retention_days_defaults_to_zero() {
        let store = test_store().await;
        assert_eq!(store.get_data_retention_days().await.unwrap(), 0);

        store.set_setting(SETTINGS_DATA_RETENTION_DAYS, "30").await.unwrap();
        assert_eq!(store.get_data_retention_days().await.unwrap(), 30);
    }
}
