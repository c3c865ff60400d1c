//! DownloadSchedule CRUD operations.

use crate::error::StoreError;
use crate::types::{ScheduleId, Weekday};
use crate::{Error, Result};
use sqlx::FromRow;
use std::str::FromStr;

use super::{DownloadSchedule, Store};

#[derive(Debug, Clone, FromRow)]
struct ScheduleRow {
    id: i64,
    name: String,
    enabled: bool,
    days_of_week: String,
    start_time: String,
    end_time: String,
}

impl TryFrom<ScheduleRow> for DownloadSchedule {
    type Error = Error;

    fn try_from(row: ScheduleRow) -> Result<Self> {
        let days: Vec<String> = serde_json::from_str(&row.days_of_week).map_err(Error::Serialization)?;
        let days_of_week = days
            .iter()
            .map(|d| Weekday::from_str(d))
            .collect::<Result<Vec<_>>>()?;

        Ok(DownloadSchedule {
            id: ScheduleId(row.id),
            name: row.name,
            enabled: row.enabled,
            days_of_week,
            start_time: row.start_time,
            end_time: row.end_time,
        })
    }
}

const SCHEDULE_COLUMNS: &str = "id, name, enabled, days_of_week, start_time, end_time";

/// Fields accepted when creating or updating a [`DownloadSchedule`]
#[derive(Debug, Clone)]
pub struct ScheduleFields {
    /// Display name
    pub name: String,
    /// Whether this schedule currently participates in gating
    pub enabled: bool,
    /// Days this window applies; empty means every day
    pub days_of_week: Vec<Weekday>,
    /// Window start, `HH:MM`
    pub start_time: String,
    /// Window end, `HH:MM`; less than `start_time` wraps past midnight
    pub end_time: String,
}

impl Store {
    /// Create a new DownloadSchedule
    pub async fn create_schedule(&self, fields: ScheduleFields) -> Result<DownloadSchedule> {
        let days: Vec<&str> = fields.days_of_week.iter().map(Weekday::as_str).collect();
        let days_json = serde_json::to_string(&days).map_err(Error::Serialization)?;

        let result = sqlx::query(
            "INSERT INTO download_schedules (name, enabled, days_of_week, start_time, end_time) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&fields.name)
        .bind(fields.enabled)
        .bind(&days_json)
        .bind(&fields.start_time)
        .bind(&fields.end_time)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to insert schedule: {e}"))))?;

        let id = ScheduleId(result.last_insert_rowid());
        self.get_schedule(id)
            .await?
            .ok_or_else(|| Error::Store(StoreError::NotFound("schedule vanished after insert".into())))
    }

    /// Fetch a DownloadSchedule by ID
    pub async fn get_schedule(&self, id: ScheduleId) -> Result<Option<DownloadSchedule>> {
        let row = sqlx::query_as::<_, ScheduleRow>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM download_schedules WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to get schedule: {e}"))))?;

        row.map(DownloadSchedule::try_from).transpose()
    }

    /// List every DownloadSchedule
    pub async fn list_schedules(&self) -> Result<Vec<DownloadSchedule>> {
        let rows = sqlx::query_as::<_, ScheduleRow>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM download_schedules ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to list schedules: {e}"))))?;

        rows.into_iter().map(DownloadSchedule::try_from).collect()
    }

    /// List only the enabled DownloadSchedules, the set [`crate::schedule_gate::ScheduleGate`] evaluates
    pub async fn list_enabled_schedules(&self) -> Result<Vec<DownloadSchedule>> {
        let rows = sqlx::query_as::<_, ScheduleRow>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM download_schedules WHERE enabled = 1"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to list enabled schedules: {e}"))))?;

        rows.into_iter().map(DownloadSchedule::try_from).collect()
    }

    /// Update an existing DownloadSchedule's fields
    pub async fn update_schedule(&self, id: ScheduleId, fields: ScheduleFields) -> Result<DownloadSchedule> {
        let days: Vec<&str> = fields.days_of_week.iter().map(Weekday::as_str).collect();
        let days_json = serde_json::to_string(&days).map_err(Error::Serialization)?;

        let result = sqlx::query(
            "UPDATE download_schedules SET name = ?, enabled = ?, days_of_week = ?, \
             start_time = ?, end_time = ? WHERE id = ?",
        )
        .bind(&fields.name)
        .bind(fields.enabled)
        .bind(&days_json)
        .bind(&fields.start_time)
        .bind(&fields.end_time)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to update schedule: {e}"))))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("schedule {} not found", id.get())));
        }

        self.get_schedule(id)
            .await?
            .ok_or_else(|| Error::Store(StoreError::NotFound("schedule vanished after update".into())))
    }

    /// Delete a DownloadSchedule
    pub async fn delete_schedule(&self, id: ScheduleId) -> Result<()> {
        let result = sqlx::query("DELETE FROM download_schedules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::QueryFailed(format!("failed to delete schedule: {e}"))))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("schedule {} not found", id.get())));
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> Store {
        Store::new("sqlite::memory:", false).await.unwrap()
    }

    fn overnight_fields() -> ScheduleFields {
        ScheduleFields {
            name: "overnight".to_string(),
            enabled: true,
            days_of_week: vec![Weekday::Mon, Weekday::Tue],
            start_time: "22:00".to_string(),
            end_time: "06:00".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get_schedule_round_trips_days_of_week() {
        let store = test_store().await;
        let schedule = store.create_schedule(overnight_fields()).await.unwrap();

        let fetched = store.get_schedule(schedule.id).await.unwrap().unwrap();
        assert_eq!(fetched.days_of_week, vec![Weekday::Mon, Weekday::Tue]);
        assert_eq!(fetched.start_time, "22:00");
        assert_eq!(fetched.end_time, "06:00");
    }

    #[tokio::test]
    async fn list_enabled_schedules_excludes_disabled() {
        let store = test_store().await;
        store.create_schedule(overnight_fields()).await.unwrap();
        let mut disabled = overnight_fields();
        disabled.name = "daytime".to_string();
        disabled.enabled = false;
        store.create_schedule(disabled).await.unwrap();

        let enabled = store.list_enabled_schedules().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "overnight");
    }

    #[tokio::test]
    async fn delete_schedule_removes_row() {
        let store = test_store().await;
        let schedule = store.create_schedule(overnight_fields()).await.unwrap();
        store.delete_schedule(schedule.id).await.unwrap();
        assert!(store.get_schedule(schedule.id).await.unwrap().is_none());
    }
}
