use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::SqlitePool;

use crate::models::{FilterSettings, Setting, SettingKey, SettingUpdate, SortingOrder, SyncCursor};
use crate::{Error, Result};

pub struct SettingsService {
    pool: SqlitePool,
}

impl SettingsService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a setting value, checking environment variable first, then database
    pub async fn get(&self, key: SettingKey) -> Result<Option<String>> {
        if let Some(var) = key.env_var()
            && let Ok(value) = std::env::var(var)
            && !value.is_empty()
        {
            return Ok(Some(value));
        }

        let setting = sqlx::query_as::<_, Setting>("SELECT * FROM settings WHERE key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(setting.and_then(|s| {
            if s.value.is_empty() {
                None
            } else {
                Some(s.value)
            }
        }))
    }

    /// Get a setting, returning error if not configured
    pub async fn get_required(&self, key: SettingKey) -> Result<String> {
        self.get(key).await?.ok_or_else(|| {
            let hint = match key.env_var() {
                Some(var) => format!("environment variable {var} or the settings table"),
                None => "the settings table".to_string(),
            };
            Error::Configuration(format!("{} is not configured. Set it via {hint}.", key.as_str()))
        })
    }

    pub async fn list(&self) -> Result<Vec<Setting>> {
        let settings = sqlx::query_as::<_, Setting>("SELECT * FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        Ok(settings)
    }

    /// Update a setting in the database
    pub async fn update(&self, key: SettingKey, update: SettingUpdate) -> Result<Setting> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, description, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key.as_str())
        .bind(&update.value)
        .bind(key.description())
        .execute(&self.pool)
        .await?;

        let setting = sqlx::query_as::<_, Setting>("SELECT * FROM settings WHERE key = ?")
            .bind(key.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(setting)
    }

    pub async fn set(&self, key: SettingKey, value: impl Into<String>) -> Result<Setting> {
        self.update(
            key,
            SettingUpdate {
                value: value.into(),
            },
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, key: SettingKey) -> Result<Option<T>> {
        self.get(key)
            .await?
            .map(|value| serde_json::from_str(&value))
            .transpose()
            .map_err(Error::from)
    }

    async fn set_json<T: Serialize>(&self, key: SettingKey, value: &T) -> Result<()> {
        self.set(key, serde_json::to_string(value)?).await?;
        Ok(())
    }

    /// When the library was last synchronized, if ever.
    pub async fn sync_cursor(&self) -> Result<SyncCursor> {
        let Some(value) = self.get(SettingKey::LastSyncedAt).await? else {
            return Ok(SyncCursor::default());
        };

        let last_synced_at = DateTime::parse_from_rfc3339(&value)
            .map_err(|e| Error::Decode(format!("invalid sync cursor {value:?}: {e}")))?
            .with_timezone(&Utc);

        Ok(SyncCursor {
            last_synced_at: Some(last_synced_at),
        })
    }

    pub async fn set_sync_cursor(&self, at: DateTime<Utc>) -> Result<()> {
        self.set(SettingKey::LastSyncedAt, at.to_rfc3339()).await?;
        Ok(())
    }

    /// Last used library filter, or the reset filter.
    pub async fn filter_preference(&self) -> Result<FilterSettings> {
        Ok(self
            .get_json(SettingKey::FilterPreference)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_filter_preference(&self, settings: &FilterSettings) -> Result<()> {
        self.set_json(SettingKey::FilterPreference, settings).await
    }

    pub async fn sorting_preference(&self) -> Result<SortingOrder> {
        Ok(self
            .get_json(SettingKey::SortingPreference)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_sorting_preference(&self, sorting: SortingOrder) -> Result<()> {
        self.set_json(SettingKey::SortingPreference, &sorting).await
    }
}
