use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    TmdbApiKey,
    LastSyncedAt,
    FilterPreference,
    SortingPreference,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::TmdbApiKey => "tmdb_api_key",
            SettingKey::LastSyncedAt => "last_synced_at",
            SettingKey::FilterPreference => "filter_preference",
            SettingKey::SortingPreference => "sorting_preference",
        }
    }

    /// Environment override, for keys that have one.
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            SettingKey::TmdbApiKey => Some("TMDB_API_KEY"),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SettingKey::TmdbApiKey => "API key for The Movie Database (themoviedb.org)",
            SettingKey::LastSyncedAt => "Time of the last completed incremental library sync",
            SettingKey::FilterPreference => "Last used library filter",
            SettingKey::SortingPreference => "Last used library sorting",
        }
    }
}

/// When the library was last synchronized with the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncCursor {
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingUpdate {
    pub value: String,
}
