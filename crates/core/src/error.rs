use thiserror::Error;
use uuid::Uuid;

use crate::models::MediaKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Item not found")]
    NotFound,

    #[error("{kind} with TMDB id {tmdb_id} already exists in the library")]
    AlreadyExists { kind: MediaKind, tmdb_id: i64 },

    #[error("Metadata kind does not match the entry kind")]
    KindMismatch,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("Refreshing entry {entry_id} (TMDB id {tmdb_id}) failed: {source}")]
    EntryRefresh {
        entry_id: Uuid,
        tmdb_id: i64,
        #[source]
        source: Box<Error>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("A library sync is already running")]
    SyncInProgress,
}

impl Error {
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound => 404,
            Error::AlreadyExists { .. } | Error::SyncInProgress => 409,
            Error::Validation(_) | Error::KindMismatch => 400,
            Error::ExternalApi(_) | Error::Decode(_) | Error::EntryRefresh { .. } => 502,
            _ => 500,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
