use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{
    CommonMetadata, Details, ExternalId, Genre, MediaKind, MediaStatus, Metadata, MovieDetails,
    MovieWatchState, ShowDetails, ShowType, ShowWatchState, StarRating, WatchState,
};
use crate::error::{Error, Result};

/// Kind-specific part of an entry: remote details plus the user's watch marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Media {
    Movie {
        details: MovieDetails,
        watched: Option<MovieWatchState>,
    },
    Show {
        details: ShowDetails,
        watched: Option<ShowWatchState>,
    },
}

impl Media {
    pub fn kind(&self) -> MediaKind {
        match self {
            Media::Movie { .. } => MediaKind::Movie,
            Media::Show { .. } => MediaKind::Show,
        }
    }
}

/// Fields only the user edits. A metadata refresh never touches them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersonalData {
    pub rating: StarRating,
    pub watch_again: Option<bool>,
    pub tags: BTreeSet<String>,
    pub notes: String,
    pub is_favorite: bool,
    pub is_on_watchlist: bool,
}

/// One cataloged movie or show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub tmdb_id: i64,
    pub common: CommonMetadata,
    pub media: Media,
    pub personal: PersonalData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogEntry {
    /// Builds a fresh entry for a title the user is adding.
    pub fn new(metadata: Metadata) -> Self {
        let now = Utc::now();
        let media = match metadata.details {
            Details::Movie(details) => Media::Movie {
                details,
                watched: None,
            },
            Details::Show(details) => Media::Show {
                details,
                watched: None,
            },
        };

        Self {
            id: Uuid::new_v4(),
            tmdb_id: metadata.tmdb_id,
            common: metadata.common,
            media,
            personal: PersonalData::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.media.kind()
    }

    pub fn external_id(&self) -> ExternalId {
        ExternalId {
            kind: self.kind(),
            tmdb_id: self.tmdb_id,
        }
    }

    pub fn title(&self) -> &str {
        &self.common.title
    }

    pub fn genres(&self) -> &[Genre] {
        &self.common.genres
    }

    pub fn status(&self) -> Option<MediaStatus> {
        self.common.status
    }

    /// Release date for movies, first air date for shows.
    pub fn release_date(&self) -> Option<NaiveDate> {
        match &self.media {
            Media::Movie { details, .. } => details.release_date,
            Media::Show { details, .. } => details.first_air_date,
        }
    }

    pub fn year(&self) -> Option<i32> {
        self.release_date().map(|d| d.year())
    }

    pub fn show_details(&self) -> Option<&ShowDetails> {
        match &self.media {
            Media::Show { details, .. } => Some(details),
            Media::Movie { .. } => None,
        }
    }

    pub fn show_type(&self) -> Option<ShowType> {
        self.show_details().and_then(|d| d.show_type)
    }

    pub fn season_count(&self) -> Option<u32> {
        self.show_details().and_then(|d| d.season_count())
    }

    pub fn watch_state(&self) -> Option<WatchState> {
        match &self.media {
            Media::Movie { watched, .. } => watched.map(WatchState::Movie),
            Media::Show { watched, .. } => watched.map(WatchState::Show),
        }
    }

    /// Sets or clears the watch marker. The marker must belong to the entry's kind.
    pub fn set_watch_state(&mut self, state: Option<WatchState>) -> Result<()> {
        match (&mut self.media, state) {
            (Media::Movie { watched, .. }, Some(WatchState::Movie(s))) => *watched = Some(s),
            (Media::Show { watched, .. }, Some(WatchState::Show(s))) => *watched = Some(s),
            (Media::Movie { watched, .. }, None) => *watched = None,
            (Media::Show { watched, .. }, None) => *watched = None,
            _ => return Err(Error::KindMismatch),
        }
        Ok(())
    }

    pub fn details(&self) -> Details {
        match &self.media {
            Media::Movie { details, .. } => Details::Movie(details.clone()),
            Media::Show { details, .. } => Details::Show(details.clone()),
        }
    }

    /// Remote-owned part of the entry, as it is persisted.
    pub fn metadata(&self) -> Metadata {
        Metadata {
            tmdb_id: self.tmdb_id,
            common: self.common.clone(),
            details: self.details(),
        }
    }

    /// Replaces every remote-owned field, keeping personal data and the watch marker.
    pub fn apply_metadata(&mut self, metadata: Metadata) -> Result<()> {
        if metadata.kind() != self.kind() || metadata.tmdb_id != self.tmdb_id {
            return Err(Error::KindMismatch);
        }

        self.common = metadata.common;
        match (&mut self.media, metadata.details) {
            (Media::Movie { details, .. }, Details::Movie(fresh)) => *details = fresh,
            (Media::Show { details, .. }, Details::Show(fresh)) => *details = fresh,
            _ => return Err(Error::KindMismatch),
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Database row for the `entries` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntryRow {
    pub id: String,
    pub kind: String,
    pub tmdb_id: i64,
    pub metadata: String,
    pub personal_rating: i64,
    pub watch_state: Option<String>,
    pub watch_again: Option<bool>,
    pub tags: String,
    pub notes: String,
    pub is_favorite: bool,
    pub is_on_watchlist: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for CatalogEntry {
    type Error = Error;

    fn try_from(row: EntryRow) -> Result<Self> {
        let metadata: Metadata = serde_json::from_str(&row.metadata)?;
        if MediaKind::parse(&row.kind) != Some(metadata.kind()) {
            return Err(Error::KindMismatch);
        }

        let rating = u8::try_from(row.personal_rating)
            .ok()
            .and_then(StarRating::from_value)
            .unwrap_or_default();
        let watch_state = row
            .watch_state
            .as_deref()
            .map(serde_json::from_str::<WatchState>)
            .transpose()?;

        let mut entry = CatalogEntry {
            id: Uuid::parse_str(&row.id).map_err(|e| Error::Decode(e.to_string()))?,
            tmdb_id: row.tmdb_id,
            personal: PersonalData {
                rating,
                watch_again: row.watch_again,
                tags: serde_json::from_str(&row.tags)?,
                notes: row.notes,
                is_favorite: row.is_favorite,
                is_on_watchlist: row.is_on_watchlist,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
            ..CatalogEntry::new(metadata)
        };
        entry.set_watch_state(watch_state)?;
        Ok(entry)
    }
}

/// Partial edit of user-provided fields; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonalUpdate {
    pub rating: Option<StarRating>,
    /// `Some(None)` clears the answer.
    pub watch_again: Option<Option<bool>>,
    pub tags: Option<BTreeSet<String>>,
    pub notes: Option<String>,
    pub is_favorite: Option<bool>,
    pub is_on_watchlist: Option<bool>,
}

impl PersonalUpdate {
    pub fn apply_to(self, personal: &mut PersonalData) {
        if let Some(rating) = self.rating {
            personal.rating = rating;
        }
        if let Some(watch_again) = self.watch_again {
            personal.watch_again = watch_again;
        }
        if let Some(tags) = self.tags {
            personal.tags = tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(notes) = self.notes {
            personal.notes = notes;
        }
        if let Some(is_favorite) = self.is_favorite {
            personal.is_favorite = is_favorite;
        }
        if let Some(is_on_watchlist) = self.is_on_watchlist {
            personal.is_on_watchlist = is_on_watchlist;
        }
    }
}
