use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{Genre, MediaKind, MediaStatus, ShowType};

/// Identifies a title on the remote metadata service.
///
/// TMDB movie and TV ids live in separate namespaces, so the kind is part of the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalId {
    pub kind: MediaKind,
    pub tmdb_id: i64,
}

impl ExternalId {
    pub fn movie(tmdb_id: i64) -> Self {
        Self {
            kind: MediaKind::Movie,
            tmdb_id,
        }
    }

    pub fn show(tmdb_id: i64) -> Self {
        Self {
            kind: MediaKind::Show,
            tmdb_id,
        }
    }
}

/// Metadata shared by movies and shows. Replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommonMetadata {
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub status: Option<MediaStatus>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub production_countries: Vec<String>,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub poster_path: Option<String>,
    pub imdb_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MovieDetails {
    pub release_date: Option<NaiveDate>,
    pub runtime: Option<i32>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    #[serde(default)]
    pub is_adult: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub season_number: u32,
    pub episode_count: u32,
    pub name: Option<String>,
    pub air_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub season_number: u32,
    pub episode_number: u32,
    pub name: Option<String>,
    pub air_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShowDetails {
    pub first_air_date: Option<NaiveDate>,
    #[serde(default)]
    pub seasons: Vec<Season>,
    pub number_of_seasons: Option<u32>,
    pub number_of_episodes: Option<u32>,
    pub last_episode_to_air: Option<Episode>,
    pub next_episode_to_air: Option<Episode>,
    pub show_type: Option<ShowType>,
    #[serde(default)]
    pub networks: Vec<String>,
}

impl ShowDetails {
    /// Number of regular seasons. Falls back to counting the season list (specials excluded).
    pub fn season_count(&self) -> Option<u32> {
        self.number_of_seasons.or_else(|| {
            let regular = self.seasons.iter().filter(|s| s.season_number > 0).count();
            (regular > 0).then_some(regular as u32)
        })
    }

    /// Highest season number that has at least one episode.
    pub fn latest_aired_season(&self) -> Option<u32> {
        self.seasons
            .iter()
            .filter(|s| s.episode_count > 0)
            .map(|s| s.season_number)
            .max()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Details {
    Movie(MovieDetails),
    Show(ShowDetails),
}

impl Details {
    pub fn kind(&self) -> MediaKind {
        match self {
            Details::Movie(_) => MediaKind::Movie,
            Details::Show(_) => MediaKind::Show,
        }
    }

    pub fn release_date(&self) -> Option<NaiveDate> {
        match self {
            Details::Movie(movie) => movie.release_date,
            Details::Show(show) => show.first_air_date,
        }
    }

    pub fn year(&self) -> Option<i32> {
        self.release_date().map(|d| d.year())
    }
}

/// Everything the remote service knows about a title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub tmdb_id: i64,
    pub common: CommonMetadata,
    pub details: Details,
}

impl Metadata {
    pub fn kind(&self) -> MediaKind {
        self.details.kind()
    }

    pub fn external_id(&self) -> ExternalId {
        ExternalId {
            kind: self.kind(),
            tmdb_id: self.tmdb_id,
        }
    }
}
