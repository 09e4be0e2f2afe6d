use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use super::{Genre, MediaKind, MediaStatus, ShowType, StarRating};

/// Which movie markers count as "watched" when the watched constraint is `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieWatchedMode {
    /// Watched or partially watched.
    #[default]
    WatchedAtAll,
    /// Fully watched only.
    FullyWatched,
}

/// Constraints a user places on the library view. The default value matches everything.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub kind: Option<MediaKind>,
    pub genres: BTreeSet<Genre>,
    pub rating: Option<RangeInclusive<StarRating>>,
    pub year: Option<RangeInclusive<i32>>,
    pub statuses: BTreeSet<MediaStatus>,
    pub show_types: BTreeSet<ShowType>,
    /// Shows only.
    pub season_count: Option<RangeInclusive<u32>>,
    pub watched: Option<bool>,
    pub movie_watched_mode: MovieWatchedMode,
    pub watch_again: Option<bool>,
    pub tags: BTreeSet<String>,
}

impl FilterSettings {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True when no constraint is populated.
    pub fn is_reset(&self) -> bool {
        self.kind.is_none()
            && self.genres.is_empty()
            && self.rating.is_none()
            && self.year.is_none()
            && self.statuses.is_empty()
            && self.show_types.is_empty()
            && self.season_count.is_none()
            && self.watched.is_none()
            && self.watch_again.is_none()
            && self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_clears_every_constraint() {
        let mut settings = FilterSettings {
            kind: Some(MediaKind::Show),
            year: Some(2000..=2010),
            watched: Some(true),
            tags: BTreeSet::from(["comfort".to_string()]),
            ..Default::default()
        };
        assert!(!settings.is_reset());

        settings.reset();
        assert!(settings.is_reset());
        assert_eq!(settings, FilterSettings::default());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: FilterSettings =
            serde_json::from_str(r#"{"kind":"movie","rating":{"start":6,"end":10}}"#).unwrap();
        assert_eq!(settings.kind, Some(MediaKind::Movie));
        assert_eq!(settings.rating, Some(StarRating::Three..=StarRating::Five));
        assert!(settings.genres.is_empty());
        assert_eq!(settings.movie_watched_mode, MovieWatchedMode::WatchedAtAll);
    }
}
