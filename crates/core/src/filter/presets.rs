//! Named filters backing the built-in library lists.

use serde::{Deserialize, Serialize};

use crate::models::{CatalogEntry, Media};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Favorites,
    Watchlist,
    /// Entries not dismissed as not watched that still lack a rating, a watch-again
    /// answer, tags or a watch marker.
    Problems,
    /// Shows the user is following that have seasons beyond the last one watched.
    NewSeasonsAvailable,
}

impl Preset {
    /// Primary predicate, equivalent to [`Preset::sql_clause`].
    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        match self {
            Preset::Favorites => entry.personal.is_favorite,
            Preset::Watchlist => entry.personal.is_on_watchlist,
            Preset::Problems => is_problem(entry),
            Preset::NewSeasonsAvailable => is_new_season_candidate(entry),
        }
    }

    pub fn sql_clause(&self) -> &'static str {
        match self {
            Preset::Favorites => "is_favorite = 1",
            Preset::Watchlist => "is_on_watchlist = 1",
            Preset::Problems => {
                "watch_marker IS NOT 'not_watched' AND (personal_rating = 0 OR watch_again IS NULL \
                 OR json_array_length(tags) = 0 OR watch_marker IS NULL)"
            }
            Preset::NewSeasonsAvailable => {
                "kind = 'show' AND watch_marker = 'progress' AND watched_season < season_count \
                 AND (watch_again IS NULL OR watch_again = 1)"
            }
        }
    }

    /// Second pass that cannot be expressed in the primary predicate.
    pub fn post_filter(&self, entry: &CatalogEntry) -> bool {
        match self {
            Preset::NewSeasonsAvailable => has_aired_new_season(entry),
            _ => true,
        }
    }

    /// Runs both passes, keeping the incoming order.
    pub fn apply(&self, entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
        entries
            .into_iter()
            .filter(|entry| self.matches(entry) && self.post_filter(entry))
            .collect()
    }
}

pub fn is_problem(entry: &CatalogEntry) -> bool {
    let watch_state = entry.watch_state();
    if watch_state.is_some_and(|s| s.is_not_watched()) {
        return false;
    }

    !entry.personal.rating.is_rated()
        || entry.personal.watch_again.is_none()
        || entry.personal.tags.is_empty()
        || watch_state.is_none()
}

pub fn is_new_season_candidate(entry: &CatalogEntry) -> bool {
    let Media::Show { details, watched } = &entry.media else {
        return false;
    };
    let Some(watched_season) = watched.and_then(|w| w.season()) else {
        return false;
    };

    details
        .season_count()
        .is_some_and(|count| watched_season < count)
        && entry.personal.watch_again != Some(false)
}

/// The newest season with aired episodes is past the one the user stopped at.
/// Announced seasons with zero episodes do not count.
pub fn has_aired_new_season(entry: &CatalogEntry) -> bool {
    let Media::Show { details, watched } = &entry.media else {
        return false;
    };
    let Some(watched_season) = watched.and_then(|w| w.season()) else {
        return false;
    };

    details
        .latest_aired_season()
        .is_some_and(|latest| latest > watched_season)
}
