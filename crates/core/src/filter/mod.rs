//! Filter engine.
//!
//! An entry matches a [`FilterSettings`] when every populated constraint accepts it.
//! Set-valued constraints (genres, statuses, show types, tags) accept an entry if any of
//! its values is in the set, and an entry with no value at all for such a field is
//! accepted too. Range constraints (rating, year, season count) reject an entry that has
//! no value. The asymmetry is intentional: a missing category never hides an entry, a
//! missing date or season count cannot fall inside a range.
//!
//! Filtering never fails. The same rules are rendered as SQL by [`sql::predicate`] so
//! store queries and in-memory filtering agree.

pub mod presets;
pub mod sql;

use std::borrow::Borrow;
use std::collections::BTreeSet;

use crate::models::{
    CatalogEntry, FilterSettings, Media, MediaKind, MovieWatchState, MovieWatchedMode,
    ShowWatchState,
};

pub use presets::Preset;

/// Movie counts as watched when it is watched or partially watched.
pub fn movie_watched_at_all(state: Option<MovieWatchState>) -> bool {
    matches!(
        state,
        Some(MovieWatchState::Watched | MovieWatchState::PartiallyWatched)
    )
}

/// Movie counts as watched only when it is fully watched.
pub fn movie_fully_watched(state: Option<MovieWatchState>) -> bool {
    state == Some(MovieWatchState::Watched)
}

/// Show has a watched-up-to marker.
pub fn show_watched(state: Option<ShowWatchState>) -> bool {
    state.and_then(|s| s.season()).is_some()
}

fn matches_watched(entry: &CatalogEntry, wanted: bool, mode: MovieWatchedMode) -> bool {
    match (&entry.media, wanted) {
        (Media::Movie { watched, .. }, true) => match mode {
            MovieWatchedMode::WatchedAtAll => movie_watched_at_all(*watched),
            MovieWatchedMode::FullyWatched => movie_fully_watched(*watched),
        },
        (Media::Movie { watched, .. }, false) => *watched == Some(MovieWatchState::NotWatched),
        (Media::Show { watched, .. }, true) => show_watched(*watched),
        (Media::Show { watched, .. }, false) => *watched == Some(ShowWatchState::NotWatched),
    }
}

/// Any-of match for a categorical field. No values on the entry side always matches.
fn matches_any<T, I>(wanted: &BTreeSet<T>, values: I) -> bool
where
    T: Ord,
    I: IntoIterator,
    I::Item: Borrow<T>,
{
    if wanted.is_empty() {
        return true;
    }
    let mut seen_any = false;
    for value in values {
        seen_any = true;
        let value: &T = value.borrow();
        if wanted.contains(value) {
            return true;
        }
    }
    !seen_any
}

pub fn matches(entry: &CatalogEntry, settings: &FilterSettings) -> bool {
    if let Some(kind) = settings.kind
        && entry.kind() != kind
    {
        return false;
    }

    if let Some(range) = &settings.rating
        && !range.contains(&entry.personal.rating)
    {
        return false;
    }

    if let Some(range) = &settings.year
        && !entry.year().is_some_and(|year| range.contains(&year))
    {
        return false;
    }

    // Genre names are localized; ids are stable.
    if !settings.genres.is_empty() {
        let wanted: BTreeSet<i64> = settings.genres.iter().map(|g| g.id).collect();
        if !matches_any(&wanted, entry.genres().iter().map(|g| g.id)) {
            return false;
        }
    }

    if !matches_any(&settings.statuses, entry.status()) {
        return false;
    }

    // Season count and show type only make sense for shows; movies pass.
    if entry.kind() == MediaKind::Show {
        if let Some(range) = &settings.season_count
            && !entry.season_count().is_some_and(|count| range.contains(&count))
        {
            return false;
        }

        if !matches_any(&settings.show_types, entry.show_type()) {
            return false;
        }
    }

    if let Some(wanted) = settings.watched
        && !matches_watched(entry, wanted, settings.movie_watched_mode)
    {
        return false;
    }

    if let Some(wanted) = settings.watch_again
        && entry.personal.watch_again != Some(wanted)
    {
        return false;
    }

    matches_any(&settings.tags, &entry.personal.tags)
}

/// Keeps the entries matching `settings`, in their original order.
pub fn apply(entries: Vec<CatalogEntry>, settings: &FilterSettings) -> Vec<CatalogEntry> {
    entries
        .into_iter()
        .filter(|entry| matches(entry, settings))
        .collect()
}

/// Borrowing variant of [`apply`].
pub fn apply_ref<'a>(entries: &'a [CatalogEntry], settings: &FilterSettings) -> Vec<&'a CatalogEntry> {
    entries.iter().filter(|entry| matches(entry, settings)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Genre, MediaStatus, ShowType, StarRating, WatchState};
    use crate::test_helpers::fixtures;
    use chrono::NaiveDate;

    fn horror() -> Genre {
        Genre::new(27, "Horror")
    }

    fn drama() -> Genre {
        Genre::new(18, "Drama")
    }

    fn comedy() -> Genre {
        Genre::new(35, "Comedy")
    }

    fn movie_with(id: i64, genres: Vec<Genre>, watched: MovieWatchState) -> CatalogEntry {
        let mut entry = fixtures::movie(id, &format!("Movie {id}"));
        entry.common.genres = genres;
        entry
            .set_watch_state(Some(WatchState::Movie(watched)))
            .unwrap();
        entry
    }

    fn sample_library() -> Vec<CatalogEntry> {
        let mut rated = fixtures::movie(1, "Rated");
        rated.personal.rating = StarRating::Four;
        rated.personal.watch_again = Some(true);
        rated.personal.tags.insert("classic".into());
        rated.common.genres = vec![drama()];
        rated.common.status = Some(MediaStatus::Released);

        let mut show = fixtures::show(2, "Show", 3);
        if let Media::Show { details, .. } = &mut show.media {
            details.show_type = Some(ShowType::Scripted);
        }
        show.set_watch_state(Some(WatchState::Show(ShowWatchState::Season { season: 1 })))
            .unwrap();

        let mut undated = fixtures::movie(3, "Undated");
        if let Media::Movie { details, .. } = &mut undated.media {
            details.release_date = None;
        }

        vec![rated, show, undated]
    }

    #[test]
    fn test_reset_settings_match_everything() {
        let settings = FilterSettings::default();
        for entry in sample_library() {
            assert!(matches(&entry, &settings), "{} should match", entry.title());
        }
    }

    #[test]
    fn test_genre_and_watched_example() {
        let entries = vec![
            movie_with(1, vec![horror(), drama()], MovieWatchState::NotWatched),
            movie_with(2, vec![comedy()], MovieWatchState::NotWatched),
            movie_with(3, vec![horror()], MovieWatchState::Watched),
        ];
        let settings = FilterSettings {
            genres: BTreeSet::from([horror()]),
            watched: Some(false),
            ..Default::default()
        };

        let result = apply(entries, &settings);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].tmdb_id, 1);
    }

    #[test]
    fn test_genre_matches_by_id_across_languages() {
        let entry = movie_with(1, vec![Genre::new(27, "Horreur")], MovieWatchState::Watched);
        let settings = FilterSettings {
            genres: BTreeSet::from([Genre::new(27, "Horror")]),
            ..Default::default()
        };
        assert!(matches(&entry, &settings));

        let other = FilterSettings {
            genres: BTreeSet::from([Genre::new(35, "Horreur")]),
            ..Default::default()
        };
        assert!(!matches(&entry, &other));
    }

    #[test]
    fn test_adding_values_never_breaks_a_category_match() {
        let settings = FilterSettings {
            genres: BTreeSet::from([drama()]),
            ..Default::default()
        };
        let mut entry = movie_with(1, vec![drama()], MovieWatchState::Watched);
        assert!(matches(&entry, &settings));

        entry.common.genres.push(comedy());
        entry.common.genres.push(horror());
        assert!(matches(&entry, &settings));
    }

    #[test]
    fn test_missing_category_values_are_included() {
        let entry = movie_with(1, vec![], MovieWatchState::Watched);
        let settings = FilterSettings {
            genres: BTreeSet::from([horror()]),
            statuses: BTreeSet::from([MediaStatus::Ended]),
            tags: BTreeSet::from(["favorites".to_string()]),
            ..Default::default()
        };
        assert!(entry.status().is_none());
        assert!(matches(&entry, &settings));
    }

    #[test]
    fn test_missing_year_is_excluded_by_year_range() {
        let library = sample_library();
        let undated = &library[2];
        assert_eq!(undated.year(), None);

        let settings = FilterSettings {
            year: Some(2000..=2020),
            ..Default::default()
        };
        assert!(!matches(undated, &settings));
        // Without the constraint the undated entry is fine.
        assert!(matches(undated, &FilterSettings::default()));
    }

    #[test]
    fn test_year_range_is_inclusive() {
        let mut entry = fixtures::movie(1, "Edge");
        if let Media::Movie { details, .. } = &mut entry.media {
            details.release_date = NaiveDate::from_ymd_opt(2020, 12, 31);
        }
        let settings = FilterSettings {
            year: Some(2000..=2020),
            ..Default::default()
        };
        assert!(matches(&entry, &settings));
    }

    #[test]
    fn test_rating_range_on_half_star_scale() {
        let mut entry = fixtures::movie(1, "Rated");
        entry.personal.rating = StarRating::ThreeAndHalf;

        let inside = FilterSettings {
            rating: Some(StarRating::Three..=StarRating::Four),
            ..Default::default()
        };
        let outside = FilterSettings {
            rating: Some(StarRating::FourAndHalf..=StarRating::Five),
            ..Default::default()
        };
        assert!(matches(&entry, &inside));
        assert!(!matches(&entry, &outside));
    }

    #[test]
    fn test_kind_filter() {
        let library = sample_library();
        let shows = FilterSettings {
            kind: Some(MediaKind::Show),
            ..Default::default()
        };
        let result = apply_ref(&library, &shows);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].kind(), MediaKind::Show);
    }

    #[test]
    fn test_movies_are_exempt_from_show_only_constraints() {
        let library = sample_library();
        let settings = FilterSettings {
            season_count: Some(5..=10),
            show_types: BTreeSet::from([ShowType::Documentary]),
            ..Default::default()
        };
        let result = apply_ref(&library, &settings);
        let titles: Vec<&str> = result.iter().map(|e| e.title()).collect();
        assert_eq!(titles, vec!["Rated", "Undated"]);
    }

    #[test]
    fn test_season_count_range_matches_show() {
        let library = sample_library();
        let settings = FilterSettings {
            kind: Some(MediaKind::Show),
            season_count: Some(2..=3),
            ..Default::default()
        };
        assert_eq!(apply_ref(&library, &settings).len(), 1);
    }

    #[test]
    fn test_movie_watched_modes() {
        let partial = movie_with(1, vec![], MovieWatchState::PartiallyWatched);
        let full = movie_with(2, vec![], MovieWatchState::Watched);

        let at_all = FilterSettings {
            watched: Some(true),
            ..Default::default()
        };
        let fully = FilterSettings {
            watched: Some(true),
            movie_watched_mode: MovieWatchedMode::FullyWatched,
            ..Default::default()
        };

        assert!(matches(&partial, &at_all));
        assert!(matches(&full, &at_all));
        assert!(!matches(&partial, &fully));
        assert!(matches(&full, &fully));

        assert!(movie_watched_at_all(Some(MovieWatchState::PartiallyWatched)));
        assert!(!movie_fully_watched(Some(MovieWatchState::PartiallyWatched)));
        assert!(!movie_watched_at_all(None));
    }

    #[test]
    fn test_unmarked_entries_match_neither_watched_value() {
        let movie = fixtures::movie(1, "Unmarked movie");
        let show = fixtures::show(2, "Unmarked show", 2);
        for wanted in [true, false] {
            let settings = FilterSettings {
                watched: Some(wanted),
                ..Default::default()
            };
            assert!(!matches(&movie, &settings));
            assert!(!matches(&show, &settings));
        }
    }

    #[test]
    fn test_show_watched_states() {
        let mut show = fixtures::show(1, "Show", 4);
        let watched = FilterSettings {
            watched: Some(true),
            ..Default::default()
        };
        let not_watched = FilterSettings {
            watched: Some(false),
            ..Default::default()
        };

        show.set_watch_state(Some(WatchState::Show(ShowWatchState::Episode {
            season: 2,
            episode: 3,
        })))
        .unwrap();
        assert!(matches(&show, &watched));
        assert!(!matches(&show, &not_watched));

        show.set_watch_state(Some(WatchState::Show(ShowWatchState::NotWatched)))
            .unwrap();
        assert!(!matches(&show, &watched));
        assert!(matches(&show, &not_watched));
    }

    #[test]
    fn test_unset_watch_again_never_matches() {
        let mut entry = fixtures::movie(1, "Maybe");
        for wanted in [true, false] {
            let settings = FilterSettings {
                watch_again: Some(wanted),
                ..Default::default()
            };
            assert!(!matches(&entry, &settings));
        }

        entry.personal.watch_again = Some(false);
        let settings = FilterSettings {
            watch_again: Some(false),
            ..Default::default()
        };
        assert!(matches(&entry, &settings));
    }

    #[test]
    fn test_tags_match_any() {
        let mut entry = fixtures::movie(1, "Tagged");
        entry.personal.tags = BTreeSet::from(["cozy".to_string(), "rewatch".to_string()]);
        let settings = FilterSettings {
            tags: BTreeSet::from(["rewatch".to_string(), "date night".to_string()]),
            ..Default::default()
        };
        assert!(matches(&entry, &settings));

        let other = FilterSettings {
            tags: BTreeSet::from(["horror night".to_string()]),
            ..Default::default()
        };
        assert!(!matches(&entry, &other));
    }

    #[test]
    fn test_apply_preserves_order() {
        let entries: Vec<CatalogEntry> = (1..=6)
            .map(|id| {
                let mut entry = fixtures::movie(id, &format!("Movie {id}"));
                entry.personal.is_favorite = id % 2 == 0;
                entry
            })
            .collect();
        let settings = FilterSettings {
            kind: Some(MediaKind::Movie),
            ..Default::default()
        };
        let ids: Vec<i64> = apply(entries, &settings).iter().map(|e| e.tmdb_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }
}
