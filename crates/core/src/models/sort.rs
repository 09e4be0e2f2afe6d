use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::CatalogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Name,
    Created,
    Updated,
    ReleaseDate,
    Rating,
    Popularity,
    VoteAverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortingOrder {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortingOrder {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }
}

/// Compares two optional values; a missing value always sorts last.
fn compare_optional<T: PartialOrd>(a: Option<T>, b: Option<T>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ordering = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort; ties keep their incoming order.
pub fn sort_entries(entries: &mut [CatalogEntry], order: SortingOrder) {
    let direction = order.direction;
    entries.sort_by(|a, b| match order.key {
        SortKey::Name => compare_optional(
            Some(a.title().to_lowercase()),
            Some(b.title().to_lowercase()),
            direction,
        ),
        SortKey::Created => compare_optional(Some(a.created_at), Some(b.created_at), direction),
        SortKey::Updated => compare_optional(Some(a.updated_at), Some(b.updated_at), direction),
        SortKey::ReleaseDate => compare_optional(a.release_date(), b.release_date(), direction),
        SortKey::Rating => compare_optional(
            a.personal.rating.is_rated().then_some(a.personal.rating),
            b.personal.rating.is_rated().then_some(b.personal.rating),
            direction,
        ),
        SortKey::Popularity => {
            compare_optional(a.common.popularity, b.common.popularity, direction)
        }
        SortKey::VoteAverage => {
            compare_optional(a.common.vote_average, b.common.vote_average, direction)
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StarRating;
    use crate::test_helpers::fixtures;

    fn titles(entries: &[CatalogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.title()).collect()
    }

    #[test]
    fn test_sort_by_name_is_case_insensitive() {
        let mut entries = vec![
            fixtures::movie(1, "zodiac"),
            fixtures::movie(2, "Alien"),
            fixtures::movie(3, "blade Runner"),
        ];
        sort_entries(&mut entries, SortingOrder::default());
        assert_eq!(titles(&entries), vec!["Alien", "blade Runner", "zodiac"]);

        sort_entries(
            &mut entries,
            SortingOrder::new(SortKey::Name, SortDirection::Desc),
        );
        assert_eq!(titles(&entries), vec!["zodiac", "blade Runner", "Alien"]);
    }

    #[test]
    fn test_unrated_entries_sort_last_in_both_directions() {
        let mut rated_high = fixtures::movie(1, "High");
        rated_high.personal.rating = StarRating::Five;
        let mut rated_low = fixtures::movie(2, "Low");
        rated_low.personal.rating = StarRating::One;
        let unrated = fixtures::movie(3, "Unrated");

        let mut entries = vec![unrated.clone(), rated_low.clone(), rated_high.clone()];
        sort_entries(&mut entries, SortingOrder::new(SortKey::Rating, SortDirection::Asc));
        assert_eq!(titles(&entries), vec!["Low", "High", "Unrated"]);

        sort_entries(&mut entries, SortingOrder::new(SortKey::Rating, SortDirection::Desc));
        assert_eq!(titles(&entries), vec!["High", "Low", "Unrated"]);
    }

    #[test]
    fn test_ties_keep_incoming_order() {
        let mut first = fixtures::movie(1, "First");
        first.common.popularity = Some(10.0);
        let mut second = fixtures::movie(2, "Second");
        second.common.popularity = Some(10.0);

        let mut entries = vec![first, second];
        sort_entries(
            &mut entries,
            SortingOrder::new(SortKey::Popularity, SortDirection::Desc),
        );
        assert_eq!(titles(&entries), vec!["First", "Second"]);
    }
}
