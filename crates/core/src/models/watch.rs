use serde::{Deserialize, Serialize};

use super::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieWatchState {
    Watched,
    PartiallyWatched,
    NotWatched,
}

/// How far the user got with a show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ShowWatchState {
    /// Watched up to and including the given season.
    Season { season: u32 },
    /// Watched up to the given episode of the given season.
    Episode { season: u32, episode: u32 },
    NotWatched,
}

impl ShowWatchState {
    /// The last season the user reached, if any.
    pub fn season(&self) -> Option<u32> {
        match self {
            ShowWatchState::Season { season } | ShowWatchState::Episode { season, .. } => {
                Some(*season)
            }
            ShowWatchState::NotWatched => None,
        }
    }

    pub fn is_not_watched(&self) -> bool {
        matches!(self, ShowWatchState::NotWatched)
    }
}

/// A watch marker tagged with the kind it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum WatchState {
    Movie(MovieWatchState),
    Show(ShowWatchState),
}

impl WatchState {
    pub fn kind(&self) -> MediaKind {
        match self {
            WatchState::Movie(_) => MediaKind::Movie,
            WatchState::Show(_) => MediaKind::Show,
        }
    }

    pub fn is_not_watched(&self) -> bool {
        matches!(
            self,
            WatchState::Movie(MovieWatchState::NotWatched)
                | WatchState::Show(ShowWatchState::NotWatched)
        )
    }

    /// Compact marker stored next to the entry for predicate queries.
    pub fn marker(&self) -> &'static str {
        match self {
            WatchState::Movie(MovieWatchState::Watched) => "watched",
            WatchState::Movie(MovieWatchState::PartiallyWatched) => "partially",
            WatchState::Movie(MovieWatchState::NotWatched)
            | WatchState::Show(ShowWatchState::NotWatched) => "not_watched",
            WatchState::Show(_) => "progress",
        }
    }
}
