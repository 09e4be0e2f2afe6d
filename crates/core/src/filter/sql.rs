//! Renders [`FilterSettings`] as a SQLite `WHERE` clause over the `entries` table.
//!
//! Genres and tags are stored as JSON arrays and matched with `json_each`.

use crate::models::{FilterSettings, MovieWatchedMode};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
}

/// Conjunction of SQL conditions plus their positional bind values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlPredicate {
    clauses: Vec<String>,
    binds: Vec<SqlValue>,
}

impl SqlPredicate {
    pub fn push(&mut self, clause: impl Into<String>, binds: impl IntoIterator<Item = SqlValue>) {
        self.clauses.push(clause.into());
        self.binds.extend(binds);
    }

    /// Adds a condition that takes no bind values.
    pub fn push_clause(&mut self, clause: impl Into<String>) {
        self.clauses.push(clause.into());
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `" WHERE a AND b"`, or an empty string when there is nothing to filter on.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn binds(&self) -> &[SqlValue] {
        &self.binds
    }

    pub fn into_binds(self) -> Vec<SqlValue> {
        self.binds
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn json_any(column: &str, count: usize) -> String {
    format!(
        "(json_array_length({column}) = 0 OR EXISTS (SELECT 1 FROM json_each(entries.{column}) WHERE json_each.value IN ({})))",
        placeholders(count)
    )
}

pub fn predicate(settings: &FilterSettings) -> SqlPredicate {
    let mut predicate = SqlPredicate::default();

    if let Some(kind) = settings.kind {
        predicate.push("kind = ?", [SqlValue::Text(kind.as_str().to_string())]);
    }

    if let Some(range) = &settings.rating {
        predicate.push(
            "personal_rating BETWEEN ? AND ?",
            [
                SqlValue::Int(range.start().value().into()),
                SqlValue::Int(range.end().value().into()),
            ],
        );
    }

    if let Some(range) = &settings.year {
        predicate.push(
            "release_year BETWEEN ? AND ?",
            [
                SqlValue::Int((*range.start()).into()),
                SqlValue::Int((*range.end()).into()),
            ],
        );
    }

    if !settings.genres.is_empty() {
        predicate.push(
            json_any("genres", settings.genres.len()),
            settings.genres.iter().map(|g| SqlValue::Int(g.id)),
        );
    }

    if !settings.statuses.is_empty() {
        predicate.push(
            format!(
                "(status IS NULL OR status IN ({}))",
                placeholders(settings.statuses.len())
            ),
            settings
                .statuses
                .iter()
                .map(|s| SqlValue::Text(s.as_str().to_string())),
        );
    }

    if let Some(range) = &settings.season_count {
        predicate.push(
            "(kind = 'movie' OR season_count BETWEEN ? AND ?)",
            [
                SqlValue::Int((*range.start()).into()),
                SqlValue::Int((*range.end()).into()),
            ],
        );
    }

    if !settings.show_types.is_empty() {
        predicate.push(
            format!(
                "(kind = 'movie' OR show_type IS NULL OR show_type IN ({}))",
                placeholders(settings.show_types.len())
            ),
            settings
                .show_types
                .iter()
                .map(|t| SqlValue::Text(t.as_str().to_string())),
        );
    }

    match (settings.watched, settings.movie_watched_mode) {
        (Some(true), MovieWatchedMode::WatchedAtAll) => predicate.push_clause(
            "((kind = 'movie' AND watch_marker IN ('watched', 'partially')) OR (kind = 'show' AND watch_marker = 'progress'))",
        ),
        (Some(true), MovieWatchedMode::FullyWatched) => predicate.push_clause(
            "((kind = 'movie' AND watch_marker = 'watched') OR (kind = 'show' AND watch_marker = 'progress'))",
        ),
        (Some(false), _) => predicate.push_clause("watch_marker = 'not_watched'"),
        (None, _) => {}
    }

    if let Some(watch_again) = settings.watch_again {
        predicate.push("watch_again = ?", [SqlValue::Int(watch_again.into())]);
    }

    if !settings.tags.is_empty() {
        predicate.push(
            json_any("tags", settings.tags.len()),
            settings.tags.iter().map(|t| SqlValue::Text(t.clone())),
        );
    }

    predicate
}
