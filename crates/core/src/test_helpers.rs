//! Test helpers for creating in-memory test databases, fixtures and a scripted metadata source

use crate::db::DbPool;
use sqlx::sqlite::SqlitePoolOptions;

/// Creates an in-memory SQLite database with all migrations applied
pub async fn create_test_db() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    sqlx::migrate!("./src/db/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Test fixtures for common test data
pub mod fixtures {
    use chrono::NaiveDate;

    use crate::models::{
        CatalogEntry, CommonMetadata, Details, Genre, MediaStatus, Metadata, MovieDetails, Season,
        ShowDetails, ShowType,
    };

    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    pub fn movie_metadata(tmdb_id: i64, title: &str) -> Metadata {
        Metadata {
            tmdb_id,
            common: CommonMetadata {
                title: title.to_string(),
                status: Some(MediaStatus::Released),
                genres: vec![Genre::new(18, "Drama")],
                popularity: Some(10.0),
                vote_average: Some(7.5),
                poster_path: Some(format!("/movie-{tmdb_id}.jpg")),
                ..Default::default()
            },
            details: Details::Movie(MovieDetails {
                release_date: Some(date(2010, 1, 1)),
                runtime: Some(120),
                ..Default::default()
            }),
        }
    }

    /// A show with `seasons` regular seasons of ten episodes each.
    pub fn show_metadata(tmdb_id: i64, title: &str, seasons: u32) -> Metadata {
        Metadata {
            tmdb_id,
            common: CommonMetadata {
                title: title.to_string(),
                status: Some(MediaStatus::ReturningSeries),
                genres: vec![Genre::new(10765, "Sci-Fi & Fantasy")],
                popularity: Some(20.0),
                vote_average: Some(8.0),
                poster_path: Some(format!("/show-{tmdb_id}.jpg")),
                ..Default::default()
            },
            details: Details::Show(ShowDetails {
                first_air_date: Some(date(2011, 4, 17)),
                seasons: (1..=seasons)
                    .map(|n| Season {
                        season_number: n,
                        episode_count: 10,
                        name: Some(format!("Season {n}")),
                        air_date: None,
                    })
                    .collect(),
                number_of_seasons: Some(seasons),
                number_of_episodes: Some(seasons * 10),
                show_type: Some(ShowType::Scripted),
                ..Default::default()
            }),
        }
    }

    pub fn movie(tmdb_id: i64, title: &str) -> CatalogEntry {
        CatalogEntry::new(movie_metadata(tmdb_id, title))
    }

    pub fn show(tmdb_id: i64, title: &str, seasons: u32) -> CatalogEntry {
        CatalogEntry::new(show_metadata(tmdb_id, title, seasons))
    }
}

/// Scripted [`MetadataSource`] for exercising the synchronizer without a network.
pub mod fake {
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    use crate::error::{Error, Result};
    use crate::models::{ExternalId, Metadata};
    use crate::services::MetadataSource;

    #[derive(Default)]
    pub struct FakeSource {
        metadata: Mutex<HashMap<ExternalId, Metadata>>,
        failing: Mutex<HashSet<ExternalId>>,
        hanging: Mutex<HashSet<ExternalId>>,
        changed: Mutex<HashSet<ExternalId>>,
        thumbnails: Mutex<HashMap<String, Vec<u8>>>,
        fail_changes: Mutex<bool>,
        delay: Mutex<Option<Duration>>,
        /// Waited on inside `changed_ids` when set.
        changes_gate: Mutex<Option<std::sync::Arc<Notify>>>,
        pub changes_windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
        fetches: AtomicUsize,
        completed: AtomicUsize,
        progress: Notify,
        thumbnail_fetches: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_metadata(&self, metadata: Metadata) {
            let mut map = self.metadata.lock().unwrap();
            map.insert(metadata.external_id(), metadata);
        }

        pub fn fail(&self, id: ExternalId) {
            self.failing.lock().unwrap().insert(id);
        }

        pub fn hang(&self, id: ExternalId) {
            self.hanging.lock().unwrap().insert(id);
        }

        pub fn mark_changed(&self, id: ExternalId) {
            self.changed.lock().unwrap().insert(id);
        }

        pub fn set_thumbnail(&self, poster_path: &str, data: &[u8]) {
            let mut map = self.thumbnails.lock().unwrap();
            map.insert(poster_path.to_string(), data.to_vec());
        }

        pub fn fail_changes(&self) {
            *self.fail_changes.lock().unwrap() = true;
        }

        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = Some(delay);
        }

        pub fn gate_changes(&self, gate: std::sync::Arc<Notify>) {
            *self.changes_gate.lock().unwrap() = Some(gate);
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        /// Resolves once `count` metadata fetches have finished, successfully or not.
        pub async fn wait_for_fetches(&self, count: usize) {
            loop {
                let notified = self.progress.notified();
                if self.completed.load(Ordering::SeqCst) >= count {
                    return;
                }
                notified.await;
            }
        }

        pub fn thumbnail_fetch_count(&self) -> usize {
            self.thumbnail_fetches.load(Ordering::SeqCst)
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetadataSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn changed_ids(
            &self,
            since: DateTime<Utc>,
            until: DateTime<Utc>,
        ) -> Result<HashSet<ExternalId>> {
            let gate = self.changes_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            self.changes_windows.lock().unwrap().push((since, until));
            if *self.fail_changes.lock().unwrap() {
                return Err(Error::ExternalApi("change feed unavailable".into()));
            }
            Ok(self.changed.lock().unwrap().clone())
        }

        async fn fetch_metadata(&self, id: ExternalId) -> Result<Metadata> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let hangs = self.hanging.lock().unwrap().contains(&id);
            if hangs {
                std::future::pending::<()>().await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let result = if self.failing.lock().unwrap().contains(&id) {
                Err(Error::ExternalApi(format!("fetch failed for {}", id.tmdb_id)))
            } else {
                self.metadata
                    .lock()
                    .unwrap()
                    .get(&id)
                    .cloned()
                    .ok_or(Error::NotFound)
            };

            self.completed.fetch_add(1, Ordering::SeqCst);
            self.progress.notify_waiters();
            result
        }

        async fn fetch_thumbnail(&self, poster_path: &str) -> Result<Vec<u8>> {
            self.thumbnail_fetches.fetch_add(1, Ordering::SeqCst);
            self.thumbnails
                .lock()
                .unwrap()
                .get(poster_path)
                .cloned()
                .ok_or(Error::NotFound)
        }
    }
}
