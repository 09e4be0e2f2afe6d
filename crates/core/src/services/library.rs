use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::{Error, Result};
use crate::filter::{self, Preset, sql::SqlValue};
use crate::models::{
    CatalogEntry, EntryRow, ExternalId, FilterSettings, PersonalUpdate, SortingOrder, WatchState,
    sort_entries,
};
use crate::services::MetadataSource;

/// Change notifications for observers of the library (UI, caches).
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryEvent {
    Inserted(Uuid),
    Updated(Uuid),
    Deleted(Uuid),
    Refreshed(Vec<Uuid>),
}

/// Isolated working copy of refreshed entries, written to the store in one transaction.
#[derive(Debug, Default)]
pub struct Overlay {
    entries: HashMap<Uuid, CatalogEntry>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: CatalogEntry) {
        self.entries.insert(entry.id, entry);
    }

    pub fn get(&self, id: Uuid) -> Option<&CatalogEntry> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }
}

/// Column values derived from the remote metadata of an entry.
struct MetadataColumns {
    metadata: String,
    title: String,
    release_date: Option<String>,
    release_year: Option<i32>,
    status: Option<&'static str>,
    show_type: Option<&'static str>,
    season_count: Option<i64>,
    genres: String,
}

impl MetadataColumns {
    fn from_entry(entry: &CatalogEntry) -> Result<Self> {
        let genre_ids: Vec<i64> = entry.genres().iter().map(|g| g.id).collect();
        Ok(Self {
            metadata: serde_json::to_string(&entry.metadata())?,
            title: entry.title().to_string(),
            release_date: entry.release_date().map(|d| d.format("%Y-%m-%d").to_string()),
            release_year: entry.year(),
            status: entry.status().map(|s| s.as_str()),
            show_type: entry.show_type().map(|t| t.as_str()),
            season_count: entry.season_count().map(i64::from),
            genres: serde_json::to_string(&genre_ids)?,
        })
    }
}

/// Column values for the user-provided fields of an entry.
struct PersonalColumns {
    rating: i64,
    watch_state: Option<String>,
    watch_marker: Option<&'static str>,
    watched_season: Option<i64>,
    watch_again: Option<bool>,
    tags: String,
}

impl PersonalColumns {
    fn from_entry(entry: &CatalogEntry) -> Result<Self> {
        let watch_state = entry.watch_state();
        let watched_season = match watch_state {
            Some(WatchState::Show(state)) => state.season().map(i64::from),
            _ => None,
        };
        Ok(Self {
            rating: entry.personal.rating.value().into(),
            watch_state: watch_state.map(|s| serde_json::to_string(&s)).transpose()?,
            watch_marker: watch_state.map(|s| s.marker()),
            watched_season,
            watch_again: entry.personal.watch_again,
            tags: serde_json::to_string(&entry.personal.tags)?,
        })
    }
}

/// The durable store of catalog entries.
#[derive(Clone)]
pub struct LibraryService {
    pool: DbPool,
    events: broadcast::Sender<LibraryEvent>,
}

impl LibraryService {
    pub fn new(pool: DbPool) -> Self {
        let (events, _) = broadcast::channel(100);
        Self { pool, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: LibraryEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub async fn exists(&self, id: ExternalId) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM entries WHERE kind = ? AND tmdb_id = ?",
        )
        .bind(id.kind.as_str())
        .bind(id.tmdb_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Persists a new entry. A second entry for the same remote title is rejected.
    pub async fn insert(&self, entry: CatalogEntry) -> Result<CatalogEntry> {
        let external_id = entry.external_id();
        if self.exists(external_id).await? {
            return Err(Error::AlreadyExists {
                kind: external_id.kind,
                tmdb_id: external_id.tmdb_id,
            });
        }

        let meta = MetadataColumns::from_entry(&entry)?;
        let personal = PersonalColumns::from_entry(&entry)?;

        let result = sqlx::query(
            r#"
            INSERT INTO entries (
                id, kind, tmdb_id, metadata, title, release_date, release_year, status,
                show_type, season_count, genres, personal_rating, watch_state, watch_marker,
                watched_season, watch_again, tags, notes, is_favorite, is_on_watchlist,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.kind().as_str())
        .bind(entry.tmdb_id)
        .bind(&meta.metadata)
        .bind(&meta.title)
        .bind(&meta.release_date)
        .bind(meta.release_year)
        .bind(meta.status)
        .bind(meta.show_type)
        .bind(meta.season_count)
        .bind(&meta.genres)
        .bind(personal.rating)
        .bind(&personal.watch_state)
        .bind(personal.watch_marker)
        .bind(personal.watched_season)
        .bind(personal.watch_again)
        .bind(&personal.tags)
        .bind(&entry.personal.notes)
        .bind(entry.personal.is_favorite)
        .bind(entry.personal.is_on_watchlist)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(Error::AlreadyExists {
                    kind: external_id.kind,
                    tmdb_id: external_id.tmdb_id,
                });
            }
            Err(e) => return Err(e.into()),
        }

        debug!(entry_id = %entry.id, tmdb_id = entry.tmdb_id, "inserted entry");
        self.publish(LibraryEvent::Inserted(entry.id));
        self.get(entry.id).await
    }

    /// Adds a title from the remote service to the library.
    pub async fn add_from_source(
        &self,
        source: &dyn MetadataSource,
        id: ExternalId,
    ) -> Result<CatalogEntry> {
        if self.exists(id).await? {
            return Err(Error::AlreadyExists {
                kind: id.kind,
                tmdb_id: id.tmdb_id,
            });
        }

        let metadata = source.fetch_metadata(id).await?;
        if metadata.external_id() != id {
            return Err(Error::KindMismatch);
        }

        self.insert(CatalogEntry::new(metadata)).await
    }

    pub async fn get(&self, id: Uuid) -> Result<CatalogEntry> {
        sqlx::query_as::<_, EntryRow>("SELECT * FROM entries WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound)?
            .try_into()
    }

    pub async fn get_by_external_id(&self, id: ExternalId) -> Result<Option<CatalogEntry>> {
        sqlx::query_as::<_, EntryRow>("SELECT * FROM entries WHERE kind = ? AND tmdb_id = ?")
            .bind(id.kind.as_str())
            .bind(id.tmdb_id)
            .fetch_optional(&self.pool)
            .await?
            .map(CatalogEntry::try_from)
            .transpose()
    }

    /// Every entry in insertion order.
    pub async fn list_all(&self) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>("SELECT * FROM entries ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(CatalogEntry::try_from).collect()
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Entries matching `settings`, sorted by `sorting`.
    pub async fn fetch(
        &self,
        settings: &FilterSettings,
        sorting: SortingOrder,
    ) -> Result<Vec<CatalogEntry>> {
        let predicate = filter::sql::predicate(settings);
        let query = format!(
            "SELECT * FROM entries{} ORDER BY rowid",
            predicate.where_clause()
        );

        let mut q = sqlx::query_as::<_, EntryRow>(&query);
        for value in predicate.into_binds() {
            q = match value {
                SqlValue::Int(v) => q.bind(v),
                SqlValue::Text(v) => q.bind(v),
            };
        }

        let rows = q.fetch_all(&self.pool).await?;
        let entries = rows
            .into_iter()
            .map(CatalogEntry::try_from)
            .collect::<Result<Vec<_>>>()?;
        // The in-memory engine has the final say over the SQL prefilter.
        let mut entries = filter::apply(entries, settings);
        sort_entries(&mut entries, sorting);
        Ok(entries)
    }

    pub async fn fetch_preset(&self, preset: Preset) -> Result<Vec<CatalogEntry>> {
        let query = format!(
            "SELECT * FROM entries WHERE {} ORDER BY rowid",
            preset.sql_clause()
        );
        let rows = sqlx::query_as::<_, EntryRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let entry = CatalogEntry::try_from(row)?;
            if preset.post_filter(&entry) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    pub async fn favorites(&self) -> Result<Vec<CatalogEntry>> {
        self.fetch_preset(Preset::Favorites).await
    }

    pub async fn watchlist(&self) -> Result<Vec<CatalogEntry>> {
        self.fetch_preset(Preset::Watchlist).await
    }

    pub async fn problems(&self) -> Result<Vec<CatalogEntry>> {
        self.fetch_preset(Preset::Problems).await
    }

    pub async fn new_seasons_available(&self) -> Result<Vec<CatalogEntry>> {
        self.fetch_preset(Preset::NewSeasonsAvailable).await
    }

    async fn write_personal(&self, entry: &CatalogEntry) -> Result<()> {
        let personal = PersonalColumns::from_entry(entry)?;

        sqlx::query(
            r#"
            UPDATE entries SET
                personal_rating = ?, watch_state = ?, watch_marker = ?, watched_season = ?,
                watch_again = ?, tags = ?, notes = ?, is_favorite = ?, is_on_watchlist = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(personal.rating)
        .bind(&personal.watch_state)
        .bind(personal.watch_marker)
        .bind(personal.watched_season)
        .bind(personal.watch_again)
        .bind(&personal.tags)
        .bind(&entry.personal.notes)
        .bind(entry.personal.is_favorite)
        .bind(entry.personal.is_on_watchlist)
        .bind(entry.updated_at.to_rfc3339())
        .bind(entry.id.to_string())
        .execute(&self.pool)
        .await?;

        self.publish(LibraryEvent::Updated(entry.id));
        Ok(())
    }

    /// Edits user-provided fields and returns the updated entry.
    pub async fn update_personal(&self, id: Uuid, update: PersonalUpdate) -> Result<CatalogEntry> {
        let mut entry = self.get(id).await?;
        update.apply_to(&mut entry.personal);
        entry.updated_at = Utc::now();

        self.write_personal(&entry).await?;
        Ok(entry)
    }

    pub async fn set_watch_state(
        &self,
        id: Uuid,
        state: Option<WatchState>,
    ) -> Result<CatalogEntry> {
        let mut entry = self.get(id).await?;
        entry.set_watch_state(state)?;
        entry.updated_at = Utc::now();

        self.write_personal(&entry).await?;
        Ok(entry)
    }

    /// Deletes an entry together with its thumbnail and list memberships.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM thumbnails WHERE entry_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM list_entries WHERE entry_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM entries WHERE id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }

        tx.commit().await?;
        self.publish(LibraryEvent::Deleted(id));
        Ok(())
    }

    /// Writes the metadata of every overlay entry in one transaction.
    ///
    /// User-provided columns are left alone, so edits made while a sync was running survive.
    /// Entries deleted in the meantime are skipped. Returns the number of rows written.
    pub async fn commit(&self, overlay: Overlay) -> Result<usize> {
        if overlay.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = Vec::with_capacity(overlay.len());

        for entry in overlay.entries() {
            let meta = MetadataColumns::from_entry(entry)?;
            let result = sqlx::query(
                r#"
                UPDATE entries SET
                    metadata = ?, title = ?, release_date = ?, release_year = ?, status = ?,
                    show_type = ?, season_count = ?, genres = ?, updated_at = ?
                WHERE id = ? AND kind = ?
                "#,
            )
            .bind(&meta.metadata)
            .bind(&meta.title)
            .bind(&meta.release_date)
            .bind(meta.release_year)
            .bind(meta.status)
            .bind(meta.show_type)
            .bind(meta.season_count)
            .bind(&meta.genres)
            .bind(entry.updated_at.to_rfc3339())
            .bind(entry.id.to_string())
            .bind(entry.kind().as_str())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                debug!(entry_id = %entry.id, "entry disappeared before commit, skipping");
                continue;
            }
            written.push(entry.id);
        }

        tx.commit().await?;

        let count = written.len();
        self.publish(LibraryEvent::Refreshed(written));
        Ok(count)
    }

    /// Caches a thumbnail. Without `overwrite` an existing thumbnail is kept.
    /// Returns whether anything was written.
    pub async fn store_thumbnail(&self, id: Uuid, data: &[u8], overwrite: bool) -> Result<bool> {
        let query = if overwrite {
            "INSERT INTO thumbnails (entry_id, data, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(entry_id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at"
        } else {
            "INSERT OR IGNORE INTO thumbnails (entry_id, data, updated_at) VALUES (?, ?, ?)"
        };

        let result = sqlx::query(query)
            .bind(id.to_string())
            .bind(data)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn thumbnail(&self, id: Uuid) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT data FROM thumbnails WHERE entry_id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(data,)| data))
    }

    /// Distinct tag names across the library, alphabetically.
    pub async fn all_tags(&self) -> Result<Vec<String>> {
        let tags = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT json_each.value FROM entries, json_each(entries.tags) ORDER BY 1",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tags)
    }
}
