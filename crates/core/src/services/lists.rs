use chrono::Utc;
use uuid::Uuid;

use crate::db::DbPool;
use crate::models::{
    CatalogEntry, CreateList, EntryRow, ListKind, MediaList, MediaListRow, UpdateList,
};
use crate::services::LibraryService;
use crate::{Error, Result};

/// Custom lists with explicit members, and dynamic lists backed by a saved filter.
pub struct ListService {
    pool: DbPool,
    library: LibraryService,
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("list name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

impl ListService {
    pub fn new(pool: DbPool, library: LibraryService) -> Self {
        Self { pool, library }
    }

    pub async fn create(&self, input: CreateList) -> Result<MediaList> {
        let name = validate_name(&input.name)?;
        let id = Uuid::new_v4();
        let now = Utc::now();

        let (filter, sorting) = match &input.filter {
            Some(filter) => (
                Some(serde_json::to_string(filter)?),
                Some(serde_json::to_string(&input.sorting)?),
            ),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO lists (id, name, filter, sorting, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&name)
        .bind(filter)
        .bind(sorting)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<MediaList> {
        sqlx::query_as::<_, MediaListRow>("SELECT * FROM lists WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound)?
            .try_into()
    }

    pub async fn list(&self) -> Result<Vec<MediaList>> {
        let rows = sqlx::query_as::<_, MediaListRow>("SELECT * FROM lists ORDER BY name, rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(MediaList::try_from).collect()
    }

    pub async fn update(&self, id: Uuid, input: UpdateList) -> Result<MediaList> {
        let mut list = self.get(id).await?;

        if let Some(ref name) = input.name {
            list.name = validate_name(name)?;
        }

        match &mut list.kind {
            ListKind::Custom => {
                if input.filter.is_some() || input.sorting.is_some() {
                    return Err(Error::Validation(
                        "custom lists have no filter or sorting".to_string(),
                    ));
                }
            }
            ListKind::Dynamic { filter, sorting } => {
                if let Some(new_filter) = input.filter {
                    *filter = new_filter;
                }
                if let Some(new_sorting) = input.sorting {
                    *sorting = new_sorting;
                }
            }
        }

        let (filter, sorting) = match &list.kind {
            ListKind::Custom => (None, None),
            ListKind::Dynamic { filter, sorting } => (
                Some(serde_json::to_string(filter)?),
                Some(serde_json::to_string(sorting)?),
            ),
        };

        sqlx::query("UPDATE lists SET name = ?, filter = ?, sorting = ?, updated_at = ? WHERE id = ?")
            .bind(&list.name)
            .bind(filter)
            .bind(sorting)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        self.get(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM list_entries WHERE list_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM lists WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Appends an entry to a custom list. Adding a member twice is a no-op.
    pub async fn add_entry(&self, list_id: Uuid, entry_id: Uuid) -> Result<()> {
        let list = self.get(list_id).await?;
        if list.is_dynamic() {
            return Err(Error::Validation(
                "entries of a dynamic list come from its filter".to_string(),
            ));
        }
        // Verify the entry exists
        let _ = self.library.get(entry_id).await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO list_entries (list_id, entry_id, position)
            VALUES (?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM list_entries WHERE list_id = ?))
            "#,
        )
        .bind(list_id.to_string())
        .bind(entry_id.to_string())
        .bind(list_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn remove_entry(&self, list_id: Uuid, entry_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM list_entries WHERE list_id = ? AND entry_id = ?")
            .bind(list_id.to_string())
            .bind(entry_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }

        Ok(())
    }

    /// Members of a list: insertion order for custom lists, the saved filter and sorting for
    /// dynamic ones.
    pub async fn entries(&self, list_id: Uuid) -> Result<Vec<CatalogEntry>> {
        let list = self.get(list_id).await?;

        match list.kind {
            ListKind::Dynamic { filter, sorting } => self.library.fetch(&filter, sorting).await,
            ListKind::Custom => {
                let rows = sqlx::query_as::<_, EntryRow>(
                    r#"
                    SELECT e.* FROM entries e
                    JOIN list_entries le ON le.entry_id = e.id
                    WHERE le.list_id = ?
                    ORDER BY le.position
                    "#,
                )
                .bind(list_id.to_string())
                .fetch_all(&self.pool)
                .await?;

                rows.into_iter().map(CatalogEntry::try_from).collect()
            }
        }
    }
}
