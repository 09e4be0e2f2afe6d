use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FilterSettings, SortingOrder};

/// A user-defined list. Custom lists hold explicit members; dynamic lists are saved filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaList {
    pub id: Uuid,
    pub name: String,
    pub kind: ListKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ListKind {
    Custom,
    Dynamic {
        filter: FilterSettings,
        sorting: SortingOrder,
    },
}

impl MediaList {
    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, ListKind::Dynamic { .. })
    }
}

/// Database row for the `lists` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediaListRow {
    pub id: String,
    pub name: String,
    pub filter: Option<String>,
    pub sorting: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MediaListRow> for MediaList {
    type Error = crate::Error;

    fn try_from(row: MediaListRow) -> Result<Self, Self::Error> {
        let kind = match row.filter {
            Some(filter) => ListKind::Dynamic {
                filter: serde_json::from_str(&filter)?,
                sorting: row
                    .sorting
                    .as_deref()
                    .map(serde_json::from_str::<SortingOrder>)
                    .transpose()?
                    .unwrap_or_default(),
            },
            None => ListKind::Custom,
        };

        Ok(Self {
            id: Uuid::parse_str(&row.id).map_err(|e| crate::Error::Decode(e.to_string()))?,
            name: row.name,
            kind,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateList {
    pub name: String,
    /// `Some` creates a dynamic list.
    pub filter: Option<FilterSettings>,
    #[serde(default)]
    pub sorting: SortingOrder,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateList {
    pub name: Option<String>,
    /// Only applies to dynamic lists.
    pub filter: Option<FilterSettings>,
    pub sorting: Option<SortingOrder>,
}
