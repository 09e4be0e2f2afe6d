use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashSet;

use crate::error::Result;
use crate::models::{ExternalId, Metadata};

/// Longest window the change feed accepts in a single request.
pub fn max_change_window() -> TimeDelta {
    TimeDelta::days(14)
}

/// Remote service that owns title metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Ids of titles whose metadata changed in `[since, until]`.
    async fn changed_ids(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<HashSet<ExternalId>>;

    /// Full metadata for one title.
    async fn fetch_metadata(&self, id: ExternalId) -> Result<Metadata>;

    /// Poster image bytes for a poster path from [`Metadata`].
    async fn fetch_thumbnail(&self, poster_path: &str) -> Result<Vec<u8>>;
}
