//! Refreshes library metadata from a [`MetadataSource`].
//!
//! Two cycles share the same fan-out machinery but differ in failure policy:
//! [`LibrarySynchronizer::update`] refreshes only titles the source reports as changed and is
//! all-or-nothing, while [`LibrarySynchronizer::reload_all`] refreshes every entry and commits
//! whatever succeeded. Both write into an [`Overlay`] first and commit it in one transaction, so
//! the store never sees a half-finished cycle. Only one cycle runs at a time.

use chrono::Utc;
use futures::{StreamExt, future, stream};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::CatalogEntry;
use crate::services::library::{LibraryService, Overlay};
use crate::services::settings::SettingsService;
use crate::services::source::{MetadataSource, max_change_window};

const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Upper bound on simultaneous requests against the source.
    pub concurrency: usize,
}

impl SyncOptions {
    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl From<&Config> for SyncOptions {
    fn from(config: &Config) -> Self {
        Self {
            concurrency: config.sync_concurrency.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    FetchingChangedIds,
    RefreshingEntries,
    Merging,
}

/// A single entry that could not be refreshed.
#[derive(Debug)]
pub struct EntryFailure {
    pub entry_id: Uuid,
    pub tmdb_id: i64,
    pub error: Error,
}

impl From<EntryFailure> for Error {
    fn from(failure: EntryFailure) -> Self {
        Error::EntryRefresh {
            entry_id: failure.entry_id,
            tmdb_id: failure.tmdb_id,
            source: Box::new(failure.error),
        }
    }
}

/// Result of a full reload.
#[derive(Debug)]
pub struct ReloadOutcome {
    pub refreshed: usize,
    pub failures: Vec<EntryFailure>,
    /// Detached thumbnail refresh; resolves to the number of thumbnails replaced.
    pub thumbnails: JoinHandle<usize>,
}

/// Puts the phase back to idle however the cycle ends.
struct PhaseReset<'a>(&'a watch::Sender<SyncPhase>);

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        self.0.send_replace(SyncPhase::Idle);
    }
}

async fn refresh_entry(
    source: Arc<dyn MetadataSource>,
    mut entry: CatalogEntry,
) -> std::result::Result<CatalogEntry, EntryFailure> {
    let entry_id = entry.id;
    let tmdb_id = entry.tmdb_id;
    let failure = |error| EntryFailure {
        entry_id,
        tmdb_id,
        error,
    };

    let metadata = source
        .fetch_metadata(entry.external_id())
        .await
        .map_err(failure)?;
    entry.apply_metadata(metadata).map_err(failure)?;

    debug!(entry_id = %entry_id, tmdb_id, "refreshed entry");
    Ok(entry)
}

pub struct LibrarySynchronizer {
    library: Arc<LibraryService>,
    settings: Arc<SettingsService>,
    source: Arc<dyn MetadataSource>,
    options: SyncOptions,
    cycle: Mutex<()>,
    phase: watch::Sender<SyncPhase>,
}

impl LibrarySynchronizer {
    pub fn new(
        library: Arc<LibraryService>,
        settings: Arc<SettingsService>,
        source: Arc<dyn MetadataSource>,
        options: SyncOptions,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            library,
            settings,
            source,
            options,
            cycle: Mutex::new(()),
            phase,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.phase.send_replace(phase);
    }

    /// Refreshes the entries the source reports as changed since the last sync.
    ///
    /// Any failure, including a single entry, aborts the cycle without committing anything and
    /// leaves the cursor where it was. Returns the number of entries written.
    #[instrument(skip_all, fields(source = self.source.name()))]
    pub async fn update(&self, cancel: &CancellationToken) -> Result<usize> {
        let _cycle = self.cycle.try_lock().map_err(|_| Error::SyncInProgress)?;
        let _reset = PhaseReset(&self.phase);

        let cursor = self.settings.sync_cursor().await?;
        let until = Utc::now();
        let since = cursor
            .last_synced_at
            .unwrap_or_else(|| until - max_change_window());

        self.set_phase(SyncPhase::FetchingChangedIds);
        let changed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            changed = self.source.changed_ids(since, until) => changed.inspect_err(|e| {
                error!(error = %e, "failed to fetch changed ids");
            })?,
        };
        let now = Utc::now();

        let entries: Vec<CatalogEntry> = self
            .library
            .list_all()
            .await?
            .into_iter()
            .filter(|entry| changed.contains(&entry.external_id()))
            .collect();
        debug!(
            changed = changed.len(),
            matched = entries.len(),
            "matched changed ids against library"
        );

        self.set_phase(SyncPhase::RefreshingEntries);
        let mut overlay = Overlay::new();
        {
            let mut refreshes = stream::iter(entries)
                .map(|entry| refresh_entry(Arc::clone(&self.source), entry))
                .buffer_unordered(self.options.concurrency());

            loop {
                tokio::select! {
                    biased;
                    next = refreshes.next() => match next {
                        Some(Ok(entry)) => overlay.insert(entry),
                        Some(Err(failure)) => {
                            error!(
                                entry_id = %failure.entry_id,
                                tmdb_id = failure.tmdb_id,
                                error = %failure.error,
                                "entry refresh failed, aborting update"
                            );
                            return Err(failure.into());
                        }
                        None => break,
                    },
                    _ = cancel.cancelled() => {
                        info!("update cancelled during refresh");
                        return Err(Error::Cancelled);
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            info!("update cancelled before merge");
            return Err(Error::Cancelled);
        }

        self.set_phase(SyncPhase::Merging);
        let count = self.library.commit(overlay).await?;
        self.settings.set_sync_cursor(now).await?;

        info!(updated = count, "update complete");
        Ok(count)
    }

    /// Refreshes every entry in the library.
    ///
    /// Entry failures are logged and reported in the outcome. Cancellation still commits what was
    /// refreshed so far and then returns [`Error::Cancelled`]. On success a thumbnail refresh runs
    /// in the background for every refreshed entry.
    #[instrument(skip_all, fields(source = self.source.name()))]
    pub async fn reload_all(&self, cancel: &CancellationToken) -> Result<ReloadOutcome> {
        let _cycle = self.cycle.try_lock().map_err(|_| Error::SyncInProgress)?;
        let _reset = PhaseReset(&self.phase);

        let entries = self.library.list_all().await?;
        let total = entries.len();

        self.set_phase(SyncPhase::RefreshingEntries);
        let mut overlay = Overlay::new();
        let mut failures = Vec::new();
        let mut cancelled = false;
        {
            let mut refreshes = stream::iter(entries)
                .map(|entry| refresh_entry(Arc::clone(&self.source), entry))
                .buffer_unordered(self.options.concurrency());

            loop {
                tokio::select! {
                    biased;
                    next = refreshes.next() => match next {
                        Some(Ok(entry)) => overlay.insert(entry),
                        Some(Err(failure)) => {
                            warn!(
                                entry_id = %failure.entry_id,
                                tmdb_id = failure.tmdb_id,
                                error = %failure.error,
                                "entry refresh failed, keeping previous metadata"
                            );
                            failures.push(failure);
                        }
                        None => break,
                    },
                    _ = cancel.cancelled() => {
                        cancelled = true;
                        break;
                    }
                }
            }
        }

        self.set_phase(SyncPhase::Merging);
        let thumbnail_targets: Vec<(Uuid, String)> = overlay
            .entries()
            .filter_map(|entry| {
                let path = entry.common.poster_path.clone()?;
                Some((entry.id, path))
            })
            .collect();
        let refreshed = self.library.commit(overlay).await?;

        if cancelled {
            info!(refreshed, total, "reload cancelled, committed partial results");
            return Err(Error::Cancelled);
        }

        info!(refreshed, failed = failures.len(), total, "reload complete");
        let thumbnails = self.spawn_thumbnail_refresh(thumbnail_targets);

        Ok(ReloadOutcome {
            refreshed,
            failures,
            thumbnails,
        })
    }

    /// Re-downloads and overwrites thumbnails. Failures are silent.
    fn spawn_thumbnail_refresh(&self, targets: Vec<(Uuid, String)>) -> JoinHandle<usize> {
        let library = Arc::clone(&self.library);
        let source = Arc::clone(&self.source);
        let concurrency = self.options.concurrency();

        tokio::spawn(async move {
            let replaced = stream::iter(targets)
                .map(|(entry_id, path)| {
                    let library = Arc::clone(&library);
                    let source = Arc::clone(&source);
                    async move {
                        let data = match source.fetch_thumbnail(&path).await {
                            Ok(data) => data,
                            Err(e) => {
                                debug!(entry_id = %entry_id, error = %e, "thumbnail fetch failed");
                                return false;
                            }
                        };
                        match library.store_thumbnail(entry_id, &data, true).await {
                            Ok(written) => written,
                            Err(e) => {
                                debug!(entry_id = %entry_id, error = %e, "thumbnail store failed");
                                false
                            }
                        }
                    }
                })
                .buffer_unordered(concurrency)
                .filter(|written| future::ready(*written))
                .count()
                .await;

            debug!(replaced, "thumbnail refresh complete");
            replaced
        })
    }
}
