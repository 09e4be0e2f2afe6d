use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinelog_core::{
    Config, Error,
    db::create_pool,
    models::{ExternalId, SettingKey},
    services::{
        LibraryService, LibrarySynchronizer, MetadataSource, SettingsService, SyncOptions,
        TmdbService,
    },
};

#[derive(Parser)]
#[command(author, version, about = "Keeps a cinelog library in sync with TMDB", long_about = None)]
struct Cli {
    /// Override SYNC_CONCURRENCY
    #[arg(short, long)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh titles that changed since the last sync
    Update,
    /// Refresh every title in the library
    ReloadAll,
    /// Run an update every interval until interrupted
    Watch {
        /// Seconds between cycles, overrides SYNC_INTERVAL_SECS
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Add a title to the library
    Add {
        /// TMDB id of the title
        tmdb_id: i64,
        /// Treat the id as a TV show instead of a movie
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file early for environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cinelog_sync=debug,cinelog_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    let pool = create_pool(&config.database_url).await?;
    info!("Database connected");

    let settings = Arc::new(SettingsService::new(pool.clone()));
    let library = Arc::new(LibraryService::new(pool));

    // Env var has priority, then database, then config default
    let tmdb_api_key = settings
        .get(SettingKey::TmdbApiKey)
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| config.tmdb_api_key.clone());
    let source: Arc<dyn MetadataSource> = Arc::new(TmdbService::from_config(&config, tmdb_api_key)?);

    let mut options = SyncOptions::from(&config);
    if let Some(concurrency) = cli.concurrency {
        options.concurrency = concurrency.max(1);
    }
    let synchronizer = LibrarySynchronizer::new(
        Arc::clone(&library),
        settings,
        Arc::clone(&source),
        options,
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    match cli.command {
        Command::Update => {
            let updated = synchronizer.update(&cancel).await?;
            info!("Updated {} entries", updated);
        }
        Command::ReloadAll => {
            let outcome = synchronizer.reload_all(&cancel).await?;
            for failure in &outcome.failures {
                warn!(
                    "Entry {} (tmdb {}) failed: {}",
                    failure.entry_id, failure.tmdb_id, failure.error
                );
            }
            info!(
                "Reloaded {} entries, {} failed",
                outcome.refreshed,
                outcome.failures.len()
            );
            let thumbnails = outcome.thumbnails.await?;
            info!("Replaced {} thumbnails", thumbnails);
        }
        Command::Watch { interval: seconds } => {
            let period = seconds
                .map(|s| Duration::from_secs(s.max(60)))
                .unwrap_or_else(|| config.sync_interval());
            run_periodic(&synchronizer, period, &cancel).await;
        }
        Command::Add { tmdb_id, show } => {
            let id = if show {
                ExternalId::show(tmdb_id)
            } else {
                ExternalId::movie(tmdb_id)
            };
            match library.add_from_source(source.as_ref(), id).await {
                Ok(entry) => info!("Added {} '{}' ({})", entry.kind(), entry.title(), entry.id),
                Err(Error::AlreadyExists { kind, tmdb_id }) => {
                    warn!("{} {} is already in the library", kind, tmdb_id)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

async fn run_periodic(
    synchronizer: &LibrarySynchronizer,
    period: Duration,
    cancel: &CancellationToken,
) {
    let mut interval = interval(period);
    info!("Syncing every {:?}", period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        match synchronizer.update(cancel).await {
            Ok(updated) => info!("Update cycle finished, {} entries updated", updated),
            Err(e) if e.is_cancelled() => break,
            Err(e) => error!("Update cycle failed: {}", e),
        }
    }

    info!("Stopped periodic sync");
}
