use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Table;
use tokio_util::sync::CancellationToken;

use crate::{
    config::SyncConfig,
    error, info,
    management::{SnapshotStore, TokenManager},
    success,
    sync::{FetchClient, SyncError, SyncEvent, SyncOrchestrator, SyncState},
    types::{ArtistSource, ReleaseKinds},
    utils, warning,
};

/// Command-line overrides applied on top of the environment configuration.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub sources: Vec<ArtistSource>,
    pub concurrency: Option<usize>,
    pub extra: bool,
    pub release_types: Option<ReleaseKinds>,
}

impl SyncOptions {
    pub fn apply(self, config: &mut SyncConfig) {
        if !self.sources.is_empty() {
            config.artist_sources = self.sources;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if self.extra {
            config.fetch_extra_data = true;
        }
        if let Some(release_types) = self.release_types {
            config.release_types = release_types;
        }
    }
}

/// Runs one synchronization pass with a progress bar.
///
/// Ctrl-C cancels the pass cooperatively. Only a completed pass replaces the
/// stored snapshot.
pub async fn sync(options: SyncOptions) {
    let mut config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => error!("Invalid configuration. Err: {}", e),
    };
    options.apply(&mut config);
    if let Err(e) = config.validate() {
        error!("Invalid configuration. Err: {}", e);
    }

    let token_mgr = match TokenManager::load().await {
        Ok(manager) => manager,
        Err(e) => error!(
            "Failed to load token. Place a valid token in the cache first.\n Error: {}",
            e
        ),
    };

    let client = match FetchClient::from_config(&config, Arc::new(token_mgr)) {
        Ok(client) => client,
        Err(e) => error!("Cannot create HTTP client. Err: {}", e),
    };

    let mut handle = SyncOrchestrator::new(config, Arc::new(client)).spawn(CancellationToken::new());

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let pb = progress_bar();
    while let Some(event) = handle.next_event().await {
        match event {
            SyncEvent::Progress(progress) => {
                pb.set_length(progress.estimated_total);
                pb.set_position(progress.processed);
                pb.set_message(state_label(progress.state));
            }
            _ => break,
        }
    }
    pb.finish_and_clear();

    let snapshot = match handle.join().await {
        Ok(snapshot) => snapshot,
        Err(SyncError::Cancelled) => {
            warning!("Sync cancelled. The previous snapshot was kept.");
            return;
        }
        Err(e) => error!("Sync failed. Err: {}", e),
    };

    let store = SnapshotStore::new();
    if let Err(e) = store.persist(&snapshot).await {
        error!("Cannot store snapshot. Err: {}", e);
    }
    info!("Snapshot stored at {}", store.path().display());

    success!(
        "Synchronized {} artists and {} releases.",
        snapshot.artist_count(),
        snapshot.album_count()
    );

    if !snapshot.failures().is_empty() {
        warning!(
            "Releases of {} artists could not be fetched completely:",
            snapshot.failures().len()
        );
        println!("{}", Table::new(utils::failure_rows(&snapshot)));
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{spinner:.blue} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        .progress_chars("=> ");
    pb.set_style(style);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn state_label(state: SyncState) -> &'static str {
    match state {
        SyncState::Idle => "Starting...",
        SyncState::DiscoveringArtists => "Discovering artists...",
        SyncState::FetchingReleases => "Fetching releases...",
        SyncState::FetchingExtraData => "Fetching album details...",
        SyncState::Aggregating => "Aggregating...",
        SyncState::Completed => "Done",
        SyncState::Failed => "Failed",
        SyncState::Cancelled => "Cancelled",
    }
}
