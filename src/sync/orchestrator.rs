//! # Sync Orchestrator
//!
//! Top level state machine of a synchronization pass.
//!
//! ## States
//!
//! ```text
//! Idle → DiscoveringArtists → FetchingReleases → [FetchingExtraData] → Aggregating → Completed
//!              └──────────────────┴───────────────────┴───────────────────┴──→ Failed
//! any non-terminal state ──→ Cancelled
//! ```
//!
//! ## Failure Policy
//!
//! - **Discovery** - any failing source stream fails the pass, there is no
//!   artist set to work with otherwise
//! - **Releases** - a failing artist is recorded in the snapshot and the pass
//!   goes on, unless the failed fraction of artists exceeds the configured
//!   threshold
//! - **Extra data** - a failing batch leaves its albums without details
//! - **Authentication** - a 401 or an expired credential fails the pass at once
//!
//! All pages of one pass share a single [`WorkerPool`], so the configured
//! concurrency bounds the whole pass, not each artist.

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::SyncConfig,
    spotify,
    sync::{
        client::FetchClient,
        error::{Result, SyncError},
        paginator::{FailureReason, PageEvent, PageFailure, Paginator},
        pool::WorkerPool,
    },
    types::{AlbumRecord, ArtistFailure, ArtistRecord, SyncSnapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Idle,
    DiscoveringArtists,
    FetchingReleases,
    FetchingExtraData,
    Aggregating,
    Completed,
    Failed,
    Cancelled,
}

impl SyncState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SyncState::Completed | SyncState::Failed | SyncState::Cancelled
        )
    }

    pub fn can_transition_to(self, next: SyncState) -> bool {
        use SyncState::*;

        match (self, next) {
            (Idle, DiscoveringArtists)
            | (DiscoveringArtists, FetchingReleases)
            | (FetchingReleases, FetchingExtraData)
            | (FetchingReleases, Aggregating)
            | (FetchingExtraData, Aggregating)
            | (Aggregating, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            (from, Failed) => from != Idle && !from.is_terminal(),
            _ => false,
        }
    }
}

/// Items processed so far against a best-effort estimate of the total.
///
/// `processed` never decreases during a pass. `estimated_total` grows as page
/// totals become known and is never below `processed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: u64,
    pub estimated_total: u64,
    pub state: SyncState,
}

#[derive(Debug, Clone)]
pub enum SyncEvent {
    Progress(Progress),
    Completed(Arc<SyncSnapshot>),
    Failed(SyncError),
    Cancelled,
}

impl SyncEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncEvent::Progress(_))
    }
}

/// A pass running in the background.
pub struct SyncHandle {
    events: mpsc::UnboundedReceiver<SyncEvent>,
    cancel: CancellationToken,
    task: JoinHandle<Result<Arc<SyncSnapshot>>>,
}

impl SyncHandle {
    /// Requests cooperative cancellation of the pass.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next progress or terminal event; `None` after the terminal event.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        self.events.recv().await
    }

    /// Waits for the pass to end.
    pub async fn join(self) -> Result<Arc<SyncSnapshot>> {
        self.task
            .await
            .map_err(|e| SyncError::Aborted(e.to_string()))?
    }
}

struct Pass {
    state: SyncState,
    processed: u64,
    estimated_total: u64,
    events: mpsc::UnboundedSender<SyncEvent>,
}

impl Pass {
    fn new(events: mpsc::UnboundedSender<SyncEvent>) -> Self {
        Self {
            state: SyncState::Idle,
            processed: 0,
            estimated_total: 0,
            events,
        }
    }

    fn transition(&mut self, next: SyncState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(SyncError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        info!(from = ?self.state, to = ?next, "sync state changed");
        self.state = next;
        self.report();
        Ok(())
    }

    /// Moves into a terminal state when the machine allows it.
    fn finish(&mut self, terminal: SyncState) {
        if self.state.can_transition_to(terminal) {
            info!(from = ?self.state, to = ?terminal, "sync state changed");
            self.state = terminal;
        }
    }

    fn estimate(&mut self, items: u64) {
        self.estimated_total += items;
    }

    fn advance(&mut self, items: u64) {
        self.processed += items;
        self.report();
    }

    fn report(&self) {
        if self.state.is_terminal() {
            return;
        }
        self.emit(SyncEvent::Progress(Progress {
            processed: self.processed,
            estimated_total: self.estimated_total.max(self.processed),
            state: self.state,
        }));
    }

    fn emit(&self, event: SyncEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }
}

/// In-progress result, owned by one pass and dropped unless the pass completes.
struct Aggregate {
    artists: BTreeMap<String, ArtistRecord>,
    albums: BTreeMap<String, AlbumRecord>,
    failures: Vec<ArtistFailure>,
}

impl Aggregate {
    fn new(artists: BTreeMap<String, ArtistRecord>) -> Self {
        Self {
            artists,
            albums: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    /// Last write wins for albums seen more than once.
    fn insert_album(&mut self, album: AlbumRecord) {
        if let Some(previous) = self.albums.insert(album.id.clone(), album) {
            debug!(album = %previous.id, "album seen again, keeping the latest");
        }
    }

    fn record_failure(&mut self, artist_id: &str, failure: &PageFailure) {
        let artist_name = self
            .artists
            .get(artist_id)
            .map(|a| a.name.clone())
            .unwrap_or_default();
        self.failures.push(ArtistFailure {
            artist_id: artist_id.to_string(),
            artist_name,
            cursor: failure.cursor.clone(),
            reason: failure.reason.to_string(),
        });
    }

    fn into_snapshot(self) -> SyncSnapshot {
        SyncSnapshot::from_parts(Utc::now(), self.artists, self.albums, self.failures)
    }
}

/// Drives synchronization passes.
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = SyncOrchestrator::new(config, Arc::new(client));
/// let mut handle = orchestrator.spawn(CancellationToken::new());
/// while let Some(event) = handle.next_event().await {
///     if let SyncEvent::Progress(p) = event {
///         println!("{}/{} ({:?})", p.processed, p.estimated_total, p.state);
///     }
/// }
/// let snapshot = handle.join().await?;
/// ```
pub struct SyncOrchestrator {
    config: SyncConfig,
    client: Arc<FetchClient>,
}

impl SyncOrchestrator {
    pub fn new(config: SyncConfig, client: Arc<FetchClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs one pass on the tokio runtime.
    pub fn spawn(self, cancel: CancellationToken) -> SyncHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move { self.run(task_cancel, tx).await });

        SyncHandle {
            events: rx,
            cancel,
            task,
        }
    }

    /// Runs one pass to its end.
    ///
    /// Progress events go to `events`, followed by exactly one terminal event
    /// matching the returned result.
    pub async fn run(
        &self,
        cancel: CancellationToken,
        events: mpsc::UnboundedSender<SyncEvent>,
    ) -> Result<Arc<SyncSnapshot>> {
        let mut pass = Pass::new(events);
        let result = self.execute(&mut pass, &cancel).await;

        match &result {
            Ok(snapshot) => {
                info!(
                    artists = snapshot.artist_count(),
                    albums = snapshot.album_count(),
                    failures = snapshot.failures().len(),
                    "sync completed"
                );
                pass.emit(SyncEvent::Completed(Arc::clone(snapshot)));
            }
            Err(SyncError::Cancelled) => {
                pass.finish(SyncState::Cancelled);
                pass.emit(SyncEvent::Cancelled);
            }
            Err(err) => {
                warn!(error = %err, "sync failed");
                pass.finish(SyncState::Failed);
                pass.emit(SyncEvent::Failed(err.clone()));
            }
        }

        result
    }

    async fn execute(&self, pass: &mut Pass, cancel: &CancellationToken) -> Result<Arc<SyncSnapshot>> {
        self.config.validate()?;
        checkpoint(cancel)?;

        let mut pool = WorkerPool::new(
            self.config.concurrency,
            Arc::clone(&self.client),
            cancel.child_token(),
        );
        let result = self.drive(pass, &mut pool, cancel).await;
        if result.is_err() {
            pool.cancel();
        }
        pool.shutdown().await;

        result
    }

    async fn drive(
        &self,
        pass: &mut Pass,
        pool: &mut WorkerPool,
        cancel: &CancellationToken,
    ) -> Result<Arc<SyncSnapshot>> {
        pass.transition(SyncState::DiscoveringArtists)?;
        let artists = self.discover_artists(pass, pool, cancel).await?;
        info!(artists = artists.len(), "artist discovery finished");

        pass.transition(SyncState::FetchingReleases)?;
        let mut aggregate = Aggregate::new(artists);
        self.fetch_releases(pass, pool, cancel, &mut aggregate).await?;

        if self.config.fetch_extra_data {
            pass.transition(SyncState::FetchingExtraData)?;
            self.fetch_extra_data(pass, pool, cancel, &mut aggregate)
                .await?;
        }

        checkpoint(cancel)?;
        pass.transition(SyncState::Aggregating)?;
        let snapshot = aggregate.into_snapshot();
        pass.transition(SyncState::Completed)?;

        Ok(Arc::new(snapshot))
    }

    async fn discover_artists(
        &self,
        pass: &mut Pass,
        pool: &mut WorkerPool,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, ArtistRecord>> {
        let mut paginator = Paginator::new(self.config.page_resubmits);
        for &source in &self.config.artist_sources {
            paginator.start(
                pool,
                source,
                spotify::artists::page_source(source, self.config.page_limit),
            );
        }

        let mut artists: BTreeMap<String, ArtistRecord> = BTreeMap::new();
        while let Some(event) = paginator.next(pool).await {
            checkpoint(cancel)?;

            match event {
                PageEvent::Page { key, cursor, page } => {
                    if cursor.is_none() {
                        pass.estimate(page.total.unwrap_or(0));
                    }
                    let count = page.items.len() as u64;
                    for item in page.items {
                        let found = match spotify::artists::artists_from_item(key, item) {
                            Ok(found) => found,
                            Err(err) => {
                                warn!(source = %key, error = %err, "skipping malformed artist item");
                                continue;
                            }
                        };
                        for artist in found {
                            match artists.get_mut(&artist.id) {
                                Some(existing) => existing.merge(artist),
                                None => {
                                    artists.insert(artist.id.clone(), artist);
                                }
                            }
                        }
                    }
                    pass.advance(count);
                }
                PageEvent::Finished { key } => debug!(source = %key, "artist source exhausted"),
                PageEvent::Failed { key, failure } => {
                    return Err(match escalate(&failure) {
                        Some(err) => err,
                        None => SyncError::Discovery {
                            origin: key,
                            failure,
                        },
                    });
                }
            }
        }

        Ok(artists)
    }

    async fn fetch_releases(
        &self,
        pass: &mut Pass,
        pool: &mut WorkerPool,
        cancel: &CancellationToken,
        aggregate: &mut Aggregate,
    ) -> Result<()> {
        let total = aggregate.artists.len();
        if total == 0 {
            return Ok(());
        }

        let mut paginator = Paginator::new(self.config.page_resubmits);
        for artist_id in aggregate.artists.keys() {
            paginator.start(
                pool,
                artist_id.clone(),
                spotify::releases::artist_albums(
                    artist_id,
                    &self.config.release_types,
                    self.config.page_limit,
                ),
            );
        }

        let mut failed = 0usize;
        while let Some(event) = paginator.next(pool).await {
            checkpoint(cancel)?;

            match event {
                PageEvent::Page { key, cursor, page } => {
                    if cursor.is_none() {
                        pass.estimate(page.total.unwrap_or(0));
                    }
                    let count = page.items.len() as u64;
                    for item in page.items {
                        match spotify::releases::album_from_item(&key, item) {
                            Ok(album) => aggregate.insert_album(album),
                            Err(err) => {
                                warn!(artist = %key, error = %err, "skipping malformed album item")
                            }
                        }
                    }
                    pass.advance(count);
                }
                PageEvent::Finished { key } => debug!(artist = %key, "releases complete"),
                PageEvent::Failed { key, failure } => {
                    if let Some(err) = escalate(&failure) {
                        return Err(err);
                    }

                    warn!(artist = %key, %failure, "releases of artist failed");
                    aggregate.record_failure(&key, &failure);
                    failed += 1;

                    let threshold = self.config.failure_threshold;
                    if failed as f64 / total as f64 > threshold {
                        return Err(SyncError::FailureThreshold {
                            failed,
                            total,
                            threshold,
                        });
                    }
                }
            }
        }

        Ok(())
    }

    async fn fetch_extra_data(
        &self,
        pass: &mut Pass,
        pool: &mut WorkerPool,
        cancel: &CancellationToken,
        aggregate: &mut Aggregate,
    ) -> Result<()> {
        let ids: Vec<String> = aggregate.albums.keys().cloned().collect();
        pass.estimate(ids.len() as u64);

        let mut paginator = Paginator::new(self.config.page_resubmits);
        for (batch, source) in spotify::releases::album_details(&ids).into_iter().enumerate() {
            paginator.start(pool, batch, source);
        }

        while let Some(event) = paginator.next(pool).await {
            checkpoint(cancel)?;

            match event {
                PageEvent::Page { page, .. } => {
                    let count = page.items.len() as u64;
                    for item in page.items {
                        match spotify::releases::album_extra_from_item(item) {
                            Ok((id, extra)) => match aggregate.albums.get_mut(&id) {
                                Some(album) => album.extra = Some(extra),
                                None => debug!(album = %id, "details for an album not collected"),
                            },
                            Err(err) => warn!(error = %err, "skipping malformed album details"),
                        }
                    }
                    pass.advance(count);
                }
                PageEvent::Finished { .. } => {}
                PageEvent::Failed { key, failure } => {
                    if let Some(err) = escalate(&failure) {
                        return Err(err);
                    }
                    warn!(batch = key, %failure, "album details batch failed, albums stay without details");
                }
            }
        }

        Ok(())
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

/// Failures that end the whole pass regardless of the phase.
fn escalate(failure: &PageFailure) -> Option<SyncError> {
    match &failure.reason {
        FailureReason::Cancelled => Some(SyncError::Cancelled),
        FailureReason::Fatal { message, .. } if failure.reason.is_auth() => {
            Some(SyncError::Unauthorized(message.clone()))
        }
        _ => None,
    }
}
