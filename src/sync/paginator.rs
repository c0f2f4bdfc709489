use std::{
    collections::{HashMap, HashSet, VecDeque},
    hash::Hash,
    sync::Arc,
};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::sync::{
    pool::{Ticket, WorkerPool},
    request::{Outcome, Page, RequestDescriptor},
};

/// A paginated collection: how to ask for a page and how to read one.
pub trait PageSource: Send + Sync {
    /// Builds the request for `cursor`; `None` asks for the first page.
    fn request(&self, cursor: Option<&str>) -> RequestDescriptor;

    /// Turns a successful payload into a page.
    fn decode(&self, payload: Value) -> Result<Page, String>;
}

/// Why a stream stopped before exhaustion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureReason {
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("transient error (status {status:?})")]
    Transient { status: Option<u16> },

    #[error("status {status}: {message}")]
    Fatal { status: u16, message: String },

    #[error("undecodable page: {0}")]
    Decode(String),

    #[error("cancelled")]
    Cancelled,
}

impl FailureReason {
    fn from_outcome(outcome: Outcome) -> Option<Self> {
        match outcome {
            Outcome::Success(_) => None,
            Outcome::RateLimited { retry_after_secs } => {
                Some(FailureReason::RateLimited { retry_after_secs })
            }
            Outcome::TransientError { status } => Some(FailureReason::Transient { status }),
            Outcome::FatalError { status, message } => {
                Some(FailureReason::Fatal { status, message })
            }
            Outcome::Cancelled => Some(FailureReason::Cancelled),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureReason::RateLimited { .. } | FailureReason::Transient { .. }
        )
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, FailureReason::Fatal { status: 401, .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FailureReason::Cancelled)
    }
}

/// A stream failure, tagged with the cursor whose page could not be fetched.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("page at cursor {} failed: {reason}", .cursor.as_deref().unwrap_or("<first>"))]
pub struct PageFailure {
    pub cursor: Option<String>,
    pub reason: FailureReason,
}

/// What [`Paginator::next`] yields.
#[derive(Debug, Clone)]
pub enum PageEvent<K> {
    /// A page of stream `key`; `cursor` is the one the page was requested with.
    Page {
        key: K,
        cursor: Option<String>,
        page: Page,
    },
    /// Stream `key` is exhausted. Always follows its last page.
    Finished { key: K },
    /// Stream `key` stopped early. Pages already yielded stay valid.
    Failed { key: K, failure: PageFailure },
}

struct Stream {
    source: Arc<dyn PageSource>,
    cursor: Option<String>,
    seen: HashSet<String>,
    resubmits: u32,
}

/// Walks any number of keyed paginated collections over one shared pool.
///
/// Each stream has at most one request in flight. When a page arrives and
/// carries a next cursor, the follow-up request is submitted before the page is
/// handed to the caller, so fetching overlaps with processing while pages of one
/// stream still arrive in cursor order. Across streams there is no ordering.
///
/// Retryable outcomes (`RateLimited`, `TransientError`) are resubmitted for the
/// same cursor up to `max_resubmits` times. Anything else ends the stream with
/// [`PageEvent::Failed`]. A cursor the stream has already followed ends it as
/// exhausted.
pub struct Paginator<K> {
    streams: HashMap<K, Stream>,
    in_flight: HashMap<Ticket, K>,
    ready: VecDeque<PageEvent<K>>,
    max_resubmits: u32,
}

impl<K> Paginator<K>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    pub fn new(max_resubmits: u32) -> Self {
        Self {
            streams: HashMap::new(),
            in_flight: HashMap::new(),
            ready: VecDeque::new(),
            max_resubmits,
        }
    }

    /// Number of streams that have not finished or failed.
    pub fn active(&self) -> usize {
        self.streams.len()
    }

    /// Starts stream `key` by submitting its first request.
    ///
    /// A key that is already active is left untouched.
    pub fn start(&mut self, pool: &mut WorkerPool, key: K, source: Arc<dyn PageSource>) {
        if self.streams.contains_key(&key) {
            warn!(?key, "stream already active, ignoring start");
            return;
        }

        let ticket = pool.submit(source.request(None));
        self.in_flight.insert(ticket, key.clone());
        self.streams.insert(
            key,
            Stream {
                source,
                cursor: None,
                seen: HashSet::new(),
                resubmits: 0,
            },
        );
    }

    /// Waits for the next event of any stream.
    ///
    /// Returns `None` once every stream has finished or failed.
    pub async fn next(&mut self, pool: &mut WorkerPool) -> Option<PageEvent<K>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }
            if self.in_flight.is_empty() {
                return None;
            }

            let completion = pool.next_completion().await?;
            let Some(key) = self.in_flight.remove(&completion.ticket) else {
                debug!(ticket = ?completion.ticket, "completion for unknown ticket");
                continue;
            };

            if let Some(event) = self.advance(pool, key, completion.outcome) {
                return Some(event);
            }
        }
    }

    fn advance(&mut self, pool: &mut WorkerPool, key: K, outcome: Outcome) -> Option<PageEvent<K>> {
        let stream = self.streams.get_mut(&key)?;

        let reason = match outcome {
            Outcome::Success(payload) => match stream.source.decode(payload) {
                Ok(page) => {
                    stream.resubmits = 0;
                    let cursor = stream.cursor.clone();

                    let follow = match page.next_cursor() {
                        Some(next) if stream.seen.insert(next.to_string()) => Some(next.to_string()),
                        Some(next) => {
                            warn!(?key, cursor = next, "cursor repeated, treating stream as exhausted");
                            None
                        }
                        None => None,
                    };

                    match follow {
                        Some(next) => {
                            let ticket = pool.submit(stream.source.request(Some(&next)));
                            stream.cursor = Some(next);
                            self.in_flight.insert(ticket, key.clone());
                        }
                        None => {
                            self.streams.remove(&key);
                            self.ready.push_back(PageEvent::Finished { key: key.clone() });
                        }
                    }

                    return Some(PageEvent::Page { key, cursor, page });
                }
                Err(message) => FailureReason::Decode(message),
            },
            other => FailureReason::from_outcome(other)?,
        };

        if reason.is_retryable() && stream.resubmits < self.max_resubmits && !pool.is_cancelled() {
            stream.resubmits += 1;
            debug!(?key, cursor = ?stream.cursor, %reason, resubmit = stream.resubmits, "resubmitting page");
            let ticket = pool.submit(stream.source.request(stream.cursor.as_deref()));
            self.in_flight.insert(ticket, key);
            return None;
        }

        let stream = self.streams.remove(&key)?;
        Some(PageEvent::Failed {
            key,
            failure: PageFailure {
                cursor: stream.cursor,
                reason,
            },
        })
    }
}

/// Lazy page sequence over a single collection, see [`paginate_all`].
pub struct PageSequence<'a> {
    paginator: Paginator<()>,
    pool: &'a mut WorkerPool,
}

impl PageSequence<'_> {
    /// Next page in cursor order, the failure that ended the walk, or `None` when exhausted.
    pub async fn next(&mut self) -> Option<Result<Page, PageFailure>> {
        loop {
            match self.paginator.next(self.pool).await? {
                PageEvent::Page { page, .. } => return Some(Ok(page)),
                PageEvent::Finished { .. } => continue,
                PageEvent::Failed { failure, .. } => return Some(Err(failure)),
            }
        }
    }

    /// Drains the sequence, stopping at the first failure.
    pub async fn collect(mut self) -> Result<Vec<Page>, PageFailure> {
        let mut pages = Vec::new();
        while let Some(page) = self.next().await {
            pages.push(page?);
        }
        Ok(pages)
    }
}

/// Walks one paginated collection end to end on `pool`.
///
/// # Example
///
/// ```rust,ignore
/// let mut pages = paginate_all(Arc::new(FollowedArtists::new(50)), &mut pool, 1);
/// while let Some(page) = pages.next().await {
///     let page = page?;
///     println!("{} artists", page.items.len());
/// }
/// ```
pub fn paginate_all(
    source: Arc<dyn PageSource>,
    pool: &mut WorkerPool,
    max_resubmits: u32,
) -> PageSequence<'_> {
    let mut paginator = Paginator::new(max_resubmits);
    paginator.start(pool, (), source);
    PageSequence { paginator, pool }
}
