//! # Synchronization Engine
//!
//! Pulls the artist set and every artist's releases from the remote API and
//! folds them into one [`SyncSnapshot`](crate::types::SyncSnapshot).
//!
//! ```text
//! SyncOrchestrator   state machine, aggregation, progress
//!        ↓
//! Paginator          cursor walking, fetch-ahead, page resubmission
//!        ↓
//! WorkerPool         bounded concurrency over shared queues
//!        ↓
//! FetchClient        retries, backoff, Retry-After, outcome typing
//!        ↓
//! Transport          one HTTP exchange (reqwest)
//! ```
//!
//! Results travel back up unchanged until the orchestrator aggregates them.
//! Cancellation is cooperative: one token fans out from the orchestrator to
//! every descriptor and is observed at dequeue time, at retry waits and
//! between pagination steps.

pub mod client;
pub mod credential;
pub mod error;
pub mod orchestrator;
pub mod paginator;
pub mod pool;
pub mod request;

pub use client::{FetchClient, RawResponse, ReqwestTransport, RetryPolicy, Transport, TransportError};
pub use credential::{Credential, CredentialError, CredentialProvider, StaticCredential};
pub use error::SyncError;
pub use orchestrator::{Progress, SyncEvent, SyncHandle, SyncOrchestrator, SyncState};
pub use paginator::{
    FailureReason, PageEvent, PageFailure, PageSequence, PageSource, Paginator, paginate_all,
};
pub use pool::{Completion, Ticket, WorkerPool};
pub use request::{Outcome, Page, RequestDescriptor};
