use thiserror::Error;

use crate::{
    config::ConfigError,
    sync::{orchestrator::SyncState, paginator::PageFailure},
    types::ArtistSource,
};

/// Reasons a sync pass ends without a snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("sync cancelled")]
    Cancelled,

    #[error("authentication failed, re-authenticate and restart: {0}")]
    Unauthorized(String),

    #[error("artist discovery from {origin} failed: {failure}")]
    Discovery {
        origin: ArtistSource,
        failure: PageFailure,
    },

    #[error("{failed} of {total} artists failed, above the threshold of {threshold}")]
    FailureThreshold {
        failed: usize,
        total: usize,
        threshold: f64,
    },

    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: SyncState, to: SyncState },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("sync task aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
