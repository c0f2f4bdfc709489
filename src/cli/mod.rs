//! # CLI Module
//!
//! Command-line layer of relsync. Each command loads what it needs (config,
//! token, snapshot), delegates to the engine or the stores, and presents the
//! result with the crate's console macros and `tabled` tables.
//!
//! ## Commands
//!
//! - [`sync`] - Runs one synchronization pass and stores the snapshot
//! - [`list_releases`] - Shows snapshot releases grouped by release week
//! - [`list_artists`] - Shows snapshot artists with the collections they came from
//! - [`info`] - Snapshot status and release week helpers
//!
//! ## Architecture
//!
//! ```text
//! CLI Layer (User Interface)
//!     ↓
//! Sync Engine (orchestrator, paginator, pool, fetch client)
//!     ↓
//! Spotify page sources / Management (token and snapshot stores)
//! ```
//!
//! ## Error Handling
//!
//! Commands terminate through `error!` on failures the user has to act on
//! (missing token, invalid configuration, failed pass) and print a `warning!`
//! where a partial result is still useful.
//!
//! ## Usage
//!
//! ```bash
//! relsync sync --source followed --source saved-albums --extra
//! relsync releases --previous-weeks 2
//! relsync artists --search rock
//! relsync info
//! ```

mod artists;
mod info;
mod releases;
mod sync;

use crate::{management::SnapshotStore, types::SyncSnapshot, warning};

pub use artists::list_artists;
pub use info::info;
pub use releases::list_releases;
pub use sync::{SyncOptions, sync};

/// Loads the stored snapshot, telling the user how to get one when missing.
async fn load_snapshot() -> Option<SyncSnapshot> {
    let store = SnapshotStore::new();
    match store.load().await {
        Ok(Some(snapshot)) => Some(snapshot),
        Ok(None) => {
            warning!("No snapshot found. Run relsync sync first.");
            None
        }
        Err(e) => {
            warning!("Failed to load snapshot. Err: {}", e);
            None
        }
    }
}
