use std::path::PathBuf;

use tracing::info;

use crate::{
    management::{StoreError, cache_path, read_json, write_json},
    types::SyncSnapshot,
};

/// The last completed snapshot on disk.
///
/// Only completed passes are ever persisted; a failed or cancelled pass leaves
/// the previous file in place.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    /// Store at `<data dir>/relsync/cache/snapshot.json`.
    pub fn new() -> Self {
        Self::at(cache_path("snapshot.json"))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub async fn persist(&self, snapshot: &SyncSnapshot) -> Result<(), StoreError> {
        write_json(&self.path, snapshot).await?;
        info!(path = %self.path.display(), albums = snapshot.album_count(), "snapshot stored");
        Ok(())
    }

    /// Reads the stored snapshot; `Ok(None)` when no pass has completed yet.
    pub async fn load(&self) -> Result<Option<SyncSnapshot>, StoreError> {
        match read_json(&self.path).await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}
