//! Persistence of the state that outlives a single command: the bearer token
//! written by the login flow and the last completed snapshot.

mod auth;
mod snapshot;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use auth::TokenManager;
pub use snapshot::SnapshotStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to (de)serialize {path}: {source}")]
    Serde {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn serde(path: &Path, source: serde_json::Error) -> Self {
        StoreError::Serde {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the file simply does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

fn cache_path(file: &str) -> PathBuf {
    let mut path = crate::config::data_dir();
    path.push("cache");
    path.push(file);
    path
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::serde(path, e))?;

    // readers never see a half written file
    let tmp = path.with_extension("json.tmp");
    async_fs::write(&tmp, json)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    async_fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = async_fs::read_to_string(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| StoreError::serde(path, e))
}
