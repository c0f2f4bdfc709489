use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    management::{StoreError, cache_path, read_json},
    sync::{Credential, CredentialError, CredentialProvider},
    types::Token,
};

/// Seconds before the nominal expiry at which a token is treated as expired.
const EXPIRY_MARGIN_SECS: u64 = 240;

/// Hands out the token stored in the local cache.
///
/// Tokens are obtained and refreshed by a separate login flow which rewrites
/// the cache file. Once the held token expires the file is read again, so a
/// refresh done in the meantime is picked up without restarting.
pub struct TokenManager {
    token: Mutex<Token>,
    path: PathBuf,
}

impl TokenManager {
    /// Loads the token from `<data dir>/relsync/cache/token.json`.
    pub async fn load() -> Result<Self, StoreError> {
        Self::with_path(Self::token_path()).await
    }

    pub async fn with_path(path: PathBuf) -> Result<Self, StoreError> {
        let token: Token = read_json(&path).await?;
        Ok(Self {
            token: Mutex::new(token),
            path,
        })
    }

    pub async fn current_token(&self) -> Token {
        self.token.lock().await.clone()
    }

    /// Instant from which `token` counts as expired.
    pub fn expires_at(token: &Token) -> DateTime<Utc> {
        let secs = token
            .obtained_at
            .saturating_add(token.expires_in)
            .saturating_sub(EXPIRY_MARGIN_SECS);
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        DateTime::from_timestamp(secs as i64, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn token_path() -> PathBuf {
        cache_path("token.json")
    }
}

#[async_trait]
impl CredentialProvider for TokenManager {
    async fn credential(&self) -> Result<Credential, CredentialError> {
        let mut token = self.token.lock().await;

        if Utc::now() >= Self::expires_at(&token) {
            match read_json::<Token>(&self.path).await {
                Ok(stored) if Self::expires_at(&stored) > Self::expires_at(&token) => {
                    debug!(path = %self.path.display(), "picked up refreshed token");
                    *token = stored;
                }
                Ok(_) => warn!("token expired, run the login flow again"),
                Err(err) if err.is_not_found() => {
                    return Err(CredentialError::Unavailable(err.to_string()));
                }
                Err(err) => warn!(error = %err, "could not re-read token cache"),
            }
        }

        if token.access_token.is_empty() {
            return Err(CredentialError::Unavailable(
                "token has no access token".to_string(),
            ));
        }

        Ok(Credential::new(
            token.access_token.clone(),
            Self::expires_at(&token),
        ))
    }
}
