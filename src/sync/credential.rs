use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Bearer token together with the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("no credential available: {0}")]
    Unavailable(String),
}

/// Source of bearer credentials.
///
/// Obtaining and refreshing tokens happens outside this crate; providers only
/// hand out whatever credential is current. The fetch client asks before every
/// attempt, so a provider may swap tokens between requests.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self) -> Result<Credential, CredentialError>;
}

/// Provider that always returns the same credential.
#[derive(Debug, Clone)]
pub struct StaticCredential(pub Credential);

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn credential(&self) -> Result<Credential, CredentialError> {
        Ok(self.0.clone())
    }
}
