#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use relsync::{
    config::SyncConfig,
    sync::{
        Credential, CredentialError, CredentialProvider, FetchClient, RawResponse,
        RequestDescriptor, RetryPolicy, StaticCredential, Transport, TransportError,
    },
};
use serde_json::{Value, json};

/// Transport answering from a fixed script, then repeating `fallback`.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    fallback: Result<RawResponse, TransportError>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(
        script: Vec<Result<RawResponse, TransportError>>,
        fallback: Result<RawResponse, TransportError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(response: RawResponse) -> Self {
        Self::new(Vec::new(), Ok(response))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        _request: &RequestDescriptor,
        _bearer: &str,
    ) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

type Handler = dyn Fn(&RequestDescriptor, usize) -> RawResponse + Send + Sync;

/// Fake Web API routing every request through one handler.
///
/// The handler also receives how often the same path was requested before,
/// so scripts can fail the first attempt and succeed afterwards.
pub struct FakeSpotify {
    handler: Box<Handler>,
    delay: Duration,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSpotify {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RequestDescriptor, usize) -> RawResponse + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delay: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeSpotify {
    async fn send(
        &self,
        request: &RequestDescriptor,
        _bearer: &str,
    ) -> Result<RawResponse, TransportError> {
        let seen = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(request.path().to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok((self.handler)(request, seen))
    }
}

/// Credential valid for the next hour.
pub fn fresh_credential() -> Arc<dyn CredentialProvider> {
    Arc::new(StaticCredential(Credential::new(
        "test-token",
        Utc::now() + chrono::Duration::hours(1),
    )))
}

pub fn expired_credential() -> Arc<dyn CredentialProvider> {
    Arc::new(StaticCredential(Credential::new(
        "stale-token",
        Utc::now() - chrono::Duration::seconds(1),
    )))
}

/// Credential that expires after `valid_calls` requests for it.
pub struct ExpiringCredential {
    remaining: AtomicUsize,
}

impl ExpiringCredential {
    pub fn after(valid_calls: usize) -> Arc<dyn CredentialProvider> {
        Arc::new(Self {
            remaining: AtomicUsize::new(valid_calls),
        })
    }
}

#[async_trait]
impl CredentialProvider for ExpiringCredential {
    async fn credential(&self) -> Result<Credential, CredentialError> {
        let valid = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let expires_at = if valid {
            Utc::now() + chrono::Duration::hours(1)
        } else {
            Utc::now() - chrono::Duration::seconds(1)
        };
        Ok(Credential::new("rotating-token", expires_at))
    }
}

pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_retry_after: Duration::from_secs(120),
    }
}

pub fn client(transport: Arc<dyn Transport>, max_retries: u32) -> Arc<FetchClient> {
    Arc::new(FetchClient::new(
        transport,
        fresh_credential(),
        fast_policy(max_retries),
    ))
}

pub fn test_config() -> SyncConfig {
    SyncConfig {
        concurrency: 4,
        max_retries: 2,
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(5),
        ..SyncConfig::default()
    }
}

pub fn ok(body: Value) -> RawResponse {
    RawResponse::new(200, body.to_string())
}

pub fn status(code: u16, message: &str) -> RawResponse {
    RawResponse::new(
        code,
        json!({ "error": { "status": code, "message": message } }).to_string(),
    )
}

/// `/me/following` page; `after` set means more pages follow.
pub fn followed_page(artists: &[(&str, &str)], after: Option<&str>, total: u64) -> Value {
    let items: Vec<Value> = artists
        .iter()
        .map(|(id, name)| json!({ "id": id, "name": name, "genres": ["indie"] }))
        .collect();
    json!({
        "artists": {
            "items": items,
            "next": after.map(|a| format!("https://api.spotify.com/v1/me/following?after={}", a)),
            "cursors": { "after": after },
            "total": total
        }
    })
}

pub fn album(id: &str, name: &str, release_date: &str, artist: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "release_date": release_date,
        "release_date_precision": "day",
        "album_type": "album",
        "album_group": "album",
        "artists": [{ "id": null, "name": artist }]
    })
}

/// Offset paged list; `has_next` decides whether a `next` link is present.
pub fn offset_page(items: Vec<Value>, offset: u64, total: u64, has_next: bool) -> Value {
    json!({
        "items": items,
        "next": if has_next { Some("https://api.spotify.com/v1/next") } else { None },
        "offset": offset,
        "total": total
    })
}
