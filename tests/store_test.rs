use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use relsync::{
    management::{SnapshotStore, TokenManager},
    sync::CredentialProvider,
    types::{ArtistOrigins, ArtistRecord, SyncSnapshot, Token},
};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("relsync-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn token(access_token: &str, obtained_at: u64, expires_in: u64) -> Token {
    Token {
        access_token: access_token.to_string(),
        refresh_token: String::new(),
        scope: String::new(),
        expires_in,
        obtained_at,
    }
}

fn now() -> u64 {
    Utc::now().timestamp() as u64
}

#[tokio::test]
async fn test_snapshot_round_trip_through_store() {
    let dir = scratch_dir("snapshot");
    let store = SnapshotStore::at(dir.join("cache/snapshot.json"));

    assert_eq!(store.load().await.unwrap(), None);

    let mut artists = BTreeMap::new();
    artists.insert(
        "A".to_string(),
        ArtistRecord {
            id: "A".to_string(),
            name: "Alpha".to_string(),
            origins: ArtistOrigins {
                followed: true,
                ..ArtistOrigins::default()
            },
            genres: Vec::new(),
        },
    );
    let snapshot = SyncSnapshot::from_parts(
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap(),
        artists,
        BTreeMap::new(),
        Vec::new(),
    );

    store.persist(&snapshot).await.unwrap();
    assert_eq!(store.path(), &dir.join("cache/snapshot.json"));
    assert!(!dir.join("cache/snapshot.json.tmp").exists());

    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded, snapshot);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_corrupt_snapshot_is_an_error() {
    let dir = scratch_dir("corrupt");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("snapshot.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = SnapshotStore::at(path).load().await.unwrap_err();
    assert!(!err.is_not_found());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_token_manager_hands_out_valid_token() {
    let dir = scratch_dir("token");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("token.json");
    std::fs::write(
        &path,
        serde_json::to_string(&token("fresh", now(), 3600)).unwrap(),
    )
    .unwrap();

    let manager = TokenManager::with_path(path).await.unwrap();
    let credential = manager.credential().await.unwrap();

    assert_eq!(credential.access_token(), "fresh");
    assert!(!credential.is_expired());
    // expiry is pulled forward by the safety margin
    assert!(credential.expires_at().timestamp() as u64 <= now() + 3600 - 240);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_token_manager_picks_up_refreshed_file() {
    let dir = scratch_dir("refresh");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("token.json");
    let stale = token("stale", now() - 7200, 3600);
    std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

    let manager = TokenManager::with_path(path.clone()).await.unwrap();
    assert!(manager.credential().await.unwrap().is_expired());

    // the login flow rewrites the file
    std::fs::write(
        &path,
        serde_json::to_string(&token("renewed", now(), 3600)).unwrap(),
    )
    .unwrap();

    let credential = manager.credential().await.unwrap();
    assert_eq!(credential.access_token(), "renewed");
    assert!(!credential.is_expired());
    assert_eq!(manager.current_token().await.access_token, "renewed");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_token_expiry_of_corrupt_token_does_not_overflow() {
    let corrupt = token("corrupt", u64::MAX, u64::MAX);
    assert_eq!(TokenManager::expires_at(&corrupt), DateTime::<Utc>::MIN_UTC);

    let tiny = token("tiny", 10, 20);
    assert_eq!(TokenManager::expires_at(&tiny).timestamp(), 0);
}

#[tokio::test]
async fn test_missing_token_file() {
    let dir = scratch_dir("missing");
    let err = TokenManager::with_path(dir.join("token.json"))
        .await
        .err()
        .unwrap();
    assert!(err.is_not_found());
}
