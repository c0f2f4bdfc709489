mod common;

use std::{collections::HashMap, sync::Arc, time::Duration};

use common::*;
use relsync::sync::{
    FailureReason, Page, PageEvent, PageSource, Paginator, RequestDescriptor, WorkerPool,
    paginate_all,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Numbered pages under `path`; the cursor is the page number.
struct Numbered {
    path: String,
}

impl Numbered {
    fn at(path: &str) -> Arc<dyn PageSource> {
        Arc::new(Self {
            path: path.to_string(),
        })
    }
}

impl PageSource for Numbered {
    fn request(&self, cursor: Option<&str>) -> RequestDescriptor {
        RequestDescriptor::get(self.path.clone()).query("page", cursor.unwrap_or("0"))
    }

    fn decode(&self, payload: Value) -> Result<Page, String> {
        let items = payload["items"]
            .as_array()
            .cloned()
            .ok_or_else(|| "missing items".to_string())?;
        Ok(Page {
            items,
            next_cursor: payload["next"].as_str().map(str::to_string),
            total: payload["total"].as_u64(),
        })
    }
}

fn page_number(req: &RequestDescriptor) -> u64 {
    req.query_value("page").and_then(|p| p.parse().ok()).unwrap_or(0)
}

/// Serves `pages` numbered pages of two items each for any path.
fn numbered_pages(pages: u64) -> impl Fn(&RequestDescriptor, usize) -> relsync::sync::RawResponse {
    move |req, _| {
        let n = page_number(req);
        let next = (n + 1 < pages).then(|| (n + 1).to_string());
        ok(json!({ "items": [n * 10, n * 10 + 1], "next": next, "total": pages * 2 }))
    }
}

fn pool(api: Arc<FakeSpotify>, size: usize) -> WorkerPool {
    WorkerPool::new(size, client(api, 1), CancellationToken::new())
}

#[tokio::test]
async fn test_paginate_all_yields_pages_in_cursor_order() {
    let api = Arc::new(FakeSpotify::new(numbered_pages(4)));
    let mut pool = pool(api.clone(), 3);

    let pages = paginate_all(Numbered::at("/things"), &mut pool, 1)
        .collect()
        .await
        .unwrap();

    let items: Vec<u64> = pages
        .iter()
        .flat_map(|p| p.items.iter().filter_map(Value::as_u64))
        .collect();
    assert_eq!(items, vec![0, 1, 10, 11, 20, 21, 30, 31]);
    assert!(pages.last().unwrap().is_last());
    assert_eq!(api.calls("/things"), 4);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_single_page_collection() {
    let api = Arc::new(FakeSpotify::new(numbered_pages(1)));
    let mut pool = pool(api.clone(), 2);

    let mut pages = paginate_all(Numbered::at("/one"), &mut pool, 1);
    let first = pages.next().await.unwrap().unwrap();
    assert_eq!(first.items.len(), 2);
    assert!(pages.next().await.is_none());
    drop(pages);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_multiplexed_streams_keep_per_stream_order() {
    let api = Arc::new(FakeSpotify::new(numbered_pages(3)).with_delay(Duration::from_millis(1)));
    let mut pool = pool(api.clone(), 4);
    let mut paginator = Paginator::new(1);

    for key in ["a", "b", "c"] {
        paginator.start(&mut pool, key, Numbered::at(&format!("/{}", key)));
    }
    assert_eq!(paginator.active(), 3);

    let mut cursors: HashMap<&str, Vec<Option<String>>> = HashMap::new();
    let mut finished = Vec::new();
    while let Some(event) = paginator.next(&mut pool).await {
        match event {
            PageEvent::Page { key, cursor, .. } => {
                assert!(!finished.contains(&key), "page after finish");
                cursors.entry(key).or_default().push(cursor);
            }
            PageEvent::Finished { key } => finished.push(key),
            PageEvent::Failed { key, failure } => panic!("{} failed: {}", key, failure),
        }
    }

    finished.sort();
    assert_eq!(finished, vec!["a", "b", "c"]);
    for key in ["a", "b", "c"] {
        assert_eq!(
            cursors[key],
            vec![None, Some("1".to_string()), Some("2".to_string())]
        );
    }
    assert_eq!(paginator.active(), 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_retryable_failure_is_resubmitted_for_same_cursor() {
    // page 1 fails twice, exhausting the client's single retry; the resubmission succeeds
    let api = Arc::new(FakeSpotify::new(|req, seen| {
        let n = page_number(req);
        if n == 1 && seen < 3 {
            return status(503, "unavailable");
        }
        let next = (n + 1 < 3).then(|| (n + 1).to_string());
        ok(json!({ "items": [n], "next": next }))
    }));
    let mut pool = pool(api.clone(), 1);

    let pages = paginate_all(Numbered::at("/flaky"), &mut pool, 1)
        .collect()
        .await
        .unwrap();

    assert_eq!(pages.len(), 3);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_fatal_failure_names_failing_cursor() {
    let api = Arc::new(FakeSpotify::new(|req, _| {
        let n = page_number(req);
        if n == 2 {
            return status(404, "not found");
        }
        ok(json!({ "items": [n], "next": (n + 1).to_string() }))
    }));
    let mut pool = pool(api.clone(), 2);

    let mut pages = paginate_all(Numbered::at("/broken"), &mut pool, 3);
    assert!(pages.next().await.unwrap().is_ok());
    assert!(pages.next().await.unwrap().is_ok());
    let failure = pages.next().await.unwrap().unwrap_err();
    assert!(pages.next().await.is_none());
    drop(pages);

    assert_eq!(failure.cursor.as_deref(), Some("2"));
    assert_eq!(
        failure.reason,
        FailureReason::Fatal {
            status: 404,
            message: "not found".to_string()
        }
    );
    assert_eq!(api.calls("/broken"), 3);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_undecodable_page_fails_stream() {
    let api = Arc::new(FakeSpotify::new(|_, _| ok(json!({ "unexpected": true }))));
    let mut pool = pool(api, 1);

    let failure = paginate_all(Numbered::at("/odd"), &mut pool, 1)
        .collect()
        .await
        .unwrap_err();

    assert_eq!(failure.cursor, None);
    assert!(matches!(failure.reason, FailureReason::Decode(_)));
    pool.shutdown().await;
}

#[tokio::test]
async fn test_repeated_cursor_ends_stream() {
    let api = Arc::new(FakeSpotify::new(|req, _| {
        let n = page_number(req);
        ok(json!({ "items": [n], "next": "1" }))
    }));
    let mut pool = pool(api.clone(), 1);

    let pages = paginate_all(Numbered::at("/loop"), &mut pool, 1)
        .collect()
        .await
        .unwrap();

    assert_eq!(pages.len(), 2);
    assert_eq!(api.calls("/loop"), 2);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_cancelled_pool_fails_stream_as_cancelled() {
    let api = Arc::new(FakeSpotify::new(numbered_pages(5)));
    let cancel = CancellationToken::new();
    let mut pool = WorkerPool::new(1, client(api.clone(), 1), cancel.clone());
    cancel.cancel();

    let failure = paginate_all(Numbered::at("/gone"), &mut pool, 3)
        .collect()
        .await
        .unwrap_err();

    assert!(failure.reason.is_cancelled());
    assert_eq!(api.total_calls(), 0);
    pool.shutdown().await;
}
