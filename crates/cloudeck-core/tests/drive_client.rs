//! Integration tests for the folder-listing client against a local mock worker.
//!
//! Each test binds an axum router on 127.0.0.1:0 and points a `DriveClient`
//! at it.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use cloudeck_core::config::RemoteConfig;
use cloudeck_core::drive::{CacheStatus, DriveClient, FetchError, FolderBrowser};
use tokio_util::sync::CancellationToken;

const TREE: &str = r#"{
    "status": "success",
    "folders": {
        "name": "Music",
        "files": [],
        "folders": {
            "Ambient": {
                "audioCount": 2,
                "files": [
                    {"name": "drift.mp3", "fileId": "a1", "size": "4.2 MB"},
                    {"name": "tide.mp3", "fileId": "a2", "size": "5.0 MB"}
                ]
            }
        }
    }
}"#;

#[derive(Clone)]
struct Mock {
    hits: Arc<AtomicUsize>,
    /// Responses returned for the first N hits before falling back to 200.
    failures: Vec<StatusCode>,
    cache: Option<&'static str>,
    delay: Duration,
}

impl Mock {
    fn ok() -> Self {
        Self {
            hits: Arc::new(AtomicUsize::new(0)),
            failures: Vec::new(),
            cache: None,
            delay: Duration::ZERO,
        }
    }
}

async fn folders(
    State(mock): State<Mock>,
    Query(params): Query<std::collections::HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let hit = mock.hits.fetch_add(1, Ordering::SeqCst);
    if params.get("mode").map(String::as_str) != Some("folders") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    if headers.get("X-API-Key").and_then(|v| v.to_str().ok()) != Some("secret") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !mock.delay.is_zero() {
        tokio::time::sleep(mock.delay).await;
    }
    if let Some(status) = mock.failures.get(hit) {
        return (*status).into_response();
    }
    let mut response = ([("content-type", "application/json")], TREE).into_response();
    if let Some(cache) = mock.cache {
        if let Ok(value) = cache.parse() {
            response.headers_mut().insert("X-Cache-Status", value);
        }
    }
    response
}

async fn serve(mock: Mock) -> SocketAddr {
    let app = Router::new().route("/", get(folders)).with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn client(addr: SocketAddr, api_key: &str) -> DriveClient {
    DriveClient::new(&RemoteConfig {
        worker_url: format!("http://{addr}/"),
        api_key: api_key.to_string(),
        timeout_secs: 1,
        max_retries: 3,
        backoff_base_ms: 10,
    })
    .unwrap()
}

#[tokio::test]
async fn fetches_and_browses_tree() {
    let mock = Mock {
        cache: Some("HIT"),
        ..Mock::ok()
    };
    let addr = serve(mock).await;

    let listing = client(addr, "secret")
        .fetch_folders(false, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(listing.cache_status, Some(CacheStatus::Hit));
    assert_eq!(listing.message(), "Folder structure loaded (cached)");

    let mut browser = FolderBrowser::new(listing.root);
    assert!(browser.open("Ambient"));
    let tracks = browser.current_tracks();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[1].id_key(), "a2");
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let mock = Mock::ok();
    let hits = Arc::clone(&mock.hits);
    let addr = serve(mock).await;

    let err = client(addr, "wrong")
        .fetch_folders(false, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Unauthorized));
    assert_eq!(err.to_string(), "Authentication failed - Invalid API key");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let mock = Mock {
        failures: vec![StatusCode::SERVICE_UNAVAILABLE, StatusCode::BAD_GATEWAY],
        ..Mock::ok()
    };
    let hits = Arc::clone(&mock.hits);
    let addr = serve(mock).await;

    let listing = client(addr, "secret")
        .fetch_folders(true, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(listing.root.name, "Music");
    assert_eq!(listing.cache_status, None);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_give_up_after_limit() {
    let mock = Mock {
        failures: vec![StatusCode::INTERNAL_SERVER_ERROR; 10],
        ..Mock::ok()
    };
    let hits = Arc::clone(&mock.hits);
    let addr = serve(mock).await;

    let err = client(addr, "secret")
        .fetch_folders(false, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Server(500)));
    // One attempt plus three retries.
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn rate_limit_is_reported() {
    let mock = Mock {
        failures: vec![StatusCode::TOO_MANY_REQUESTS],
        ..Mock::ok()
    };
    let addr = serve(mock).await;

    let err = client(addr, "secret")
        .fetch_folders(false, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Rate limit exceeded - Please wait");
}

#[tokio::test]
async fn cancel_aborts_in_flight_fetch() {
    let mock = Mock {
        delay: Duration::from_secs(5),
        ..Mock::ok()
    };
    let addr = serve(mock).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client(addr, "secret")
        .fetch_folders(false, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Cancelled));
}

#[tokio::test]
async fn slow_worker_times_out() {
    let mock = Mock {
        delay: Duration::from_secs(5),
        ..Mock::ok()
    };
    let addr = serve(mock).await;

    let err = client(addr, "secret")
        .fetch_folders(false, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout(1)));
}
