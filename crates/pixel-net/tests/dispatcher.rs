//! Integration tests for RequestDispatcher.
//!
//! Uses wiremock for HTTP mocking. Tests cover the cache-first pipeline
//! (miss, hit, expiry, disabled), error reporting, callbacks, and cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pixel_net::{
    CacheKey, ContentKind, NetConfig, NetError, NetRequest, RequestConfig, RequestDispatcher,
    RequestMethod, RequestState,
};
use tempfile::TempDir;
use tokio::sync::oneshot;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_dispatcher() -> (RequestDispatcher, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = NetConfig::default()
        .with_cache_dir(temp_dir.path().join("cache"))
        .with_timeout_secs(10);
    let dispatcher = RequestDispatcher::new(config).expect("failed to create dispatcher");
    (dispatcher, temp_dir)
}

/// Rewrite an entry's stamp so it looks `secs` old.
fn backdate(dispatcher: &RequestDispatcher, request: &RequestConfig, secs: i64) {
    let key = CacheKey::for_request(request);
    let stamp = chrono::Utc::now().timestamp() - secs;
    std::fs::write(dispatcher.cache().paths(&key).stamp, stamp.to_string()).unwrap();
}

/// A local port with no listener.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[derive(Clone, Default)]
struct CallbackCounts {
    complete: Arc<AtomicUsize>,
    error: Arc<AtomicUsize>,
    dispose: Arc<AtomicUsize>,
}

impl CallbackCounts {
    fn attach(&self, request: NetRequest) -> NetRequest {
        let complete = self.complete.clone();
        let error = self.error.clone();
        let dispose = self.dispose.clone();
        request
            .on_complete(move |_| {
                complete.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |_| {
                error.fetch_add(1, Ordering::SeqCst);
            })
            .on_dispose(move || {
                dispose.fetch_add(1, Ordering::SeqCst);
            })
    }

    fn get(&self) -> (usize, usize, usize) {
        (
            self.complete.load(Ordering::SeqCst),
            self.error.load(Ordering::SeqCst),
            self.dispose.load(Ordering::SeqCst),
        )
    }
}

#[tokio::test]
async fn test_first_fetch_hits_network_and_caches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG-data".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let request = RequestConfig::new(format!("{}/a.png", mock_server.uri())).with_cache_ttl(300);

    let payload = dispatcher.send(&request).await.expect("fetch failed");
    assert!(!payload.is_cached());
    assert_eq!(payload.status, Some(200));
    assert_eq!(payload.data, b"\x89PNG-data");

    let entry = dispatcher
        .cache()
        .get(&CacheKey::for_request(&request), request.cache_ttl())
        .await
        .expect("response should be cached");
    assert_eq!(entry.payload, b"\x89PNG-data");
}

#[tokio::test]
async fn test_repeat_within_ttl_served_from_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("image"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let request = RequestConfig::new(format!("{}/a.png", mock_server.uri())).with_cache_ttl(300);

    let first = dispatcher.send(&request).await.unwrap();
    let second = dispatcher.send(&request).await.unwrap();

    assert!(!first.is_cached());
    assert!(second.is_cached());
    assert_eq!(second.status, None);
    assert_eq!(first.data, second.data);
}

#[tokio::test]
async fn test_repeat_after_ttl_refetches_and_overwrites() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("v1"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("v2"))
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let request = RequestConfig::new(format!("{}/a.png", mock_server.uri())).with_cache_ttl(300);

    let first = dispatcher.send(&request).await.unwrap();
    assert_eq!(first.text(), "v1");

    backdate(&dispatcher, &request, 301);

    let second = dispatcher.send(&request).await.unwrap();
    assert!(!second.is_cached());
    assert_eq!(second.text(), "v2");

    let received = mock_server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);

    let entry = dispatcher
        .cache()
        .get(&CacheKey::for_request(&request), request.cache_ttl())
        .await
        .expect("fresh entry after refetch");
    assert_eq!(entry.payload, b"v2");
    assert!((chrono::Utc::now().timestamp() - entry.created_at).abs() <= 2);
}

#[tokio::test]
async fn test_cache_disabled_always_hits_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/config.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let request =
        RequestConfig::new(format!("{}/config.json", mock_server.uri())).with_cache(false);

    assert!(!dispatcher.send(&request).await.unwrap().is_cached());
    assert!(!dispatcher.send(&request).await.unwrap().is_cached());
    assert!(dispatcher.cache().entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_error_status_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database on fire"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let request = RequestConfig::new(format!("{}/broken", mock_server.uri()));

    for _ in 0..2 {
        match dispatcher.send(&request).await {
            Err(NetError::Status { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "database on fire");
            }
            other => panic!("expected Status error, got {:?}", other),
        }
    }
    assert!(dispatcher.cache().entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_not_found_uses_reason_phrase() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let request = RequestConfig::new(format!("{}/missing.png", mock_server.uri()));

    let err = dispatcher.send(&request).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "HTTP 404: Not Found");
}

#[tokio::test]
async fn test_transport_error_reported() {
    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let request = RequestConfig::new(format!("http://127.0.0.1:{}/unreachable", closed_port()));

    match dispatcher.send(&request).await {
        Err(NetError::Network { message }) => {
            assert!(message.contains("/unreachable"), "url missing: {}", message);
            assert!(
                message.to_lowercase().contains("connection refused"),
                "cause missing: {}",
                message
            );
        }
        other => panic!("expected Network error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transport_error_cause_reaches_on_error() {
    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let (tx, rx) = oneshot::channel();

    let handle = dispatcher.fetch(
        NetRequest::new(RequestConfig::new(format!(
            "http://127.0.0.1:{}/a.png",
            closed_port()
        )))
        .on_error(move |err| {
            let _ = tx.send(err);
        }),
    );

    let err = rx.await.expect("on_error should fire");
    assert!(err.is_remote());
    assert!(err.to_string().to_lowercase().contains("connection refused"));
    assert_eq!(handle.join().await, RequestState::Failed);
}

#[tokio::test]
async fn test_cache_write_failure_does_not_fail_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("image"))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    // A regular file where the cache directory should be.
    let blocked = temp_dir.path().join("cache");
    std::fs::write(&blocked, "not a directory").unwrap();
    let dispatcher =
        RequestDispatcher::new(NetConfig::default().with_cache_dir(&blocked)).unwrap();

    let request = RequestConfig::new(format!("{}/a.png", mock_server.uri()));
    let payload = dispatcher.send(&request).await.expect("request should succeed");
    assert_eq!(payload.text(), "image");
}

#[tokio::test]
async fn test_post_is_never_cached_and_sends_form() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/score"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("level=3&score=42"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let request = RequestConfig::new(format!("{}/score", mock_server.uri()))
        .with_method(RequestMethod::Post)
        .with_form_field("score", "42")
        .with_form_field("level", "3");

    assert!(!dispatcher.send(&request).await.unwrap().is_cached());
    assert!(!dispatcher.send(&request).await.unwrap().is_cached());
    assert!(dispatcher.cache().entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_headers_and_user_agent_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("x-game-version", "1.4.2"))
        .and(header("user-agent", "pixel-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("profile"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = NetConfig {
        user_agent: "pixel-test/1.0".to_string(),
        ..NetConfig::default().with_cache_dir(temp_dir.path().join("cache"))
    };
    let dispatcher = RequestDispatcher::new(config).unwrap();
    let request = RequestConfig::new(format!("{}/profile", mock_server.uri()))
        .with_header("X-Game-Version", "1.4.2");

    assert_eq!(dispatcher.send(&request).await.unwrap().text(), "profile");
}

#[tokio::test]
async fn test_binary_kind_uses_content_cache_files() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/theme.ogg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 1, 2, 3]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let request = RequestConfig::new(format!("{}/theme.ogg", mock_server.uri()))
        .with_kind(ContentKind::Binary);

    dispatcher.send(&request).await.unwrap();
    let cached = dispatcher.send(&request).await.unwrap();
    assert!(cached.is_cached());
    assert_eq!(cached.data, vec![0u8, 1, 2, 3]);

    let paths = dispatcher.cache().paths(&CacheKey::for_request(&request));
    assert!(paths.payload.to_string_lossy().ends_with(".contentcache"));
    assert!(paths.payload.exists());
}

#[tokio::test]
async fn test_fetch_invokes_on_complete_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/levels.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[1,2,3]"))
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let counts = CallbackCounts::default();
    let (tx, rx) = oneshot::channel();

    let request = counts.attach(NetRequest::new(RequestConfig::new(format!(
        "{}/levels.json",
        mock_server.uri()
    ))));
    let handle = dispatcher.fetch(request.on_complete(move |payload| {
        let _ = tx.send(payload);
    }));

    let payload = rx.await.expect("on_complete should fire");
    assert_eq!(payload.text(), "[1,2,3]");

    assert_eq!(handle.join().await, RequestState::Completed);
    // on_complete was replaced by the channel sender above.
    let (_, errors, disposed) = counts.get();
    assert_eq!(errors, 0);
    assert_eq!(disposed, 1);
}

#[tokio::test]
async fn test_fetch_cache_hit_completes_without_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("image"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let config = RequestConfig::new(format!("{}/a.png", mock_server.uri()));
    dispatcher.send(&config).await.unwrap();

    let counts = CallbackCounts::default();
    let handle = dispatcher.fetch(counts.attach(NetRequest::new(config)));

    assert_eq!(handle.join().await, RequestState::Completed);
    assert_eq!(counts.get(), (1, 0, 1));
}

#[tokio::test]
async fn test_fetch_invokes_on_error_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let (tx, rx) = oneshot::channel();
    let completed = Arc::new(AtomicUsize::new(0));
    let completed_clone = completed.clone();

    let handle = dispatcher.fetch(
        NetRequest::new(RequestConfig::new(format!("{}/broken", mock_server.uri())))
            .on_complete(move |_| {
                completed_clone.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |err| {
                let _ = tx.send(err);
            }),
    );

    let err = rx.await.expect("on_error should fire");
    assert_eq!(err.status(), Some(503));
    assert_eq!(handle.join().await, RequestState::Failed);
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fetch_invalid_url_reports_error() {
    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let counts = CallbackCounts::default();

    let handle = dispatcher.fetch(counts.attach(NetRequest::new(RequestConfig::new(
        "file:///etc/passwd",
    ))));

    assert_eq!(handle.join().await, RequestState::Failed);
    assert_eq!(counts.get(), (0, 1, 1));
}

#[tokio::test]
async fn test_cancel_in_flight_suppresses_callbacks() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let counts = CallbackCounts::default();
    let config = RequestConfig::new(format!("{}/slow.png", mock_server.uri()));

    let handle = dispatcher.fetch(counts.attach(NetRequest::new(config.clone())));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.state(), RequestState::Fetching);

    assert!(handle.cancel());
    assert!(!handle.cancel(), "second cancel is a no-op");
    assert_eq!(handle.join().await, RequestState::Cancelled);

    assert_eq!(counts.get(), (0, 0, 1));
    assert!(dispatcher
        .cache()
        .get(&CacheKey::for_request(&config), config.cache_ttl())
        .await
        .is_none());
}

#[tokio::test]
async fn test_cancel_after_completion_is_noop() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("image"))
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let (tx, rx) = oneshot::channel();
    let handle = dispatcher.fetch(
        NetRequest::new(RequestConfig::new(format!("{}/a.png", mock_server.uri()))).on_complete(
            move |payload| {
                let _ = tx.send(payload);
            },
        ),
    );

    rx.await.expect("on_complete should fire");
    assert!(handle.is_finished());
    assert!(!handle.cancel());
    assert_eq!(handle.join().await, RequestState::Completed);
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let mock_server = MockServer::start().await;

    for name in ["a", "b", "c", "d"] {
        Mock::given(method("GET"))
            .and(path(format!("/{}.json", name)))
            .respond_with(ResponseTemplate::new(200).set_body_string(name))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let mut tasks = Vec::new();
    for name in ["a", "b", "c", "d"] {
        let dispatcher = dispatcher.clone();
        let url = format!("{}/{}.json", mock_server.uri(), name);
        tasks.push(tokio::spawn(async move {
            dispatcher.send(&RequestConfig::new(url)).await
        }));
    }

    let mut bodies = Vec::new();
    for task in tasks {
        bodies.push(task.await.unwrap().unwrap().text().into_owned());
    }
    assert_eq!(bodies, vec!["a", "b", "c", "d"]);
    assert_eq!(dispatcher.cache().entries().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_panicking_callback_still_disposes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("image"))
        .mount(&mock_server)
        .await;

    let (dispatcher, _temp_dir) = create_test_dispatcher();
    let disposed = Arc::new(AtomicUsize::new(0));
    let disposed_clone = disposed.clone();

    let handle = dispatcher.fetch(
        NetRequest::new(RequestConfig::new(format!("{}/a.png", mock_server.uri())))
            .on_complete(|_| panic!("game code failed"))
            .on_dispose(move || {
                disposed_clone.fetch_add(1, Ordering::SeqCst);
            }),
    );

    assert_eq!(handle.join().await, RequestState::Completed);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}
