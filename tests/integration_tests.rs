//! Integration tests using wiremock to simulate the ingestion endpoint.

use logship::{Backoff, Error, LogMessage, Shipper, ShipperBuilder, Timer};
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wiremock::matchers::{body_json, body_string, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records requested delays and returns immediately.
#[derive(Clone, Default)]
struct RecordingTimer {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingTimer {
    fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Timer for RecordingTimer {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        self.delays.lock().unwrap().push(duration);
        Box::pin(async {})
    }
}

fn builder_for(mock_server: &MockServer) -> ShipperBuilder {
    Shipper::builder()
        .ingest_url(format!("{}/inputs", mock_server.uri()))
        .unwrap()
        .token("abc123")
}

fn fast_backoff(max_retries: usize) -> Backoff {
    Backoff::new(Duration::from_millis(5), max_retries)
}

#[tokio::test]
async fn test_text_message_with_tags() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/inputs/abc123/tag/env:prod,svc:api"))
        .and(header("content-type", "text/plain"))
        .and(body_string("hello"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"response":"ok"}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let shipper = builder_for(&mock_server)
        .default_tags(["env:prod"])
        .build()
        .unwrap();

    let delivery = shipper.ship("hello", &["svc:api"]).await.unwrap();

    assert_eq!(delivery.raw_body, r#"{"response":"ok"}"#);
    assert_eq!(delivery.status.as_u16(), 200);
    assert_eq!(delivery.attempts, 1);
    assert!(!delivery.was_retried());
}

#[tokio::test]
async fn test_record_is_sent_as_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/inputs/abc123"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_json(json!({ "level": "error", "msg": "boom" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let shipper = builder_for(&mock_server).build().unwrap();

    let record = LogMessage::record(&json!({ "level": "error", "msg": "boom" })).unwrap();
    let delivery = shipper.ship(record, &[]).await.unwrap();

    assert_eq!(delivery.raw_body, "accepted");
}

#[tokio::test]
async fn test_send_record_from_struct() {
    #[derive(Serialize)]
    struct Checkout {
        order_id: u64,
        total_cents: u64,
    }

    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/inputs/abc123/tag/svc:shop"))
        .and(body_json(json!({ "order_id": 7, "total_cents": 1999 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let shipper = builder_for(&mock_server).build().unwrap();

    let record = Checkout {
        order_id: 7,
        total_cents: 1999,
    };
    let delivery = shipper.send_record(&record, &["svc:shop"]).await.unwrap();
    assert_eq!(delivery.attempts, 1);
}

#[tokio::test]
async fn test_missing_token_completes_without_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let shipper = Shipper::builder()
        .ingest_url(format!("{}/inputs", mock_server.uri()))
        .unwrap()
        .build()
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let outcome = Arc::new(Mutex::new(None));
    let (calls_clone, outcome_clone) = (calls.clone(), outcome.clone());

    shipper.send_with("hello", &[], move |result| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        *outcome_clone.lock().unwrap() = Some(result);
    });

    // The callback has already run by the time send_with returns.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match outcome.lock().unwrap().take() {
        Some(Err(Error::Validation(message))) => assert!(message.contains("token")),
        other => panic!("Expected Validation error, got {:?}", other),
    }

    let handle = shipper.send("hello", &[]);
    assert!(handle.is_finished());
    assert!(matches!(handle.await, Err(Error::Validation(_))));

    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_message_and_bad_record_are_rejected_locally() {
    let mock_server = MockServer::start().await;
    let shipper = builder_for(&mock_server).build().unwrap();

    assert!(matches!(
        shipper.ship("", &["svc:api"]).await,
        Err(Error::Validation(_))
    ));

    let handle = shipper.send_record(&vec![1, 2, 3], &[]);
    assert!(handle.is_finished());
    match handle.await {
        Err(e @ Error::Encoding(_)) => assert!(e.is_local()),
        other => panic!("Expected Encoding error, got {:?}", other),
    }

    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_retry_until_success() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests fail with 500, third succeeds
    Mock::given(method("POST"))
        .and(path("/inputs/abc123"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(500).set_body_string("Server error")
            } else {
                ResponseTemplate::new(200).set_body_string("ok")
            }
        })
        .mount(&mock_server)
        .await;

    let timer = RecordingTimer::default();
    let shipper = builder_for(&mock_server)
        .backoff(fast_backoff(3))
        .timer(timer.clone())
        .build()
        .unwrap();

    let delivery = shipper.ship("hello", &[]).await.unwrap();

    assert_eq!(delivery.attempts, 3);
    assert!(delivery.was_retried());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    assert_eq!(
        timer.delays(),
        vec![Duration::from_millis(5), Duration::from_millis(10)]
    );
}

#[tokio::test]
async fn test_first_attempt_success_has_no_backoff() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let timer = RecordingTimer::default();
    let shipper = builder_for(&mock_server).timer(timer.clone()).build().unwrap();

    let delivery = shipper.ship("hello", &[]).await.unwrap();

    assert_eq!(delivery.attempts, 1);
    assert!(timer.delays().is_empty());
}

#[tokio::test]
async fn test_gives_up_after_eleven_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(11)
        .mount(&mock_server)
        .await;

    let timer = RecordingTimer::default();
    let shipper = builder_for(&mock_server).timer(timer.clone()).build().unwrap();

    let result = shipper.ship("hello", &[]).await;

    match result {
        Err(Error::DeliveryFailed {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 11);
            assert_eq!(last_error.status().map(|s| s.as_u16()), Some(503));
            assert_eq!(last_error.raw_response(), Some("unavailable"));
        }
        other => panic!("Expected DeliveryFailed, got {:?}", other),
    }

    let expected: Vec<Duration> = [5, 10, 20, 40, 80, 160, 320, 640, 1280, 2560]
        .into_iter()
        .map(Duration::from_secs)
        .collect();
    assert_eq!(timer.delays(), expected);
}

#[tokio::test]
async fn test_non_200_success_codes_are_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(3)
        .mount(&mock_server)
        .await;

    let shipper = builder_for(&mock_server)
        .backoff(fast_backoff(2))
        .build()
        .unwrap();

    let err = shipper.ship("hello", &[]).await.unwrap_err();

    match &err {
        Error::DeliveryFailed { attempts, .. } => assert_eq!(*attempts, 3),
        other => panic!("Expected DeliveryFailed, got {:?}", other),
    }
    assert_eq!(err.status().map(|s| s.as_u16()), Some(204));
}

#[tokio::test]
async fn test_retried_requests_are_identical() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    Mock::given(method("POST"))
        .respond_with(move |_req: &wiremock::Request| {
            if attempt_count_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(502)
            } else {
                ResponseTemplate::new(200)
            }
        })
        .mount(&mock_server)
        .await;

    let shipper = builder_for(&mock_server)
        .default_tags(["env:prod"])
        .backoff(fast_backoff(5))
        .build()
        .unwrap();

    let record = LogMessage::record(&json!({ "event": "deploy", "version": "1.4.2" })).unwrap();
    shipper.ship(record, &["svc:api"]).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    let first = &requests[0];
    assert_eq!(first.url.path(), "/inputs/abc123/tag/env:prod,svc:api");
    for request in &requests[1..] {
        assert_eq!(request.method, first.method);
        assert_eq!(request.url, first.url);
        assert_eq!(request.body, first.body);
        assert_eq!(
            request.headers.get("content-type"),
            first.headers.get("content-type")
        );
    }
}

#[tokio::test]
async fn test_requests_bypass_caches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("cache-control", "no-cache"))
        .and(header("pragma", "no-cache"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let shipper = builder_for(&mock_server).build().unwrap();
    shipper.ship("hello", &[]).await.unwrap();
}

#[tokio::test]
async fn test_network_errors_are_retried() {
    // Reserve a local port, then close it so connections are refused.
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let shipper = Shipper::builder()
        .ingest_url(format!("{}/inputs", uri))
        .unwrap()
        .token("abc123")
        .backoff(fast_backoff(2))
        .build()
        .unwrap();

    match shipper.ship("hello", &[]).await {
        Err(Error::DeliveryFailed {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last_error, Error::Network(_)));
        }
        other => panic!("Expected DeliveryFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreadable_success_body_is_not_resent() {
    // Answers 200 but promises more body bytes than it sends, then hangs up.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            hits_clone.fetch_add(1, Ordering::SeqCst);
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.ends_with(b"hello") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nshort")
                .await;
        }
    });

    let shipper = Shipper::builder()
        .ingest_url(format!("{}/inputs", uri))
        .unwrap()
        .token("abc123")
        .backoff(Backoff::new(Duration::from_millis(1), 3))
        .build()
        .unwrap();

    let delivery = shipper.ship("hello", &[]).await.unwrap();

    assert_eq!(delivery.status.as_u16(), 200);
    assert_eq!(delivery.attempts, 1);
    assert_eq!(delivery.raw_body, "");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_default_user_agent_names_the_crate() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header_regex("user-agent", "^logship/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let shipper = builder_for(&mock_server).build().unwrap();

    shipper.ship("hello", &[]).await.unwrap();
}

#[tokio::test]
async fn test_empty_record_is_sent_as_empty_object() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/inputs/abc123"))
        .and(body_string("{}"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let shipper = builder_for(&mock_server).build().unwrap();

    let delivery = shipper
        .ship(serde_json::Map::new(), &[])
        .await
        .unwrap();
    assert_eq!(delivery.attempts, 1);
}

#[tokio::test]
async fn test_callback_fires_once_after_retries() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    Mock::given(method("POST"))
        .respond_with(move |_req: &wiremock::Request| {
            if attempt_count_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(500)
            } else {
                ResponseTemplate::new(200).set_body_string("ok")
            }
        })
        .mount(&mock_server)
        .await;

    let shipper = builder_for(&mock_server)
        .backoff(fast_backoff(3))
        .build()
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let (tx, rx) = oneshot::channel();

    shipper.send_with("hello", &["svc:api"], move |result| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(result);
    });

    let delivery = rx.await.unwrap().unwrap();
    assert_eq!(delivery.attempts, 2);
    assert_eq!(delivery.raw_body, "ok");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_sends_are_independent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(5)
        .mount(&mock_server)
        .await;

    let shipper = builder_for(&mock_server).build().unwrap();

    let handles: Vec<_> = (0..5)
        .map(|i| shipper.send(format!("message {}", i), &["batch:1"]))
        .collect();

    for handle in handles {
        let delivery = handle.await.unwrap();
        assert_eq!(delivery.attempts, 1);
    }

    let mut bodies: Vec<String> = mock_server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .map(|request| String::from_utf8(request.body).unwrap())
        .collect();
    bodies.sort();
    assert_eq!(
        bodies,
        vec!["message 0", "message 1", "message 2", "message 3", "message 4"]
    );
}

#[tokio::test]
async fn test_token_change_applies_to_later_sends() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/inputs/rotated"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let shipper = builder_for(&mock_server).build().unwrap();
    shipper.set_token("rotated");

    shipper.ship("hello", &[]).await.unwrap();
}
