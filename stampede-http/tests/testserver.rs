use std::time::Duration;

use serde::Deserialize;
use stampede_http::{HttpClient, HttpRequest, TransportErrorKind, Method};
use stampede_testserver::TestServer;

#[derive(Debug, Deserialize)]
struct Health {
    status: String,
}

#[tokio::test]
async fn get_health_returns_json_and_timing() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start server: {e}"));
    let client = HttpClient::default();

    let inv = client.get(&server.url("/api/health")).await;

    let res = inv
        .response()
        .unwrap_or_else(|| panic!("request failed: {:?}", inv.error()));
    assert_eq!(res.status, 200);
    assert!(
        res.header("content-type")
            .is_some_and(|v| v.starts_with("application/json"))
    );
    let body: Health = res.json().unwrap_or_else(|e| panic!("decode: {e}"));
    assert_eq!(body.status, "ok");
    assert!(inv.duration > Duration::ZERO);
    assert_eq!(server.stats().health_requests(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn error_status_is_a_response_but_counts_as_failed() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start server: {e}"));
    let client = HttpClient::default();

    let inv = client.get(&server.url("/status/503")).await;
    assert_eq!(inv.status(), Some(503));
    assert!(inv.is_failed());

    server.shutdown().await;
}

#[tokio::test]
async fn post_with_headers_and_body_is_validated_by_target() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start server: {e}"));
    let client = HttpClient::default();

    let ok = client
        .invoke(
            HttpRequest::post(
                server.url("/api/users"),
                r#"{"name":"Ada","email":"ada@example.com"}"#,
            )
            .with_header("content-type", "application/json"),
        )
        .await;
    assert_eq!(ok.status(), Some(200));
    assert!(
        ok.response()
            .and_then(|r| r.body_utf8())
            .is_some_and(|b| b.contains("\"success\":true"))
    );

    let bad = client
        .invoke(HttpRequest::new(Method::POST, server.url("/api/users")).with_body("{}"))
        .await;
    assert_eq!(bad.status(), Some(400));
    assert_eq!(server.stats().rejected_users(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn per_request_timeout_covers_slow_responses() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start server: {e}"));
    let client = HttpClient::default();

    let inv = client
        .invoke(
            HttpRequest::get(server.url("/slow?ms=1000")).with_timeout(Duration::from_millis(50)),
        )
        .await;

    let kind = inv.error().map(|e| e.transport_error_kind());
    assert_eq!(kind, Some(TransportErrorKind::Timeout));
    assert!(inv.duration < Duration::from_millis(900));

    server.shutdown().await;
}
