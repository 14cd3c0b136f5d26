//! HTTP API tests driven through the router without a listening socket

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::{analyzer, healthy_zone};
use mailsec_rs::api::ApiServer;
use mailsec_rs::security::InMemoryRateLimitStore;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn router_with_limit(max_requests: u32) -> Router {
    let store = Arc::new(InMemoryRateLimitStore::new(
        max_requests,
        Duration::from_secs(60),
    ));
    ApiServer::with_rate_limiter(analyzer(healthy_zone()), store, "127.0.0.1:0".to_string())
        .router()
}

fn router() -> Router {
    router_with_limit(100)
}

fn check(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_check_dmarc() {
    let response = router()
        .oneshot(check("/api/check/dmarc", r#"{"domain": "https://www.Example.com/contact"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["domain"], "example.com");
    assert_eq!(body["recordName"], "_dmarc.example.com");
    assert_eq!(body["score"]["value"], 10.0);
    assert_eq!(body["score"]["outOf"], 10.0);
    assert_eq!(body["score"]["level"], "Excellent");
    assert_eq!(body["parsed"]["p"], "reject");
    assert_eq!(body["parsed"]["pct"], 100);
    assert!(body["explanations"]["adkim"].is_string());
}

#[tokio::test]
async fn test_check_spf_lists_mechanisms() {
    let response = router()
        .oneshot(check("/api/check/spf", r#"{"domain": "example.com"}"#))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["parsed"][0], "include:_spf.google.com");
    assert_eq!(body["parsed"][1], "~all");
    assert_eq!(body["score"]["level"], "Good");
}

#[tokio::test]
async fn test_check_dkim_unknown_selector() {
    let response = router()
        .oneshot(check(
            "/api/check/dkim",
            r#"{"domain": "example.com", "selector": "nope"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "DKIM record not found");
    assert!(body.get("score").is_none());
    assert!(!body["recommendations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_check_mx() {
    let response = router()
        .oneshot(check("/api/check/mx", r#"{"domain": "example.com"}"#))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["parsed"][0]["exchange"], "mx.example.com");
    assert_eq!(body["parsed"][0]["priority"], 10);
}

#[tokio::test]
async fn test_check_all() {
    let response = router()
        .oneshot(check("/api/check/all", r#"{"domain": "example.com"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["overallScore"]["value"], 9.3);
    assert_eq!(body["overallScore"]["outOf"], 10.0);
    assert_eq!(body["possiblePoints"], 23.0);
    assert!(body["checkedAt"].is_string());
    for protocol in ["dmarc", "spf", "dkim", "mx"] {
        assert_eq!(body[protocol]["success"], true, "{} failed", protocol);
    }
}

#[tokio::test]
async fn test_invalid_domain_is_rejected() {
    let response = router()
        .oneshot(check("/api/check/spf", r#"{"domain": "not a domain"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_rate_limit() {
    let app = router_with_limit(2);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(check("/api/check/mx", r#"{"domain": "example.com"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(check("/api/check/mx", r#"{"domain": "example.com"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Health checks are not rate limited
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
