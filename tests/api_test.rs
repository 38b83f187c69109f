//! HTTP API Tests
//!
//! Drive the router end to end against an in-memory ledger and record store.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, SecondsFormat, Utc};
use log_ledger::api::{router, AppState};
use log_ledger::ledger::{IntegrityVerifier, Ledger, LogIngestor};
use log_ledger::logs::LogStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

mod common;
use common::*;

async fn setup_app() -> (Router, Arc<Ledger>, LogStore) {
    let (ledger, _) = setup_test_ledger().await;
    let records = LogStore::new_in_memory().await.unwrap();
    let state = AppState {
        ingestor: LogIngestor::new(ledger.clone(), records.clone()),
        verifier: IntegrityVerifier::new(ledger.clone(), Arc::new(records.clone())),
        records: records.clone(),
    };
    (router(state), ledger, records)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_log(app: &Router, body: Value) -> (StatusCode, Value) {
    let request = Request::post("/logs")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

fn security_log(message: &str, anomaly: bool) -> Value {
    json!({
        "type": "security",
        "severity": "high",
        "message": message,
        "source": "auth-service",
        "ip": "203.0.113.9",
        "is_anomaly": anomaly
    })
}

#[tokio::test]
async fn test_health() {
    let (app, _, _) = setup_app().await;
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_create_and_fetch_log() {
    let (app, ledger, _) = setup_app().await;

    let (status, body) = post_log(&app, security_log("Failed login", false)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = get(&app, &format!("/logs/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "Failed login");
    assert_eq!(ledger.pending_count().await, 1);
}

#[tokio::test]
async fn test_invalid_log_rejected() {
    let (app, ledger, _) = setup_app().await;
    let (status, body) = post_log(&app, security_log("   ", false)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(ledger.pending_count().await, 0);
}

#[tokio::test]
async fn test_unknown_log_is_404() {
    let (app, _, _) = setup_app().await;
    let (status, _) = get(&app, "/logs/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_verify_flow() {
    let (app, ledger, records) = setup_app().await;

    let mut ids = Vec::new();
    for i in 0..5 {
        let (_, body) = post_log(&app, security_log(&format!("event {}", i), false)).await;
        ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }
    assert_eq!(ledger.len().await, 2);

    let (status, body) = get(&app, &format!("/logs/{}/verify", ids[2])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["verified"], true);

    // Edit the stored record behind the ledger's back
    let mut record = records.get(&ids[2]).await.unwrap().unwrap();
    record.message = "nothing to see here".to_string();
    assert!(records.replace_document(&record).await.unwrap());

    let (_, body) = get(&app, &format!("/logs/{}/verify", ids[2])).await;
    assert_eq!(body["data"]["verified"], false);

    let (_, body) = get(&app, "/logs/unknown-id/verify").await;
    assert_eq!(body["data"]["verified"], false);
}

#[tokio::test]
async fn test_status_endpoint() {
    let (app, _, _) = setup_app().await;
    for i in 0..6 {
        post_log(&app, security_log(&format!("event {}", i), false)).await;
    }

    let (status, body) = get(&app, "/ledger/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["chain_length"], 2);
    assert_eq!(body["data"]["is_valid"], true);
    assert_eq!(body["data"]["pending_count"], 1);
    assert_eq!(body["data"]["last_block"]["index"], 1);
}

#[tokio::test]
async fn test_list_and_anomalies() {
    let (app, _, _) = setup_app().await;
    post_log(&app, security_log("normal", false)).await;
    post_log(&app, security_log("odd", true)).await;
    post_log(
        &app,
        json!({"type": "access", "severity": "low", "message": "GET /", "source": "gateway"}),
    )
    .await;

    let (status, body) = get(&app, "/logs?type=security&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);

    let (_, body) = get(&app, "/logs?severity=low").await;
    assert_eq!(body["data"]["total"], 1);

    let (_, body) = get(&app, "/logs/anomalies").await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["logs"][0]["message"], "odd");

    let (_, body) = get(&app, "/logs?page=2&limit=2").await;
    assert_eq!(body["data"]["page"], 2);
    assert_eq!(body["data"]["pages"], 2);
    assert_eq!(body["data"]["logs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_by_date_range() {
    let (app, _, _) = setup_app().await;
    post_log(&app, security_log("first", false)).await;
    post_log(&app, security_log("second", false)).await;

    let stamp = |offset: Duration| (Utc::now() + offset).to_rfc3339_opts(SecondsFormat::Millis, true);

    let uri = format!("/logs?startDate={}&endDate={}", stamp(-Duration::hours(1)), stamp(Duration::hours(1)));
    let (status, body) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);

    let (_, body) = get(&app, &format!("/logs?startDate={}", stamp(Duration::hours(1)))).await;
    assert_eq!(body["data"]["total"], 0);

    let (_, body) = get(&app, &format!("/logs?endDate={}", stamp(-Duration::hours(1)))).await;
    assert_eq!(body["data"]["total"], 0);
}
