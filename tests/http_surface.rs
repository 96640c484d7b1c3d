//! HTTP route tests against a live server on an ephemeral port

mod common;

use common::Harness;
use keywatch::server::{serve, AppState};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;

async fn start(h: &Harness) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState {
        pipeline: h.pipeline.clone(),
    };
    tokio::spawn(serve(listener, state, std::future::pending()));
    addr
}

#[tokio::test]
async fn test_health_reports_healthy() {
    let h = Harness::new(&[]);
    let addr = start(&h).await;

    let resp = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime"].is_u64());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_metrics_rereads_record_count() {
    let h = Harness::new(&[]);
    h.write_data("Private key: aa\nPrivate key: bb\n");
    let addr = start(&h).await;

    let body: Value = reqwest::get(format!("http://{}/metrics", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["recordsFound"], 2);
    assert_eq!(body["activeSubscribers"], 0);
}

#[tokio::test]
async fn test_status_includes_cached_balance() {
    let h = Harness::new(&[("aa", 123_456_789)]);
    h.write_data("Private key: aa\n");
    h.pipeline.on_file_changed().await.unwrap();
    let addr = start(&h).await;

    let body: Value = reqwest::get(format!("http://{}/status", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["balance"], "1.23");
    assert!(body["balanceUpdatedAt"].is_string());
    assert_eq!(body["subscribers"], 0);
    assert!(body["system"]["platform"].is_string());
    assert_eq!(body["metrics"]["recordsFound"], 1);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let h = Harness::new(&[]);
    let addr = start(&h).await;

    let resp = reqwest::get(format!("http://{}/nope", addr)).await.unwrap();
    assert_eq!(resp.status(), 404);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Route not found");
}
