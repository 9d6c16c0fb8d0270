mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;

use common::*;
use stellar_adapter::create_app;
use stellar_adapter::services::{Job, JobQueue};

fn app(h: &Harness) -> (Router, mpsc::Receiver<Job>) {
    let (jobs, receiver) = JobQueue::channel(16);
    let state = h.components.app_state(jobs, ADAPTER_SECRET);
    (create_app(state, Duration::from_secs(5)), receiver)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Authorization", format!("Secret {}", ADAPTER_SECRET))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", format!("Secret {}", ADAPTER_SECRET))
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_needs_no_secret() {
    let h = harness().await;
    let (app, _rx) = app(&h);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_webhooks_reject_missing_or_wrong_secret() {
    let h = harness().await;
    let (app, _rx) = app(&h);

    let missing = app
        .clone()
        .oneshot(Request::builder().uri("/operating/account/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .oneshot(
            Request::builder()
                .uri("/operating/account/")
                .header("Authorization", "Secret nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(wrong).await;
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_user_account_returns_deposit_address() {
    let h = harness().await;
    let (app, _rx) = app(&h);

    let response = app
        .clone()
        .oneshot(post(
            "/user/account/",
            json!({ "user_id": "u-42", "metadata": { "username": "alice" } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["account_id"], "alice*example.com");
    assert_eq!(body["user_id"], "u-42");

    // Asking again returns the same mapping.
    let again = app
        .oneshot(post(
            "/user/account/",
            json!({ "user_id": "u-42", "metadata": { "username": "alice" } }),
        ))
        .await
        .unwrap();
    let body = json_body(again).await;
    assert_eq!(body["account_id"], "alice*example.com");
}

#[tokio::test]
async fn test_duplicate_send_is_requeued_only_while_unclaimed() {
    let h = harness().await;
    let (app, mut rx) = app(&h);
    let payload = json!({
        "tx_code": "TX100",
        "to_user": BOB,
        "amount": "500000000",
        "currency": "XLM",
    });
    let job = Job::Send {
        tx_code: "TX100".to_string(),
    };

    let first = app.clone().oneshot(post("/send/", payload.clone())).await.unwrap();
    let second = app.clone().oneshot(post("/send/", payload.clone())).await.unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(json_body(second).await["status"], "success");
    assert_eq!(rx.try_recv().unwrap(), job);
    assert_eq!(rx.try_recv().unwrap(), job);

    let stored = h.storage.outgoing.get("TX100").await.unwrap().unwrap();
    assert_eq!(stored.amount, 500_000_000);
    assert_eq!(stored.recipient, BOB);

    // Once a worker holds it, repeats are only acknowledged.
    assert!(h.storage.outgoing.claim("TX100").await.unwrap());
    let third = app.oneshot(post("/send/", payload)).await.unwrap();
    assert_eq!(third.status(), StatusCode::OK);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_send_validation_error_shape() {
    let h = harness().await;
    let (app, mut rx) = app(&h);

    let response = app
        .oneshot(post(
            "/send/",
            json!({ "tx_code": "TX1", "to_user": BOB, "amount": -5, "currency": "XLM" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("amount"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let h = harness().await;
    let (app, _rx) = app(&h);

    let request = Request::builder()
        .method("POST")
        .uri("/send/")
        .header("Authorization", format!("Secret {}", ADAPTER_SECRET))
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["status"], "error");
}

#[tokio::test]
async fn test_operating_account_and_balance() {
    let h = harness().await;
    let (app, _rx) = app(&h);

    let account = app.clone().oneshot(get("/operating/account/")).await.unwrap();
    assert_eq!(account.status(), StatusCode::OK);
    let body = json_body(account).await;
    assert_eq!(body["account_id"], SENDER);
    assert_eq!(body["network"], "testnet");
    assert!(body.get("secret").is_none());

    let balance = app.oneshot(get("/operating/balance/")).await.unwrap();
    assert_eq!(balance.status(), StatusCode::OK);
    assert_eq!(json_body(balance).await["balance"], 1_000_000_000i64);
}

#[tokio::test]
async fn test_add_asset_returns_issuer() {
    let h = harness().await;
    let (app, _rx) = app(&h);

    let response = app
        .oneshot(post(
            "/assets/add/",
            json!({ "code": "USD", "issuer": USD_ISSUER }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["issuer"], USD_ISSUER);
    assert_eq!(h.ledger.submitted().len(), 1);
}

#[tokio::test]
async fn test_add_asset_rejects_bad_code() {
    let h = harness().await;
    let (app, _rx) = app(&h);

    let response = app
        .oneshot(post(
            "/assets/add/",
            json!({ "code": "NOT-A-CODE!", "issuer": USD_ISSUER }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.ledger.submitted().is_empty());
}

#[tokio::test]
async fn test_platform_lifecycle_webhooks_are_acknowledged() {
    let h = harness().await;
    let (app, mut rx) = app(&h);

    for uri in ["/deposit/", "/withdraw/", "/purchase/"] {
        let response = app
            .clone()
            .oneshot(post(uri, json!({ "tx_code": "TX9" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "success");
    }
    assert!(rx.try_recv().is_err());
    assert!(h.ledger.submitted().is_empty());
}
