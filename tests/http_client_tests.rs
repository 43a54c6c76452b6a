// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wire-level tests for the ledger client and the store bridge client,
//! run against small local axum servers.

use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pickem_rewards::services::{
    LedgerApi, LedgerClient, LedgerError, PurchaseStore, StoreBridgeClient, StoreError,
};
use serde_json::{json, Value};
use std::time::Duration;

mod common;
use common::{receipt, spawn_server};

fn fake_backend() -> Router {
    Router::new()
        .route(
            "/users/{user_id}/balance",
            get(|Path(user_id): Path<String>| async move {
                if user_id != "user 42" {
                    return (StatusCode::NOT_FOUND, Json(json!({"error": "unknown_user"})));
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "totalPoints": 200,
                        "availablePoints": 150,
                        "pendingPoints": 50,
                        "lifetimeEarned": 900
                    })),
                )
            }),
        )
        .route(
            "/offers",
            get(|| async {
                Json(json!([
                    {
                        "id": "pro-day",
                        "points_cost": 100,
                        "reward_name": "Pro Day Pass",
                        "reward_description": "24 hours of Pro",
                        "upgrade_tier": "pro",
                        "duration_hours": 24
                    },
                    {
                        "id": "badge",
                        "points_cost": 20,
                        "reward_name": "Badge",
                        "upgrade_tier": null
                    }
                ]))
            }),
        )
        .route(
            "/users/{user_id}/redeem",
            post(|Json(body): Json<Value>| async move {
                match body["offer_id"].as_str() {
                    Some("pro-day") => (
                        StatusCode::OK,
                        Json(json!({"success": true, "message": "Enjoy Pro!"})),
                    ),
                    _ => (
                        StatusCode::PAYMENT_REQUIRED,
                        Json(json!({
                            "error": "insufficient_points",
                            "message": "You need 80 more points"
                        })),
                    ),
                }
            }),
        )
        .route(
            "/receipts/verify",
            post(|Json(body): Json<Value>| async move {
                let granted = body["receipt"]["transactionId"] == "txn-good"
                    && body["user_id"] == "user 42";
                Json(json!({"entitlement_granted": granted}))
            }),
        )
}

fn fake_bridge() -> Router {
    Router::new()
        .route("/initialize", post(|| async { StatusCode::NO_CONTENT }))
        .route("/products", get(|| async { Json(json!([])) }))
        .route(
            "/purchase",
            post(|Json(body): Json<Value>| async move {
                match body["productId"].as_str() {
                    Some("dismissed") => (StatusCode::from_u16(499).unwrap(), Json(json!({}))),
                    Some("backed-out") => (StatusCode::OK, Json(json!({"status": "cancelled"}))),
                    Some("pending") => (
                        StatusCode::OK,
                        Json(json!({"status": "deferred", "message": "Awaiting approval"})),
                    ),
                    Some("broken") => (StatusCode::BAD_GATEWAY, Json(json!({}))),
                    Some(id) => (
                        StatusCode::OK,
                        Json(json!({
                            "productId": id,
                            "transactionId": "txn-1",
                            "payload": "opaque",
                            "purchasedAt": "2026-03-01T12:00:00Z"
                        })),
                    ),
                    None => (StatusCode::BAD_REQUEST, Json(json!({}))),
                }
            }),
        )
        .route("/receipts", get(|| async { Json(json!([])) }))
}

#[tokio::test]
async fn test_ledger_client_reads() {
    let base = spawn_server(fake_backend()).await;
    let client = LedgerClient::new(&base, Duration::from_secs(5)).unwrap();

    // User IDs are path-encoded.
    let balance = client.get_balance("user 42").await.unwrap();
    assert_eq!(balance.available_points, 150);
    assert_eq!(balance.pending_points, 50);

    let err = client.get_balance("nobody").await.unwrap_err();
    assert!(matches!(err, LedgerError::Rejected { status: 404, .. }));
    assert!(!err.is_transient());

    let offers = client.list_offers().await.unwrap();
    assert_eq!(offers.len(), 2);
    assert_eq!(offers[0].duration_hours, Some(24));
    assert_eq!(offers[1].upgrade_tier, pickem_rewards::models::UpgradeTier::None);
}

#[tokio::test]
async fn test_ledger_client_redeem_and_verify() {
    let base = spawn_server(fake_backend()).await;
    let client = LedgerClient::new(&base, Duration::from_secs(5)).unwrap();

    let ok = client.redeem("user 42", "pro-day").await.unwrap();
    assert!(ok.success);
    assert_eq!(ok.message, "Enjoy Pro!");

    match client.redeem("user 42", "elite-week").await.unwrap_err() {
        LedgerError::Rejected {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 402);
            assert_eq!(code.as_deref(), Some("insufficient_points"));
            assert_eq!(message, "You need 80 more points");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let granted = client
        .verify_receipt("user 42", &receipt("com.app.premiumyearly", "txn-good"))
        .await
        .unwrap();
    assert!(granted.entitlement_granted);

    let denied = client
        .verify_receipt("user 42", &receipt("com.app.premiumyearly", "txn-forged"))
        .await
        .unwrap();
    assert!(!denied.entitlement_granted);
}

#[tokio::test]
async fn test_ledger_client_unreachable_is_transient() {
    let client = LedgerClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let err = client.list_offers().await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_store_bridge_purchase_outcomes() {
    let base = spawn_server(fake_bridge()).await;
    let bridge = StoreBridgeClient::new(&base).unwrap();

    bridge.initialize().await.unwrap();
    assert!(bridge.list_products().await.unwrap().is_empty());
    assert!(bridge.get_known_receipts().await.unwrap().is_empty());

    let receipt = bridge.purchase("com.app.premiumyearly").await.unwrap();
    assert_eq!(receipt.product_id, "com.app.premiumyearly");
    assert_eq!(receipt.transaction_id, "txn-1");

    assert_eq!(
        bridge.purchase("dismissed").await.unwrap_err(),
        StoreError::Cancelled
    );
    assert_eq!(
        bridge.purchase("backed-out").await.unwrap_err(),
        StoreError::Cancelled
    );
    assert_eq!(
        bridge.purchase("pending").await.unwrap_err(),
        StoreError::Rejected("Awaiting approval".to_string())
    );
    assert!(matches!(
        bridge.purchase("broken").await.unwrap_err(),
        StoreError::Unavailable(_)
    ));
}
