// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Diagnostics routes (debug builds of the app only).

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::DiagnosticEvent;
use crate::routes::api::ProductBody;
use crate::routes::{session_for, validate};
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/debug/initialize", post(initialize))
        .route("/debug/products", post(products))
        .route("/debug/balance", post(balance))
        .route("/debug/offers", post(offers))
        .route("/debug/purchase", post(purchase))
        .route("/debug/restore", post(restore))
        .route("/debug/events", get(events).delete(clear_events))
}

async fn initialize(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<DiagnosticEvent> {
    Json(session_for(&state, &user).diagnostics.trigger_initialize().await)
}

async fn products(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<DiagnosticEvent> {
    Json(session_for(&state, &user).diagnostics.trigger_products().await)
}

async fn balance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<DiagnosticEvent> {
    Json(session_for(&state, &user).diagnostics.trigger_balance().await)
}

async fn offers(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<DiagnosticEvent> {
    Json(session_for(&state, &user).diagnostics.trigger_offers().await)
}

async fn purchase(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ProductBody>,
) -> Result<Json<DiagnosticEvent>> {
    validate(&body)?;
    let session = session_for(&state, &user);
    Ok(Json(session.diagnostics.trigger_purchase(&body.product_id).await))
}

async fn restore(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<DiagnosticEvent> {
    Json(session_for(&state, &user).diagnostics.trigger_restore().await)
}

async fn events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<Vec<DiagnosticEvent>> {
    Json(session_for(&state, &user).diagnostics.events().await)
}

async fn clear_events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> StatusCode {
    session_for(&state, &user).diagnostics.clear().await;
    StatusCode::NO_CONTENT
}
