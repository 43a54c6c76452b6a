// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for the app shell: observable state and commands.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    OfferView, PurchaseAttempt, PurchaseProduct, RedemptionOutcome, RedemptionRequest,
};
use crate::routes::{session_for, validate};
use crate::services::session::{BalanceSnapshot, RefreshSummary};
use crate::services::RestoreSummary;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/balance", get(get_balance))
        .route("/api/offers", get(get_offers))
        .route("/api/refresh", post(refresh))
        .route("/api/redeem", post(redeem))
        .route("/api/redeem/select", post(select_redemption))
        .route("/api/redeem/confirm", post(confirm_redemption))
        .route("/api/redeem/cancel", post(cancel_redemption))
        .route("/api/products", get(get_products))
        .route("/api/purchase", post(purchase))
        .route("/api/purchase/state", get(get_purchase_state))
        .route("/api/purchase/verify", post(retry_verification))
        .route("/api/purchase/restore", post(restore_purchases))
}

// ─── Balance & Offers ────────────────────────────────────────

/// Fresh balance on every view activation.
async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<BalanceSnapshot>> {
    let session = session_for(&state, &user);
    Ok(Json(session.ctx.refresh_balance().await?))
}

async fn get_offers(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<OfferView>>> {
    let session = session_for(&state, &user);
    Ok(Json(session.redemptions.offer_views().await?))
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RefreshSummary>> {
    let session = session_for(&state, &user);
    Ok(Json(session.refresh().await?))
}

// ─── Redemption ──────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
struct OfferBody {
    #[validate(length(min = 1, max = 128))]
    offer_id: String,
}

async fn select_redemption(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<OfferBody>,
) -> Result<Json<RedemptionRequest>> {
    validate(&body)?;
    let session = session_for(&state, &user);
    Ok(Json(session.redemptions.select(&body.offer_id).await?))
}

async fn confirm_redemption(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RedemptionOutcome>> {
    let session = session_for(&state, &user);
    Ok(Json(session.redemptions.confirm().await?))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CancelResponse {
    pub cancelled: bool,
}

async fn cancel_redemption(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<CancelResponse> {
    let session = session_for(&state, &user);
    Json(CancelResponse {
        cancelled: session.redemptions.cancel().await,
    })
}

/// Select and confirm in one request.
async fn redeem(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<OfferBody>,
) -> Result<Json<RedemptionOutcome>> {
    validate(&body)?;
    let session = session_for(&state, &user);
    Ok(Json(session.redemptions.request_redeem(&body.offer_id).await?))
}

// ─── Purchases ───────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProductsResponse {
    pub products: Vec<PurchaseProduct>,
}

/// An empty store is a valid, displayable state.
async fn get_products(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProductsResponse>> {
    let session = session_for(&state, &user);
    let products = match session.purchases.list_products().await {
        Ok(products) => products,
        Err(AppError::EmptyCatalog) => Vec::new(),
        Err(e) => return Err(e),
    };
    Ok(Json(ProductsResponse { products }))
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ProductBody {
    #[validate(length(min = 1, max = 256))]
    pub(crate) product_id: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PurchaseResponse {
    pub attempt: PurchaseAttempt,
    pub entitlement_granted: bool,
}

/// A user cancellation is not an error: the final attempt state is returned
/// with `entitlement_granted: false` and no alert.
async fn purchase(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ProductBody>,
) -> Result<Json<PurchaseResponse>> {
    validate(&body)?;
    let session = session_for(&state, &user);
    match session.purchases.purchase(&body.product_id).await {
        Ok(attempt) => Ok(Json(PurchaseResponse {
            entitlement_granted: attempt.is_settled(),
            attempt,
        })),
        Err(e) if e.is_silent() => Ok(Json(PurchaseResponse {
            attempt: session.purchases.attempt(),
            entitlement_granted: false,
        })),
        Err(e) => Err(e),
    }
}

async fn retry_verification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ProductBody>,
) -> Result<Json<PurchaseResponse>> {
    validate(&body)?;
    let session = session_for(&state, &user);
    let attempt = session
        .purchases
        .retry_verification(&body.product_id)
        .await?;
    Ok(Json(PurchaseResponse {
        entitlement_granted: attempt.is_settled(),
        attempt,
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PurchaseStateResponse {
    pub attempt: PurchaseAttempt,
    pub unverified_products: Vec<String>,
}

async fn get_purchase_state(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<PurchaseStateResponse> {
    let session = session_for(&state, &user);
    Json(PurchaseStateResponse {
        attempt: session.purchases.attempt(),
        unverified_products: session.purchases.unverified_products(),
    })
}

async fn restore_purchases(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RestoreSummary>> {
    let session = session_for(&state, &user);
    Ok(Json(session.purchases.restore_purchases().await?))
}
