// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Store and backend failures are converted into this taxonomy at the
//! catalog/ledger boundary; nothing above that layer sees transport errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Purchase service is not initialized")]
    NotInitialized,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("No products are available right now")]
    EmptyCatalog,

    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    /// Carries the server message verbatim when the backend rejected the offer.
    #[error("{0}")]
    UnknownOffer(String),

    #[error("Purchase cancelled")]
    UserCancelled,

    /// Carries the server message verbatim, or the client-side shortfall.
    #[error("{0}")]
    InsufficientPoints(String),

    #[error("{0}")]
    ReconciliationFailed(String),

    #[error("{0}")]
    TransientError(String),

    #[error("A redemption is already in progress")]
    RedemptionInProgress,

    #[error("A purchase is already in progress")]
    PurchaseInProgress,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Serializable discriminant of [`AppError`], used in attempt state and
/// diagnostics where the message is not needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ErrorKind {
    Unauthorized,
    BadRequest,
    NotInitialized,
    StoreUnavailable,
    EmptyCatalog,
    UnknownProduct,
    UnknownOffer,
    UserCancelled,
    InsufficientPoints,
    ReconciliationFailed,
    TransientError,
    RedemptionInProgress,
    PurchaseInProgress,
    Internal,
}

impl AppError {
    /// Message shown when a purchase reached the store but the server could
    /// not be reached to confirm it.
    pub const RETRY_VERIFICATION_LATER: &'static str =
        "Your purchase went through but could not be confirmed yet. \
         Please try again later; you will not be charged again.";

    /// Generic message for network/backend failures (raw errors are logged, not shown).
    pub const NETWORK_UNAVAILABLE: &'static str =
        "We couldn't reach the server. Please try again.";

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Unauthorized => ErrorKind::Unauthorized,
            AppError::BadRequest(_) => ErrorKind::BadRequest,
            AppError::NotInitialized => ErrorKind::NotInitialized,
            AppError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            AppError::EmptyCatalog => ErrorKind::EmptyCatalog,
            AppError::UnknownProduct(_) => ErrorKind::UnknownProduct,
            AppError::UnknownOffer(_) => ErrorKind::UnknownOffer,
            AppError::UserCancelled => ErrorKind::UserCancelled,
            AppError::InsufficientPoints(_) => ErrorKind::InsufficientPoints,
            AppError::ReconciliationFailed(_) => ErrorKind::ReconciliationFailed,
            AppError::TransientError(_) => ErrorKind::TransientError,
            AppError::RedemptionInProgress => ErrorKind::RedemptionInProgress,
            AppError::PurchaseInProgress => ErrorKind::PurchaseInProgress,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Errors the user should never see an alert for.
    pub fn is_silent(&self) -> bool {
        matches!(self, AppError::UserCancelled)
    }

    /// Errors for which the UI offers a retry action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransientError(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::UserCancelled => return StatusCode::NO_CONTENT.into_response(),
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotInitialized | AppError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::EmptyCatalog | AppError::UnknownProduct(_) | AppError::UnknownOffer(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::InsufficientPoints(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::ReconciliationFailed(_) | AppError::TransientError(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::RedemptionInProgress | AppError::PurchaseInProgress => StatusCode::CONFLICT,
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let details = match &self {
            AppError::Internal(_) => None,
            other => Some(other.to_string()),
        };

        let body = ErrorResponse {
            error: self.kind(),
            details,
            retryable: self.is_retryable(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers and services
pub type Result<T> = std::result::Result<T, AppError>;
