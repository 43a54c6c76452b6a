// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Points ledger: balance reads, offer catalog and redemption.
//!
//! The backend is authoritative. Balances are never adjusted locally; the
//! only way to learn the new balance after a mutation is to fetch it.

use crate::error::{AppError, Result};
use crate::models::{PointsBalance, RedemptionOffer, RedemptionResult};
use crate::services::ledger_client::{LedgerApi, LedgerError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub const CODE_INSUFFICIENT_POINTS: &str = "insufficient_points";
pub const CODE_UNKNOWN_OFFER: &str = "unknown_offer";

/// Convert a raw ledger failure into the app taxonomy (read side).
pub(crate) fn from_ledger_error(err: LedgerError) -> AppError {
    tracing::warn!(error = %err, "Ledger call failed");
    AppError::TransientError(AppError::NETWORK_UNAVAILABLE.to_string())
}

/// Classify a rejected redemption, keeping the server message verbatim.
fn classify_rejection(status: u16, code: Option<&str>, message: String) -> AppError {
    if status >= 500 || message.trim().is_empty() {
        return from_ledger_error(LedgerError::Rejected {
            status,
            code: code.map(str::to_string),
            message,
        });
    }

    match (code, status) {
        (Some(CODE_INSUFFICIENT_POINTS), _) | (None, 402) | (None, 409) => {
            AppError::InsufficientPoints(message)
        }
        (Some(CODE_UNKNOWN_OFFER), _) | (None, 404) => AppError::UnknownOffer(message),
        _ => AppError::TransientError(message),
    }
}

/// Session-scoped view of the backend ledger.
pub struct PointsLedger {
    api: Arc<dyn LedgerApi>,
    /// Offers are immutable for a session; cached after the first fetch.
    offers: RwLock<Option<Vec<RedemptionOffer>>>,
    timeout: Duration,
}

impl PointsLedger {
    pub fn new(api: Arc<dyn LedgerApi>, timeout: Duration) -> Self {
        Self {
            api,
            offers: RwLock::new(None),
            timeout,
        }
    }

    /// Bound a backend call; elapsed time counts as a transport failure.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, LedgerError>>,
    ) -> std::result::Result<T, LedgerError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or_else(|_| Err(LedgerError::Transport("request timed out".to_string())))
    }

    /// Current backend balance snapshot for a user.
    pub async fn get_balance(&self, user_id: &str) -> Result<PointsBalance> {
        let balance = self
            .bounded(self.api.get_balance(user_id))
            .await
            .map_err(from_ledger_error)?;

        if let Err(detail) = balance.check_consistency() {
            tracing::error!(user_id, detail = %detail, "Ledger returned inconsistent balance");
            return Err(AppError::TransientError(
                AppError::NETWORK_UNAVAILABLE.to_string(),
            ));
        }

        Ok(balance)
    }

    /// Redeemable offers, from the session cache when available.
    pub async fn list_offers(&self) -> Result<Vec<RedemptionOffer>> {
        if let Some(offers) = self.offers.read().await.as_ref() {
            return Ok(offers.clone());
        }
        self.refresh_offers().await
    }

    /// Re-fetch the offer catalog, dropping malformed entries.
    pub async fn refresh_offers(&self) -> Result<Vec<RedemptionOffer>> {
        let fetched = self
            .bounded(self.api.list_offers())
            .await
            .map_err(from_ledger_error)?;

        let total = fetched.len();
        let offers: Vec<RedemptionOffer> = fetched
            .into_iter()
            .filter(|offer| {
                let ok = offer.is_well_formed();
                if !ok {
                    tracing::warn!(offer_id = %offer.id, "Dropping malformed redemption offer");
                }
                ok
            })
            .collect();

        tracing::debug!(count = offers.len(), dropped = total - offers.len(), "Offers refreshed");
        *self.offers.write().await = Some(offers.clone());
        Ok(offers)
    }

    /// Look up an offer in the session cache (fetching it if needed).
    pub async fn find_offer(&self, offer_id: &str) -> Result<Option<RedemptionOffer>> {
        Ok(self
            .list_offers()
            .await?
            .into_iter()
            .find(|offer| offer.id == offer_id))
    }

    /// Ask the backend to redeem an offer. Issued exactly once: the server
    /// does not promise idempotency, so this is never retried.
    pub async fn redeem(&self, user_id: &str, offer_id: &str) -> Result<RedemptionResult> {
        let response = match self.bounded(self.api.redeem(user_id, offer_id)).await {
            Ok(response) => response,
            Err(LedgerError::Rejected {
                status,
                code,
                message,
            }) => return Err(classify_rejection(status, code.as_deref(), message)),
            Err(e) => return Err(from_ledger_error(e)),
        };

        if !response.success {
            return Err(classify_rejection(
                200,
                response.code.as_deref(),
                response.message,
            ));
        }

        tracing::info!(user_id, offer_id, "Redemption accepted by ledger");
        Ok(RedemptionResult {
            success: true,
            message: response.message,
        })
    }
}
