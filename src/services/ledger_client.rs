// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Points ledger backend API client.
//!
//! Handles:
//! - Balance and offer catalog reads
//! - Redemption (non-idempotent, never retried here)
//! - Store receipt verification (entitlement reconciliation)

use crate::models::{PointsBalance, RedemptionOffer, StoreReceipt};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw failure talking to the ledger backend.
///
/// Converted into [`crate::error::AppError`] by [`crate::services::PointsLedger`]
/// and the purchase orchestrator; never shown to the user as-is.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned {status}: {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl LedgerError {
    /// Failures worth retrying on the read/verify side.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Transport(_) => true,
            LedgerError::Rejected { status, .. } => *status == 429 || *status >= 500,
            LedgerError::Decode(_) => false,
        }
    }
}

/// Redeem response body. `code` classifies rejections when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReceiptResponse {
    pub entitlement_granted: bool,
}

/// Backend ledger and reconciliation endpoints.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn get_balance(&self, user_id: &str) -> Result<PointsBalance, LedgerError>;

    async fn list_offers(&self) -> Result<Vec<RedemptionOffer>, LedgerError>;

    async fn redeem(&self, user_id: &str, offer_id: &str) -> Result<RedeemResponse, LedgerError>;

    async fn verify_receipt(
        &self,
        user_id: &str,
        receipt: &StoreReceipt,
    ) -> Result<VerifyReceiptResponse, LedgerError>;
}

/// HTTP implementation of [`LedgerApi`].
#[derive(Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct RedeemBody<'a> {
    offer_id: &'a str,
}

#[derive(Serialize)]
struct VerifyBody<'a> {
    user_id: &'a str,
    receipt: &'a StoreReceipt,
}

/// Error body shape the backend uses for non-2xx responses.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "error")]
    code: Option<String>,
    #[serde(default, alias = "details")]
    message: Option<String>,
}

impl LedgerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building ledger HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Check response status and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, LedgerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
            let (code, message) = match parsed {
                Some(ErrorBody { code, message }) => (code, message.unwrap_or(body)),
                None => (None, body),
            };

            if status.as_u16() == 429 {
                tracing::warn!("Ledger backend rate limit hit (429)");
            }

            return Err(LedgerError::Rejected {
                status: status.as_u16(),
                code,
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

fn transport(e: reqwest::Error) -> LedgerError {
    LedgerError::Transport(e.to_string())
}

#[async_trait]
impl LedgerApi for LedgerClient {
    async fn get_balance(&self, user_id: &str) -> Result<PointsBalance, LedgerError> {
        let url = format!(
            "{}/users/{}/balance",
            self.base_url,
            urlencoding::encode(user_id)
        );
        let response = self.http.get(&url).send().await.map_err(transport)?;
        self.check_response_json(response).await
    }

    async fn list_offers(&self) -> Result<Vec<RedemptionOffer>, LedgerError> {
        let url = format!("{}/offers", self.base_url);
        let response = self.http.get(&url).send().await.map_err(transport)?;
        self.check_response_json(response).await
    }

    async fn redeem(&self, user_id: &str, offer_id: &str) -> Result<RedeemResponse, LedgerError> {
        let url = format!(
            "{}/users/{}/redeem",
            self.base_url,
            urlencoding::encode(user_id)
        );
        let response = self
            .http
            .post(&url)
            .json(&RedeemBody { offer_id })
            .send()
            .await
            .map_err(transport)?;
        self.check_response_json(response).await
    }

    async fn verify_receipt(
        &self,
        user_id: &str,
        receipt: &StoreReceipt,
    ) -> Result<VerifyReceiptResponse, LedgerError> {
        let url = format!("{}/receipts/verify", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&VerifyBody { user_id, receipt })
            .send()
            .await
            .map_err(transport)?;
        self.check_response_json(response).await
    }
}
