// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Purchase store provider.
//!
//! The platform purchase service is reached through a small local bridge
//! (the native app side) that speaks JSON over HTTP. The interactive
//! purchase call suspends until the user finishes with the store sheet.

use crate::models::{PurchaseProduct, StoreReceipt};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Non-standard status the bridge uses when the user dismisses the store UI.
const STATUS_CLIENT_CLOSED: u16 = 499;

/// Raw store failure, converted to the app taxonomy by the catalog and orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),

    #[error("purchase cancelled by user")]
    Cancelled,

    #[error("store rejected request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Connect to the platform purchase service.
    async fn initialize(&self) -> Result<(), StoreError>;

    async fn list_products(&self) -> Result<Vec<PurchaseProduct>, StoreError>;

    /// Start the interactive purchase flow and wait for the store's acknowledgment.
    async fn purchase(&self, product_id: &str) -> Result<StoreReceipt, StoreError>;

    /// Receipts the store still knows about (for re-verification after restart).
    async fn get_known_receipts(&self) -> Result<Vec<StoreReceipt>, StoreError>;
}

/// HTTP client for the native store bridge.
#[derive(Clone)]
pub struct StoreBridgeClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseBody<'a> {
    product_id: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PurchaseReply {
    Receipt(StoreReceipt),
    Status {
        status: String,
        #[serde(default)]
        message: Option<String>,
    },
}

impl StoreBridgeClient {
    /// No client-level timeout: callers bound each call themselves, since
    /// the purchase step waits on the user.
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("failed building store bridge HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.as_u16() == STATUS_CLIENT_CLOSED {
            return Err(StoreError::Cancelled);
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            return Err(StoreError::Unavailable(format!("HTTP {}: {}", status, body)));
        }
        Err(StoreError::Rejected(format!("HTTP {}: {}", status, body)))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, StoreError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Self::check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Rejected(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl PurchaseStore for StoreBridgeClient {
    async fn initialize(&self) -> Result<(), StoreError> {
        let url = format!("{}/initialize", self.base_url);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::check_response(response).await?;
        tracing::info!("Store bridge connection established");
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<PurchaseProduct>, StoreError> {
        self.get_json("/products").await
    }

    async fn purchase(&self, product_id: &str) -> Result<StoreReceipt, StoreError> {
        let url = format!("{}/purchase", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&PurchaseBody { product_id })
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let reply: PurchaseReply = Self::check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Rejected(format!("JSON parse error: {}", e)))?;

        match reply {
            PurchaseReply::Receipt(receipt) => Ok(receipt),
            PurchaseReply::Status { status, .. } if status == "cancelled" => {
                Err(StoreError::Cancelled)
            }
            PurchaseReply::Status { status, message } => Err(StoreError::Rejected(
                message.unwrap_or_else(|| format!("purchase ended with status {}", status)),
            )),
        }
    }

    async fn get_known_receipts(&self) -> Result<Vec<StoreReceipt>, StoreError> {
        self.get_json("/receipts").await
    }
}
