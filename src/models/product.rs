// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Store products and purchase receipts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A purchasable subscription as listed by the store.
///
/// Snapshot owned by the store; the client copy is advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PurchaseProduct {
    pub product_id: String,
    pub localized_price: String,
    pub currency: String,
    pub localized_title: String,
    #[serde(default)]
    pub localized_description: String,
}

/// Opaque proof of purchase issued by the store, replayable for verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreReceipt {
    pub product_id: String,
    pub transaction_id: String,
    /// Platform-specific receipt payload, passed through untouched
    pub payload: String,
    pub purchased_at: DateTime<Utc>,
}
