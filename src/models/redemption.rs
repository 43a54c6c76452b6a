// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Redemption request lifecycle and results.

use crate::models::PointsBalance;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum RedemptionState {
    Confirming,
    Submitting,
    Succeeded,
    Failed,
}

/// A redemption the user has selected. Transient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RedemptionRequest {
    pub offer_id: String,
    pub user_id: String,
    pub state: RedemptionState,
}

impl RedemptionRequest {
    pub fn new(user_id: &str, offer_id: &str) -> Self {
        Self {
            offer_id: offer_id.to_string(),
            user_id: user_id.to_string(),
            state: RedemptionState::Confirming,
        }
    }
}

/// Backend response to a redeem call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RedemptionResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// What the user sees after a confirmed redemption succeeds.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RedemptionOutcome {
    pub request: RedemptionRequest,
    pub result: RedemptionResult,
    /// Balance re-fetched after the redeem call (None if the refresh failed)
    pub balance: Option<PointsBalance>,
}
