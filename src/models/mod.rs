// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod attempt;
pub mod balance;
pub mod diagnostics;
pub mod offer;
pub mod product;
pub mod redemption;

pub use attempt::{AttemptState, PurchaseAttempt};
pub use balance::PointsBalance;
pub use diagnostics::{DiagnosticEvent, DiagnosticPayload};
pub use offer::{OfferView, RedemptionOffer, UpgradeTier};
pub use product::{PurchaseProduct, StoreReceipt};
pub use redemption::{RedemptionOutcome, RedemptionRequest, RedemptionResult, RedemptionState};
