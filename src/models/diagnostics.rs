// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed diagnostic events for the debug panel.

use crate::error::{AppError, ErrorKind};
use crate::models::{PointsBalance, PurchaseAttempt, PurchaseProduct, RedemptionOffer};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One event per diagnostic kind, tagged by `kind` on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticPayload {
    Initialized,
    Products { products: Vec<PurchaseProduct> },
    Balance { balance: PointsBalance },
    Offers { offers: Vec<RedemptionOffer> },
    Purchase { attempt: PurchaseAttempt },
    Restore {
        checked: usize,
        granted: usize,
        denied: usize,
        failed: usize,
    },
    Error { error: ErrorKind, message: String },
}

impl From<&AppError> for DiagnosticPayload {
    fn from(err: &AppError) -> Self {
        DiagnosticPayload::Error {
            error: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEvent {
    pub at: DateTime<Utc>,
    /// Which manual trigger produced this event
    pub trigger: &'static str,
    #[serde(flatten)]
    pub payload: DiagnosticPayload,
}

impl DiagnosticEvent {
    pub fn new(trigger: &'static str, payload: DiagnosticPayload) -> Self {
        Self {
            at: Utc::now(),
            trigger,
            payload,
        }
    }
}
