// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Purchase attempt state machine.
//!
//! `idle → initializing → fetching_catalog → purchasing → verifying → settled`,
//! with `failed` reachable from every non-terminal state. States are never
//! re-entered; a failed attempt is discarded and the next one starts at `idle`.

use crate::error::{AppError, ErrorKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum AttemptState {
    Idle,
    Initializing,
    FetchingCatalog,
    Purchasing,
    Verifying,
    Settled,
    Failed,
}

impl AttemptState {
    /// The single forward successor, if any.
    fn successor(self) -> Option<AttemptState> {
        match self {
            AttemptState::Idle => Some(AttemptState::Initializing),
            AttemptState::Initializing => Some(AttemptState::FetchingCatalog),
            AttemptState::FetchingCatalog => Some(AttemptState::Purchasing),
            AttemptState::Purchasing => Some(AttemptState::Verifying),
            AttemptState::Verifying => Some(AttemptState::Settled),
            AttemptState::Settled | AttemptState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptState::Settled | AttemptState::Failed)
    }
}

/// A single purchase attempt. Transient, never persisted.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PurchaseAttempt {
    pub state: AttemptState,
    pub product_id: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub started_at: DateTime<Utc>,
    pub error: Option<ErrorKind>,
}

impl Default for PurchaseAttempt {
    fn default() -> Self {
        Self {
            state: AttemptState::Idle,
            product_id: None,
            started_at: Utc::now(),
            error: None,
        }
    }
}

impl PurchaseAttempt {
    /// Fresh attempt for a product, at `idle`.
    pub fn new(product_id: &str) -> Self {
        Self {
            product_id: Some(product_id.to_string()),
            ..Self::default()
        }
    }

    /// Attempt that replays a cached receipt: the store steps already
    /// happened in an earlier attempt, so it starts at `verifying`.
    pub fn resume_verification(product_id: &str) -> Self {
        Self {
            state: AttemptState::Verifying,
            ..Self::new(product_id)
        }
    }

    /// Move to the next state. Skipping or re-entering a state is a bug.
    pub fn advance(&mut self, next: AttemptState) -> Result<(), AppError> {
        if self.state.successor() != Some(next) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "invalid purchase transition {:?} -> {:?}",
                self.state,
                next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Mark the attempt failed. No-op once terminal.
    pub fn fail(&mut self, kind: ErrorKind) {
        if self.state.is_terminal() {
            return;
        }
        self.state = AttemptState::Failed;
        self.error = Some(kind);
    }

    pub fn is_settled(&self) -> bool {
        self.state == AttemptState::Settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_happy_path() {
        let mut attempt = PurchaseAttempt::new("com.app.premiumyearly");
        for next in [
            AttemptState::Initializing,
            AttemptState::FetchingCatalog,
            AttemptState::Purchasing,
            AttemptState::Verifying,
            AttemptState::Settled,
        ] {
            attempt.advance(next).unwrap();
        }
        assert!(attempt.is_settled());
        assert!(attempt.state.is_terminal());
    }

    #[test]
    fn test_no_skipping_or_reentry() {
        let mut attempt = PurchaseAttempt::new("p");
        assert!(attempt.advance(AttemptState::Purchasing).is_err());
        attempt.advance(AttemptState::Initializing).unwrap();
        assert!(attempt.advance(AttemptState::Initializing).is_err());
        assert!(attempt.advance(AttemptState::Idle).is_err());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut attempt = PurchaseAttempt::new("p");
        attempt.advance(AttemptState::Initializing).unwrap();
        attempt.fail(ErrorKind::StoreUnavailable);
        assert_eq!(attempt.state, AttemptState::Failed);
        assert!(attempt.advance(AttemptState::FetchingCatalog).is_err());

        attempt.fail(ErrorKind::UserCancelled);
        assert_eq!(attempt.error, Some(ErrorKind::StoreUnavailable));
    }

    #[test]
    fn test_settled_cannot_fail() {
        let mut attempt = PurchaseAttempt::resume_verification("p");
        attempt.advance(AttemptState::Settled).unwrap();
        attempt.fail(ErrorKind::ReconciliationFailed);
        assert!(attempt.is_settled());
        assert_eq!(attempt.error, None);
    }
}
