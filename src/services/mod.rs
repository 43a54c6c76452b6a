// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod catalog;
pub mod diagnostics;
pub mod ledger;
pub mod ledger_client;
pub mod purchase;
pub mod redemption;
pub mod session;
pub mod store;

pub use catalog::ProductCatalog;
pub use diagnostics::DiagnosticsReporter;
pub use ledger::PointsLedger;
pub use ledger_client::{
    LedgerApi, LedgerClient, LedgerError, RedeemResponse, VerifyReceiptResponse,
};
pub use purchase::{PurchaseOrchestrator, RestoreSummary};
pub use redemption::RedemptionController;
pub use session::{
    BalanceCache, BalanceSnapshot, MutationGate, Session, SessionContext, SessionRegistry,
    SessionSettings,
};
pub use store::{PurchaseStore, StoreBridgeClient, StoreError};
