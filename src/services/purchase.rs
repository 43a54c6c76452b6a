// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Purchase orchestration: store purchase followed by backend reconciliation.
//!
//! A store acknowledgment alone never grants entitlement. The attempt only
//! reaches `settled` once the backend confirms the receipt. Receipts are
//! cached as soon as the store returns them so verification can be
//! replayed without charging the user again.

use crate::error::{AppError, Result};
use crate::models::{AttemptState, PurchaseAttempt, PurchaseProduct, StoreReceipt};
use crate::services::catalog::{from_store_error, store_timed_out, ProductCatalog};
use crate::services::ledger_client::{LedgerApi, LedgerError};
use crate::services::session::{SessionContext, SessionSettings};
use crate::services::store::PurchaseStore;
use dashmap::DashMap;
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};

const RESTORE_CONCURRENCY: usize = 4;

/// Longest single wait between verification attempts.
const MAX_VERIFY_BACKOFF: Duration = Duration::from_secs(30);

const VERIFICATION_DENIED: &str =
    "Your purchase could not be verified. Please contact support.";

/// Outcome of re-verifying known receipts after a restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    pub checked: usize,
    pub granted: usize,
    pub denied: usize,
    /// Could not be verified now; kept cached for a later retry
    pub failed: usize,
}

/// Drives purchase attempts for one session.
#[derive(Clone)]
pub struct PurchaseOrchestrator {
    ctx: SessionContext,
    catalog: Arc<ProductCatalog>,
    store: Arc<dyn PurchaseStore>,
    verifier: Arc<dyn LedgerApi>,
    /// Store-acknowledged receipts awaiting reconciliation, by transaction ID.
    /// Renewals give one product several receipts.
    receipts: Arc<DashMap<String, StoreReceipt>>,
    attempt: Arc<watch::Sender<PurchaseAttempt>>,
    /// One attempt at a time per session
    running: Arc<Mutex<()>>,
    settings: SessionSettings,
}

impl PurchaseOrchestrator {
    pub fn new(
        ctx: SessionContext,
        catalog: Arc<ProductCatalog>,
        store: Arc<dyn PurchaseStore>,
        verifier: Arc<dyn LedgerApi>,
        settings: SessionSettings,
    ) -> Self {
        let (attempt, _rx) = watch::channel(PurchaseAttempt::default());
        Self {
            ctx,
            catalog,
            store,
            verifier,
            receipts: Arc::new(DashMap::new()),
            attempt: Arc::new(attempt),
            running: Arc::new(Mutex::new(())),
            settings,
        }
    }

    /// Connect to the store. Concurrent callers share one handshake.
    pub async fn initialize(&self) -> Result<()> {
        self.catalog.initialize().await
    }

    /// Initialize if needed and fetch the current subscription list.
    pub async fn list_products(&self) -> Result<Vec<PurchaseProduct>> {
        self.catalog.initialize().await?;
        self.catalog.list_subscriptions().await
    }

    /// Latest attempt state.
    pub fn attempt(&self) -> PurchaseAttempt {
        self.attempt.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PurchaseAttempt> {
        self.attempt.subscribe()
    }

    /// Whether a purchase, retry or restore is running.
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Products with a store receipt that has not been reconciled yet.
    pub fn unverified_products(&self) -> Vec<String> {
        let mut products: Vec<String> =
            self.receipts.iter().map(|r| r.product_id.clone()).collect();
        products.sort();
        products.dedup();
        products
    }

    /// Oldest unverified receipt for a product.
    fn cached_receipt(&self, product_id: &str) -> Option<StoreReceipt> {
        self.receipts
            .iter()
            .filter(|r| r.product_id == product_id)
            .min_by_key(|r| r.purchased_at)
            .map(|r| r.value().clone())
    }

    fn publish(&self, attempt: &PurchaseAttempt) {
        self.attempt.send_replace(attempt.clone());
    }

    fn step(&self, attempt: &mut PurchaseAttempt, next: AttemptState) -> Result<()> {
        attempt.advance(next)?;
        tracing::debug!(
            user_id = %self.ctx.user_id,
            state = ?next,
            "Purchase attempt advanced"
        );
        self.publish(attempt);
        Ok(())
    }

    fn fail(&self, attempt: &mut PurchaseAttempt, err: AppError) -> AppError {
        attempt.fail(err.kind());
        self.publish(attempt);
        if err.is_silent() {
            tracing::info!(
                user_id = %self.ctx.user_id,
                product_id = ?attempt.product_id,
                "Purchase cancelled by user"
            );
        } else {
            tracing::warn!(
                user_id = %self.ctx.user_id,
                product_id = ?attempt.product_id,
                error = %err,
                "Purchase attempt failed"
            );
        }
        err
    }

    /// Best-effort balance refresh after the store step failed.
    async fn refresh_after_failure(&self) {
        if let Err(e) = self.ctx.refresh_balance().await {
            tracing::debug!(
                user_id = %self.ctx.user_id,
                error = %e,
                "Balance refresh after failed purchase failed"
            );
        }
    }

    fn try_start(&self) -> Result<OwnedMutexGuard<()>> {
        self.running
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::PurchaseInProgress)
    }

    /// Buy a product from the last fetched catalog.
    ///
    /// Cancellation by the user surfaces as `Err(UserCancelled)` with the
    /// attempt at `failed`; callers should not alert on it.
    pub async fn purchase(&self, product_id: &str) -> Result<PurchaseAttempt> {
        let running = self.try_start()?;

        // An earlier attempt was charged but never reconciled: replay it
        // instead of sending the user back to the store.
        if let Some(receipt) = self.cached_receipt(product_id) {
            tracing::info!(
                user_id = %self.ctx.user_id,
                product_id,
                "Replaying cached receipt instead of purchasing again"
            );
            let attempt = PurchaseAttempt::resume_verification(product_id);
            self.publish(&attempt);
            return self.settle_detached(running, attempt, receipt).await;
        }

        let mut attempt = PurchaseAttempt::new(product_id);
        self.publish(&attempt);
        tracing::info!(user_id = %self.ctx.user_id, product_id, "Starting purchase attempt");

        self.step(&mut attempt, AttemptState::Initializing)?;
        if let Err(e) = self.catalog.initialize().await {
            return Err(self.fail(&mut attempt, e));
        }

        self.step(&mut attempt, AttemptState::FetchingCatalog)?;
        let mut product = self.catalog.find(product_id).await;
        if product.is_none() {
            // No snapshot yet, or one that predates a catalog change.
            match self.catalog.list_subscriptions().await {
                Ok(_) | Err(AppError::EmptyCatalog) => {}
                Err(e) => return Err(self.fail(&mut attempt, e)),
            }
            product = self.catalog.find(product_id).await;
        }
        if product.is_none() {
            return Err(self.fail(
                &mut attempt,
                AppError::UnknownProduct(product_id.to_string()),
            ));
        }

        self.step(&mut attempt, AttemptState::Purchasing)?;
        let purchase = self.store.purchase(product_id);
        let receipt = match tokio::time::timeout(self.settings.purchase_timeout, purchase).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                let err = self.fail(&mut attempt, from_store_error(e));
                self.refresh_after_failure().await;
                return Err(err);
            }
            Err(_) => {
                let err = self.fail(&mut attempt, store_timed_out());
                self.refresh_after_failure().await;
                return Err(err);
            }
        };

        self.receipts.insert(receipt.transaction_id.clone(), receipt.clone());
        tracing::info!(
            user_id = %self.ctx.user_id,
            product_id,
            transaction_id = %receipt.transaction_id,
            "Store acknowledged purchase"
        );

        self.step(&mut attempt, AttemptState::Verifying)?;
        self.settle_detached(running, attempt, receipt).await
    }

    /// Replay a cached receipt against the backend (after `ReconciliationFailed`).
    pub async fn retry_verification(&self, product_id: &str) -> Result<PurchaseAttempt> {
        let running = self.try_start()?;
        let receipt = self.cached_receipt(product_id).ok_or_else(|| {
            AppError::UnknownProduct(format!("no unverified purchase for {}", product_id))
        })?;

        let attempt = PurchaseAttempt::resume_verification(product_id);
        self.publish(&attempt);
        self.settle_detached(running, attempt, receipt).await
    }

    /// Run settlement on its own task. Once verification starts it runs to
    /// completion even if the caller stops waiting.
    async fn settle_detached(
        &self,
        running: OwnedMutexGuard<()>,
        attempt: PurchaseAttempt,
        receipt: StoreReceipt,
    ) -> Result<PurchaseAttempt> {
        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this.settle(attempt, receipt).await;
            drop(running);
            outcome
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("settlement task failed: {}", e)))?
    }

    async fn settle(
        &self,
        mut attempt: PurchaseAttempt,
        receipt: StoreReceipt,
    ) -> Result<PurchaseAttempt> {
        let guard = self.ctx.gate.acquire().await;

        let outcome = match self.verify_with_retry(&receipt).await {
            Ok(true) => {
                self.receipts.remove(&receipt.transaction_id);
                match attempt.advance(AttemptState::Settled) {
                    Ok(()) => {
                        self.publish(&attempt);
                        tracing::info!(
                            user_id = %self.ctx.user_id,
                            product_id = %receipt.product_id,
                            transaction_id = %receipt.transaction_id,
                            "Purchase settled"
                        );
                        Ok(attempt)
                    }
                    Err(e) => Err(self.fail(&mut attempt, e)),
                }
            }
            Ok(false) => {
                self.receipts.remove(&receipt.transaction_id);
                Err(self.fail(
                    &mut attempt,
                    AppError::ReconciliationFailed(VERIFICATION_DENIED.to_string()),
                ))
            }
            Err(e) => Err(self.fail(&mut attempt, e)),
        };

        self.ctx.reconcile_balance(&guard).await;
        outcome
    }

    /// Ask the backend whether a receipt grants entitlement, retrying
    /// transient failures with exponential backoff.
    async fn verify_with_retry(&self, receipt: &StoreReceipt) -> Result<bool> {
        let max_attempts = self.settings.verify_max_attempts.max(1);
        let mut delay = self.settings.verify_backoff;
        let mut tries = 0;

        loop {
            tries += 1;
            let call = self.verifier.verify_receipt(&self.ctx.user_id, receipt);
            let result = tokio::time::timeout(self.settings.backend_timeout, call)
                .await
                .unwrap_or_else(|_| Err(LedgerError::Transport("request timed out".to_string())));

            let err = match result {
                Ok(response) => return Ok(response.entitlement_granted),
                Err(e) => e,
            };

            if !err.is_transient() || tries >= max_attempts {
                tracing::warn!(
                    user_id = %self.ctx.user_id,
                    transaction_id = %receipt.transaction_id,
                    tries,
                    error = %err,
                    "Receipt verification gave up"
                );
                return Err(AppError::ReconciliationFailed(
                    AppError::RETRY_VERIFICATION_LATER.to_string(),
                ));
            }

            tracing::warn!(
                user_id = %self.ctx.user_id,
                transaction_id = %receipt.transaction_id,
                tries,
                error = %err,
                "Receipt verification failed, retrying"
            );
            tokio::time::sleep(delay).await;
            delay = delay.saturating_mul(2).min(MAX_VERIFY_BACKOFF);
        }
    }

    /// Re-verify every receipt the store still knows about, plus any cached
    /// ones, and refresh the balance afterward.
    pub async fn restore_purchases(&self) -> Result<RestoreSummary> {
        let _running = self.try_start()?;
        self.catalog.initialize().await?;

        let known = self.store.get_known_receipts();
        let mut receipts = match tokio::time::timeout(self.settings.store_timeout, known).await {
            Ok(result) => result.map_err(from_store_error)?,
            Err(_) => return Err(store_timed_out()),
        };
        for cached in self.receipts.iter() {
            if !receipts.iter().any(|r| r.transaction_id == *cached.key()) {
                receipts.push(cached.value().clone());
            }
        }

        let guard = self.ctx.gate.acquire().await;
        let this = self;
        let verdicts: Vec<(StoreReceipt, Result<bool>)> = stream::iter(receipts)
            .map(|receipt| async move {
                let verdict = this.verify_with_retry(&receipt).await;
                (receipt, verdict)
            })
            .buffer_unordered(RESTORE_CONCURRENCY)
            .collect()
            .await;

        let mut summary = RestoreSummary {
            checked: verdicts.len(),
            ..RestoreSummary::default()
        };
        for (receipt, verdict) in verdicts {
            match verdict {
                Ok(true) => {
                    summary.granted += 1;
                    self.receipts.remove(&receipt.transaction_id);
                }
                Ok(false) => {
                    summary.denied += 1;
                    self.receipts.remove(&receipt.transaction_id);
                }
                Err(_) => {
                    summary.failed += 1;
                    self.receipts.insert(receipt.transaction_id.clone(), receipt);
                }
            }
        }

        self.ctx.reconcile_balance(&guard).await;
        tracing::info!(
            user_id = %self.ctx.user_id,
            checked = summary.checked,
            granted = summary.granted,
            denied = summary.denied,
            failed = summary.failed,
            "Purchases restored"
        );
        Ok(summary)
    }
}
