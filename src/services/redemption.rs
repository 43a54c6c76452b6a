// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Points redemption flow.
//!
//! Two-step commit: `select` runs the client-side affordability gate and
//! records the user's choice, `confirm` submits it. The gate is advisory
//! (the ledger re-validates), but an offer that fails it never reaches the
//! network. The balance is re-fetched after every submission, whatever the
//! outcome.

use crate::error::{AppError, Result};
use crate::models::{
    OfferView, RedemptionOffer, RedemptionOutcome, RedemptionRequest, RedemptionState,
};
use crate::services::session::{MutationGuard, SessionContext};
use tokio::sync::Mutex;

const DEFAULT_SUCCESS_MESSAGE: &str = "Reward redeemed";

pub struct RedemptionController {
    ctx: SessionContext,
    /// Selected but not yet confirmed
    pending: Mutex<Option<RedemptionRequest>>,
}

impl RedemptionController {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            pending: Mutex::new(None),
        }
    }

    /// Offers gated against the cached balance ("Claim" / "Need N more").
    pub async fn offer_views(&self) -> Result<Vec<OfferView>> {
        let offers = self.ctx.ledger.list_offers().await?;
        let balance = self.ctx.balance_or_fetch().await?;
        Ok(offers
            .into_iter()
            .map(|offer| OfferView::new(offer, Some(&balance)))
            .collect())
    }

    /// Client-side affordability gate. No network mutation happens here.
    async fn check_affordable(&self, offer_id: &str) -> Result<RedemptionOffer> {
        let offer = self.ctx.ledger.find_offer(offer_id).await?.ok_or_else(|| {
            AppError::UnknownOffer(format!("Offer {} is not available", offer_id))
        })?;

        let balance = self.ctx.balance_or_fetch().await?;
        if !balance.can_afford(offer.points_cost) {
            let shortfall = balance.shortfall(offer.points_cost);
            tracing::debug!(
                user_id = %self.ctx.user_id,
                offer_id,
                shortfall,
                "Redemption blocked by affordability gate"
            );
            return Err(AppError::InsufficientPoints(format!(
                "Need {} more points",
                shortfall
            )));
        }

        Ok(offer)
    }

    /// Step one: choose an offer. Replaces any earlier unconfirmed selection.
    pub async fn select(&self, offer_id: &str) -> Result<RedemptionRequest> {
        self.check_affordable(offer_id).await?;
        let request = RedemptionRequest::new(&self.ctx.user_id, offer_id);
        *self.pending.lock().await = Some(request.clone());
        Ok(request)
    }

    pub async fn pending(&self) -> Option<RedemptionRequest> {
        self.pending.lock().await.clone()
    }

    /// Drop the unconfirmed selection, if any.
    pub async fn cancel(&self) -> bool {
        self.pending.lock().await.take().is_some()
    }

    /// Step two: submit the selected offer.
    pub async fn confirm(&self) -> Result<RedemptionOutcome> {
        let guard = self.ctx.gate.try_acquire()?;
        let request = self
            .pending
            .lock()
            .await
            .take()
            .ok_or_else(|| AppError::BadRequest("No redemption selected".to_string()))?;
        self.submit(guard, request).await
    }

    /// Gate and submit in one call, for an intent the shell already confirmed.
    ///
    /// A second call while one is in flight is rejected with
    /// `RedemptionInProgress` rather than queued.
    pub async fn request_redeem(&self, offer_id: &str) -> Result<RedemptionOutcome> {
        let guard = self.ctx.gate.try_acquire()?;
        self.check_affordable(offer_id).await?;
        let request = RedemptionRequest::new(&self.ctx.user_id, offer_id);
        self.submit(guard, request).await
    }

    async fn submit(
        &self,
        guard: MutationGuard,
        mut request: RedemptionRequest,
    ) -> Result<RedemptionOutcome> {
        request.state = RedemptionState::Submitting;
        tracing::info!(
            user_id = %request.user_id,
            offer_id = %request.offer_id,
            "Submitting redemption"
        );

        let result = self
            .ctx
            .ledger
            .redeem(&request.user_id, &request.offer_id)
            .await;

        // Truth is re-queried regardless of outcome: a reported failure may
        // still have debited the account.
        let balance = self.ctx.reconcile_balance(&guard).await;
        drop(guard);

        match result {
            Ok(mut result) => {
                request.state = RedemptionState::Succeeded;
                if result.message.is_empty() {
                    result.message = DEFAULT_SUCCESS_MESSAGE.to_string();
                }
                Ok(RedemptionOutcome {
                    request,
                    result,
                    balance,
                })
            }
            Err(e) => {
                request.state = RedemptionState::Failed;
                tracing::warn!(
                    user_id = %request.user_id,
                    offer_id = %request.offer_id,
                    state = ?request.state,
                    error = %e,
                    "Redemption failed"
                );
                Err(e)
            }
        }
    }
}
