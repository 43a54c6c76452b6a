// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Debug-only manual triggers for the purchase and ledger flows.
//!
//! Each trigger calls the same interfaces the production flow uses and
//! records the raw outcome as a typed [`DiagnosticEvent`].

use crate::models::{DiagnosticEvent, DiagnosticPayload};
use crate::services::catalog::ProductCatalog;
use crate::services::purchase::PurchaseOrchestrator;
use crate::services::session::SessionContext;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Events kept per session (oldest dropped first).
const MAX_EVENTS: usize = 50;

pub struct DiagnosticsReporter {
    ctx: SessionContext,
    catalog: Arc<ProductCatalog>,
    purchases: PurchaseOrchestrator,
    events: Mutex<VecDeque<DiagnosticEvent>>,
}

impl DiagnosticsReporter {
    pub fn new(
        ctx: SessionContext,
        catalog: Arc<ProductCatalog>,
        purchases: PurchaseOrchestrator,
    ) -> Self {
        Self {
            ctx,
            catalog,
            purchases,
            events: Mutex::new(VecDeque::with_capacity(MAX_EVENTS)),
        }
    }

    async fn record(&self, trigger: &'static str, payload: DiagnosticPayload) -> DiagnosticEvent {
        let event = DiagnosticEvent::new(trigger, payload);
        tracing::debug!(user_id = %self.ctx.user_id, trigger, "Diagnostic event recorded");

        let mut events = self.events.lock().await;
        if events.len() == MAX_EVENTS {
            events.pop_front();
        }
        events.push_back(event.clone());
        event
    }

    pub async fn trigger_initialize(&self) -> DiagnosticEvent {
        let payload = match self.catalog.initialize().await {
            Ok(()) => DiagnosticPayload::Initialized,
            Err(e) => DiagnosticPayload::from(&e),
        };
        self.record("initialize", payload).await
    }

    /// Raw catalog fetch; does not initialize first, so `NotInitialized` is observable.
    pub async fn trigger_products(&self) -> DiagnosticEvent {
        let payload = match self.catalog.list_subscriptions().await {
            Ok(products) => DiagnosticPayload::Products { products },
            Err(e) => DiagnosticPayload::from(&e),
        };
        self.record("products", payload).await
    }

    pub async fn trigger_balance(&self) -> DiagnosticEvent {
        let payload = match self.ctx.refresh_balance().await {
            Ok(snapshot) => DiagnosticPayload::Balance {
                balance: snapshot.balance,
            },
            Err(e) => DiagnosticPayload::from(&e),
        };
        self.record("balance", payload).await
    }

    pub async fn trigger_offers(&self) -> DiagnosticEvent {
        let payload = match self.ctx.ledger.refresh_offers().await {
            Ok(offers) => DiagnosticPayload::Offers { offers },
            Err(e) => DiagnosticPayload::from(&e),
        };
        self.record("offers", payload).await
    }

    pub async fn trigger_purchase(&self, product_id: &str) -> DiagnosticEvent {
        let payload = match self.purchases.purchase(product_id).await {
            Ok(attempt) => DiagnosticPayload::Purchase { attempt },
            Err(e) => DiagnosticPayload::from(&e),
        };
        self.record("purchase", payload).await
    }

    pub async fn trigger_restore(&self) -> DiagnosticEvent {
        let payload = match self.purchases.restore_purchases().await {
            Ok(summary) => DiagnosticPayload::Restore {
                checked: summary.checked,
                granted: summary.granted,
                denied: summary.denied,
                failed: summary.failed,
            },
            Err(e) => DiagnosticPayload::from(&e),
        };
        self.record("restore", payload).await
    }

    /// Recorded events, oldest first.
    pub async fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().await.iter().cloned().collect()
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}
