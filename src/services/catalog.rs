// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription product catalog backed by the purchase store.

use crate::error::{AppError, Result};
use crate::models::PurchaseProduct;
use crate::services::store::{PurchaseStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};

/// Convert a raw store failure into the app taxonomy.
pub(crate) fn from_store_error(err: StoreError) -> AppError {
    match err {
        StoreError::Cancelled => AppError::UserCancelled,
        StoreError::Unavailable(raw) | StoreError::Rejected(raw) => {
            tracing::warn!(error = %raw, "Store call failed");
            AppError::StoreUnavailable("the store could not be reached".to_string())
        }
    }
}

pub(crate) fn store_timed_out() -> AppError {
    tracing::warn!("Store call timed out");
    AppError::StoreUnavailable("the store did not respond in time".to_string())
}

/// Product catalog with one-shot store initialization.
pub struct ProductCatalog {
    store: Arc<dyn PurchaseStore>,
    /// Set once the store handshake succeeds. Concurrent initializers wait
    /// on the in-flight handshake instead of starting their own.
    initialized: OnceCell<()>,
    /// Last fetched product list (None until the first successful fetch)
    snapshot: RwLock<Option<Vec<PurchaseProduct>>>,
    timeout: Duration,
}

impl ProductCatalog {
    pub fn new(store: Arc<dyn PurchaseStore>, timeout: Duration) -> Self {
        Self {
            store,
            initialized: OnceCell::new(),
            snapshot: RwLock::new(None),
            timeout,
        }
    }

    /// Connect to the store. Idempotent; a failed handshake can be retried.
    pub async fn initialize(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                tracing::debug!("Initializing store connection");
                match tokio::time::timeout(self.timeout, self.store.initialize()).await {
                    Ok(result) => result.map_err(from_store_error),
                    Err(_) => Err(store_timed_out()),
                }
            })
            .await?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Fetch the current subscription list from the store.
    ///
    /// An empty store is reported as `EmptyCatalog`, but the (empty)
    /// snapshot is still recorded as the latest catalog.
    pub async fn list_subscriptions(&self) -> Result<Vec<PurchaseProduct>> {
        if !self.is_initialized() {
            return Err(AppError::NotInitialized);
        }

        let products = match tokio::time::timeout(self.timeout, self.store.list_products()).await
        {
            Ok(result) => result.map_err(from_store_error)?,
            Err(_) => return Err(store_timed_out()),
        };

        tracing::debug!(count = products.len(), "Fetched store catalog");
        *self.snapshot.write().await = Some(products.clone());

        if products.is_empty() {
            return Err(AppError::EmptyCatalog);
        }
        Ok(products)
    }

    /// Whether a catalog has been fetched at least once.
    pub async fn has_snapshot(&self) -> bool {
        self.snapshot.read().await.is_some()
    }

    /// Look up a product in the last fetched catalog.
    pub async fn find(&self, product_id: &str) -> Option<PurchaseProduct> {
        self.snapshot
            .read()
            .await
            .as_ref()
            .and_then(|products| products.iter().find(|p| p.product_id == product_id))
            .cloned()
    }
}
