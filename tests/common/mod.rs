// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared fakes for the ledger backend and the store bridge.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use pickem_rewards::config::Config;
use pickem_rewards::middleware::auth::create_jwt;
use pickem_rewards::models::{
    PointsBalance, PurchaseProduct, RedemptionOffer, StoreReceipt, UpgradeTier,
};
use pickem_rewards::routes::create_router;
use pickem_rewards::services::{
    LedgerApi, LedgerError, ProductCatalog, PurchaseStore, RedeemResponse, Session,
    SessionRegistry, SessionSettings, StoreError, VerifyReceiptResponse,
};
use pickem_rewards::AppState;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const USER_ID: &str = "user-42";

pub fn balance(available: u64, pending: u64) -> PointsBalance {
    PointsBalance {
        total_points: available + pending,
        available_points: available,
        pending_points: pending,
        lifetime_earned: available + pending + 500,
    }
}

pub fn offer(id: &str, cost: u64) -> RedemptionOffer {
    RedemptionOffer {
        id: id.to_string(),
        points_cost: cost,
        reward_name: format!("Reward {}", id),
        reward_description: "Unlock premium picks".to_string(),
        upgrade_tier: UpgradeTier::Pro,
        duration_hours: Some(24),
    }
}

pub fn product(id: &str) -> PurchaseProduct {
    PurchaseProduct {
        product_id: id.to_string(),
        localized_price: "$29.99".to_string(),
        currency: "USD".to_string(),
        localized_title: "Premium Yearly".to_string(),
        localized_description: "All picks, all season".to_string(),
    }
}

pub fn receipt(product_id: &str, transaction_id: &str) -> StoreReceipt {
    StoreReceipt {
        product_id: product_id.to_string(),
        transaction_id: transaction_id.to_string(),
        payload: "opaque-receipt".to_string(),
        purchased_at: Utc::now(),
    }
}

pub fn transport_error() -> LedgerError {
    LedgerError::Transport("connection reset".to_string())
}

pub fn fast_settings() -> SessionSettings {
    SessionSettings {
        store_timeout: Duration::from_secs(2),
        purchase_timeout: Duration::from_secs(2),
        backend_timeout: Duration::from_secs(2),
        verify_max_attempts: 3,
        verify_backoff: Duration::from_millis(1),
    }
}

// ─── Fake Ledger ─────────────────────────────────────────────

/// How the fake backend answers `redeem`.
#[derive(Debug, Clone)]
pub enum RedeemBehavior {
    /// Debit the offer cost and report success
    Debit,
    /// Reject without touching the balance
    Reject {
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// Debit, then report a transport failure
    DebitThenFail,
}

pub struct FakeLedger {
    pub balance: Mutex<PointsBalance>,
    pub offers: Mutex<Vec<RedemptionOffer>>,
    pub redeem_behavior: Mutex<RedeemBehavior>,
    /// Verification answers, consumed in order; `Ok(true)` once exhausted
    pub verify_script: Mutex<VecDeque<Result<bool, LedgerError>>>,
    /// When set, `redeem` waits for a notification before answering
    pub redeem_hold: Mutex<Option<Arc<Notify>>>,
    pub balance_fails: Mutex<bool>,
    /// Added latency on `get_balance` and `verify_receipt`
    pub latency: Mutex<Duration>,
    pub balance_calls: AtomicUsize,
    pub offers_calls: AtomicUsize,
    pub redeem_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
}

impl FakeLedger {
    pub fn new(available: u64, offers: Vec<RedemptionOffer>) -> Arc<Self> {
        Arc::new(Self {
            balance: Mutex::new(balance(available, 0)),
            offers: Mutex::new(offers),
            redeem_behavior: Mutex::new(RedeemBehavior::Debit),
            verify_script: Mutex::new(VecDeque::new()),
            redeem_hold: Mutex::new(None),
            balance_fails: Mutex::new(false),
            latency: Mutex::new(Duration::ZERO),
            balance_calls: AtomicUsize::new(0),
            offers_calls: AtomicUsize::new(0),
            redeem_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_redeem_behavior(&self, behavior: RedeemBehavior) {
        *self.redeem_behavior.lock().unwrap() = behavior;
    }

    pub fn script_verification(&self, answers: Vec<Result<bool, LedgerError>>) {
        *self.verify_script.lock().unwrap() = answers.into();
    }

    pub fn hold_redeem(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.redeem_hold.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    async fn lag(&self) {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    pub fn set_available(&self, available: u64) {
        *self.balance.lock().unwrap() = balance(available, 0);
    }

    fn debit(&self, offer_id: &str) -> Option<u64> {
        let cost = self
            .offers
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id == offer_id)?
            .points_cost;
        let mut balance = self.balance.lock().unwrap();
        balance.available_points -= cost;
        balance.total_points -= cost;
        Some(cost)
    }

    pub fn redeem_calls(&self) -> usize {
        self.redeem_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerApi for FakeLedger {
    async fn get_balance(&self, _user_id: &str) -> Result<PointsBalance, LedgerError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.lag().await;
        if *self.balance_fails.lock().unwrap() {
            return Err(transport_error());
        }
        Ok(*self.balance.lock().unwrap())
    }

    async fn list_offers(&self) -> Result<Vec<RedemptionOffer>, LedgerError> {
        self.offers_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.offers.lock().unwrap().clone())
    }

    async fn redeem(&self, _user_id: &str, offer_id: &str) -> Result<RedeemResponse, LedgerError> {
        self.redeem_calls.fetch_add(1, Ordering::SeqCst);
        let hold = self.redeem_hold.lock().unwrap().clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }

        let behavior = self.redeem_behavior.lock().unwrap().clone();
        match behavior {
            RedeemBehavior::Debit => match self.debit(offer_id) {
                Some(cost) => Ok(RedeemResponse {
                    success: true,
                    message: format!("Redeemed for {} points", cost),
                    code: None,
                }),
                None => Err(LedgerError::Rejected {
                    status: 404,
                    code: Some("unknown_offer".to_string()),
                    message: "That reward is no longer available".to_string(),
                }),
            },
            RedeemBehavior::Reject {
                status,
                code,
                message,
            } => Err(LedgerError::Rejected {
                status,
                code,
                message,
            }),
            RedeemBehavior::DebitThenFail => {
                self.debit(offer_id);
                Err(transport_error())
            }
        }
    }

    async fn verify_receipt(
        &self,
        _user_id: &str,
        _receipt: &StoreReceipt,
    ) -> Result<VerifyReceiptResponse, LedgerError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.lag().await;
        let next = self.verify_script.lock().unwrap().pop_front();
        match next.unwrap_or(Ok(true)) {
            Ok(granted) => {
                if granted {
                    let mut balance = self.balance.lock().unwrap();
                    balance.available_points += 100;
                    balance.total_points += 100;
                    balance.lifetime_earned += 100;
                }
                Ok(VerifyReceiptResponse {
                    entitlement_granted: granted,
                })
            }
            Err(e) => Err(e),
        }
    }
}

// ─── Fake Store ──────────────────────────────────────────────

pub struct FakeStore {
    pub products: Mutex<Vec<PurchaseProduct>>,
    pub init_error: Mutex<Option<StoreError>>,
    pub init_delay: Duration,
    pub list_error: Mutex<Option<StoreError>>,
    /// `None` acknowledges the purchase with a fresh receipt
    pub purchase_error: Mutex<Option<StoreError>>,
    pub known_receipts: Mutex<Vec<StoreReceipt>>,
    pub init_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub purchase_calls: AtomicUsize,
}

impl FakeStore {
    pub fn new(products: Vec<PurchaseProduct>) -> Arc<Self> {
        Self::with_init_delay(products, Duration::ZERO)
    }

    pub fn with_init_delay(products: Vec<PurchaseProduct>, init_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            products: Mutex::new(products),
            init_error: Mutex::new(None),
            init_delay,
            list_error: Mutex::new(None),
            purchase_error: Mutex::new(None),
            known_receipts: Mutex::new(Vec::new()),
            init_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            purchase_calls: AtomicUsize::new(0),
        })
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn purchase_calls(&self) -> usize {
        self.purchase_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PurchaseStore for FakeStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        match self.init_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn list_products(&self) -> Result<Vec<PurchaseProduct>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.list_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.products.lock().unwrap().clone())
    }

    async fn purchase(&self, product_id: &str) -> Result<StoreReceipt, StoreError> {
        let n = self.purchase_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.purchase_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(receipt(product_id, &format!("txn-{}", n + 1)))
    }

    async fn get_known_receipts(&self) -> Result<Vec<StoreReceipt>, StoreError> {
        Ok(self.known_receipts.lock().unwrap().clone())
    }
}

// ─── Wiring ──────────────────────────────────────────────────

/// A session wired to the given fakes.
pub fn test_session(ledger: Arc<FakeLedger>, store: Arc<FakeStore>) -> Session {
    test_session_with(ledger, store, fast_settings())
}

/// A session wired to the given fakes with custom timeouts.
pub fn test_session_with(
    ledger: Arc<FakeLedger>,
    store: Arc<FakeStore>,
    settings: SessionSettings,
) -> Session {
    let catalog = Arc::new(ProductCatalog::new(store.clone(), settings.store_timeout));
    Session::new(USER_ID, ledger, catalog, store, settings)
}

/// Create a test app backed by the given fakes.
/// Returns the router and the shared state.
pub fn create_test_app(
    ledger: Arc<FakeLedger>,
    store: Arc<FakeStore>,
) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let sessions = SessionRegistry::new(ledger, store, config.session_settings());
    let state = Arc::new(AppState { config, sessions });
    (create_router(state.clone()), state)
}

pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    create_jwt(user_id, signing_key).expect("Failed to create test JWT")
}

/// Serve a router on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{}", addr)
}
