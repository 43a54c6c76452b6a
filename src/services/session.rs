// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user session state: balance cache, mutation gate, and the
//! controllers that share them.
//!
//! Only backend snapshots are ever written to the balance cache. Mutating
//! operations (redemption, purchase settlement) hold the session's
//! [`MutationGate`] and re-fetch the balance before releasing it.

use crate::error::{AppError, Result};
use crate::models::{PointsBalance, RedemptionOffer};
use crate::services::catalog::ProductCatalog;
use crate::services::diagnostics::DiagnosticsReporter;
use crate::services::ledger::PointsLedger;
use crate::services::ledger_client::LedgerApi;
use crate::services::purchase::PurchaseOrchestrator;
use crate::services::redemption::RedemptionController;
use crate::services::store::PurchaseStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Timeouts and retry policy shared by every session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub store_timeout: Duration,
    pub purchase_timeout: Duration,
    pub backend_timeout: Duration,
    pub verify_max_attempts: u32,
    pub verify_backoff: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(15),
            purchase_timeout: Duration::from_secs(300),
            backend_timeout: Duration::from_secs(10),
            verify_max_attempts: 3,
            verify_backoff: Duration::from_millis(500),
        }
    }
}

// ─── Mutation Gate ───────────────────────────────────────────

/// Session-scoped busy flag: at most one balance-affecting operation in flight.
#[derive(Clone, Default)]
pub struct MutationGate {
    lock: Arc<Mutex<()>>,
}

pub type MutationGuard = OwnedMutexGuard<()>;

impl MutationGate {
    /// Take the gate or fail immediately. Redemptions are rejected, not queued.
    pub fn try_acquire(&self) -> Result<MutationGuard> {
        self.lock
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::RedemptionInProgress)
    }

    /// Wait for the gate. Used by purchase settlement, which cannot be dropped
    /// once the store has charged the user.
    pub async fn acquire(&self) -> MutationGuard {
        self.lock.clone().lock_owned().await
    }

    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

// ─── Balance Cache ───────────────────────────────────────────

/// A cached backend balance.
#[derive(Debug, Clone, Copy, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BalanceSnapshot {
    #[serde(flatten)]
    pub balance: PointsBalance,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub fetched_at: DateTime<Utc>,
    /// Fetched while a mutation was in flight; will be replaced once it resolves
    pub provisional: bool,
    #[serde(skip)]
    #[cfg_attr(feature = "binding-generation", ts(skip))]
    seq: u64,
}

/// Observable read cache of the user's balance.
///
/// Fetches are sequenced: a response for an older request never overwrites
/// a newer one, and nothing fetched before an invalidation is stored after it.
#[derive(Clone)]
pub struct BalanceCache {
    tx: Arc<watch::Sender<Option<BalanceSnapshot>>>,
    next_seq: Arc<AtomicU64>,
    floor_seq: Arc<AtomicU64>,
}

impl Default for BalanceCache {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            next_seq: Arc::new(AtomicU64::new(0)),
            floor_seq: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl BalanceCache {
    pub fn current(&self) -> Option<BalanceSnapshot> {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<BalanceSnapshot>> {
        self.tx.subscribe()
    }

    /// Reserve a sequence number before issuing a balance request.
    fn begin_fetch(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record a backend snapshot unless a newer one is already cached.
    fn store(&self, seq: u64, balance: PointsBalance, provisional: bool) -> BalanceSnapshot {
        let snapshot = BalanceSnapshot {
            balance,
            fetched_at: Utc::now(),
            provisional,
            seq,
        };

        let floor = &self.floor_seq;
        let stored = self.tx.send_if_modified(|current| {
            if seq <= floor.load(Ordering::SeqCst) {
                return false;
            }
            if let Some(prev) = current.as_ref() {
                if prev.seq >= seq {
                    return false;
                }
                if balance.lifetime_earned < prev.balance.lifetime_earned {
                    tracing::warn!(
                        previous = prev.balance.lifetime_earned,
                        reported = balance.lifetime_earned,
                        "Ledger reported lifetime_earned going backwards"
                    );
                }
            }
            *current = Some(snapshot);
            true
        });

        if !stored {
            tracing::debug!(seq, "Discarding stale balance response");
        }
        snapshot
    }

    /// Drop the cached value; in-flight fetches issued before this are discarded.
    pub fn invalidate(&self) {
        self.floor_seq
            .store(self.next_seq.load(Ordering::SeqCst), Ordering::SeqCst);
        self.tx.send_replace(None);
    }
}

// ─── Session Context ─────────────────────────────────────────

/// State shared by the redemption controller and purchase orchestrator.
#[derive(Clone)]
pub struct SessionContext {
    pub user_id: Arc<str>,
    pub ledger: Arc<PointsLedger>,
    pub balance: BalanceCache,
    pub gate: MutationGate,
}

impl SessionContext {
    pub fn new(user_id: &str, ledger: Arc<PointsLedger>) -> Self {
        Self {
            user_id: Arc::from(user_id),
            ledger,
            balance: BalanceCache::default(),
            gate: MutationGate::default(),
        }
    }

    async fn fetch_balance(&self, mutation_owner: bool) -> Result<BalanceSnapshot> {
        let seq = self.balance.begin_fetch();
        let busy_before = !mutation_owner && self.gate.is_busy();
        let balance = self.ledger.get_balance(&self.user_id).await?;
        let provisional = !mutation_owner && (busy_before || self.gate.is_busy());
        Ok(self.balance.store(seq, balance, provisional))
    }

    /// Re-fetch the balance. Results overlapping a mutation are provisional.
    pub async fn refresh_balance(&self) -> Result<BalanceSnapshot> {
        self.fetch_balance(false).await
    }

    /// Cached balance if it is settled, otherwise a fresh fetch.
    pub async fn balance_or_fetch(&self) -> Result<PointsBalance> {
        match self.balance.current() {
            Some(snapshot) if !snapshot.provisional => Ok(snapshot.balance),
            _ => Ok(self.refresh_balance().await?.balance),
        }
    }

    /// Re-query truth after a mutation resolved, while still holding the gate.
    ///
    /// On failure the cache is invalidated rather than left at a value that
    /// may predate the mutation.
    pub(crate) async fn reconcile_balance(&self, _guard: &MutationGuard) -> Option<PointsBalance> {
        match self.fetch_balance(true).await {
            Ok(snapshot) => Some(snapshot.balance),
            Err(e) => {
                tracing::warn!(
                    user_id = %self.user_id,
                    error = %e,
                    "Balance refresh after mutation failed, invalidating cache"
                );
                self.balance.invalidate();
                None
            }
        }
    }
}

// ─── Session ─────────────────────────────────────────────────

/// Result of the shell's `refresh` command.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub balance: BalanceSnapshot,
    pub offers: Vec<RedemptionOffer>,
}

/// Everything the shell talks to for one user.
pub struct Session {
    pub ctx: SessionContext,
    pub redemptions: RedemptionController,
    pub purchases: PurchaseOrchestrator,
    pub diagnostics: DiagnosticsReporter,
}

impl Session {
    pub fn new(
        user_id: &str,
        ledger_api: Arc<dyn LedgerApi>,
        catalog: Arc<ProductCatalog>,
        store: Arc<dyn PurchaseStore>,
        settings: SessionSettings,
    ) -> Self {
        let ledger = Arc::new(PointsLedger::new(
            ledger_api.clone(),
            settings.backend_timeout,
        ));
        let ctx = SessionContext::new(user_id, ledger);
        let redemptions = RedemptionController::new(ctx.clone());
        let purchases =
            PurchaseOrchestrator::new(ctx.clone(), catalog.clone(), store, ledger_api, settings);
        let diagnostics = DiagnosticsReporter::new(ctx.clone(), catalog, purchases.clone());

        Self {
            ctx,
            redemptions,
            purchases,
            diagnostics,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.ctx.user_id
    }

    /// Whether dropping this session would lose work: a mutation or
    /// purchase in flight, or a charged receipt not yet reconciled.
    pub fn has_pending_work(&self) -> bool {
        self.ctx.gate.is_busy()
            || self.purchases.is_running()
            || !self.purchases.unverified_products().is_empty()
    }

    /// Re-fetch balance and offers (view activation / pull-to-refresh).
    pub async fn refresh(&self) -> Result<RefreshSummary> {
        let (balance, offers) = tokio::try_join!(
            self.ctx.refresh_balance(),
            self.ctx.ledger.refresh_offers()
        )?;
        Ok(RefreshSummary { balance, offers })
    }
}

struct SessionEntry {
    session: Arc<Session>,
    /// Unix millis of the last `get_or_create` for this user
    last_used: AtomicI64,
}

impl SessionEntry {
    fn touch(&self) {
        self.last_used.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }
}

/// Lazily created sessions, one per user. Idle ones are dropped by
/// [`SessionRegistry::evict_idle`].
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
    ledger_api: Arc<dyn LedgerApi>,
    store: Arc<dyn PurchaseStore>,
    /// Store state is device-wide, so every session shares one catalog.
    catalog: Arc<ProductCatalog>,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(
        ledger_api: Arc<dyn LedgerApi>,
        store: Arc<dyn PurchaseStore>,
        settings: SessionSettings,
    ) -> Self {
        let catalog = Arc::new(ProductCatalog::new(store.clone(), settings.store_timeout));
        Self {
            sessions: DashMap::new(),
            ledger_api,
            store,
            catalog,
            settings,
        }
    }

    pub fn catalog(&self) -> &Arc<ProductCatalog> {
        &self.catalog
    }

    pub fn get_or_create(&self, user_id: &str) -> Arc<Session> {
        let entry = self
            .sessions
            .entry(user_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(user_id, "Creating session");
                SessionEntry {
                    session: Arc::new(Session::new(
                        user_id,
                        self.ledger_api.clone(),
                        self.catalog.clone(),
                        self.store.clone(),
                        self.settings,
                    )),
                    last_used: AtomicI64::new(0),
                }
            });
        entry.touch();
        entry.session.clone()
    }

    /// Drop sessions unused for at least `max_idle`, except those with
    /// pending work. Returns how many were dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let max_idle_ms = i64::try_from(max_idle.as_millis()).unwrap_or(i64::MAX);
        let cutoff = Utc::now().timestamp_millis().saturating_sub(max_idle_ms);
        let mut evicted = 0;

        self.sessions.retain(|user_id, entry| {
            let idle = entry.last_used.load(Ordering::Relaxed) <= cutoff;
            if idle && !entry.session.has_pending_work() {
                tracing::debug!(user_id = %user_id, "Evicting idle session");
                evicted += 1;
                false
            } else {
                true
            }
        });

        evicted
    }

    /// Drop a user's session. In-flight operations keep their own references.
    pub fn end_session(&self, user_id: &str) -> bool {
        self.sessions.remove(user_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
