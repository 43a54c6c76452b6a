// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pickem-Rewards companion service
//!
//! Exposes balance, offers, redemption and purchase state to the app shell,
//! backed by the points ledger and the native store bridge.

use pickem_rewards::{
    config::Config,
    services::{LedgerClient, SessionRegistry, StoreBridgeClient},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle sessions are swept
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Pickem-Rewards service");

    let ledger = LedgerClient::new(config.backend_url.clone(), config.backend_timeout)?;
    tracing::info!(backend = %config.backend_url, "Ledger client initialized");

    let store = StoreBridgeClient::new(config.store_bridge_url.clone())?;
    tracing::info!(bridge = %config.store_bridge_url, "Store bridge client initialized");

    let sessions = SessionRegistry::new(
        Arc::new(ledger),
        Arc::new(store),
        config.session_settings(),
    );

    // Warm the store connection; sessions retry lazily if this fails.
    if let Err(e) = sessions.catalog().initialize().await {
        tracing::warn!(error = %e, "Store initialization failed at startup");
    }

    let state = Arc::new(AppState {
        config: config.clone(),
        sessions,
    });

    spawn_session_sweeper(state.clone());

    let app = pickem_rewards::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically drop sessions idle longer than `SESSION_IDLE_SECS`.
fn spawn_session_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = state.sessions.evict_idle(state.config.session_idle);
            if evicted > 0 {
                tracing::info!(evicted, remaining = state.sessions.len(), "Evicted idle sessions");
            }
        }
    });
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pickem_rewards=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
