// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Pickem-Rewards: purchase and points-redemption core for the picks app
//!
//! This crate coordinates subscription purchases through the platform store,
//! reconciles them with the backend, and redeems points against the backend
//! ledger, keeping the app's view of the balance consistent with the server.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::SessionRegistry;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub sessions: SessionRegistry,
}
