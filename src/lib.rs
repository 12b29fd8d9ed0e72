// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tango CRM: backend API for the creator CRM dashboard.
//!
//! This crate provides entitlement resolution (who may use paid features
//! and which niches are unlocked), the edge gate enforcing it, Stripe
//! billing plumbing, and the opportunity activity timeline.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use config::Config;
use db::SupabaseDb;
use middleware::rate_limit::RateLimiter;
use services::{ActivityEventBus, EntitlementService, StripeService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: SupabaseDb,
    pub stripe: StripeService,
    pub entitlements: EntitlementService,
    pub events: ActivityEventBus,
    pub rate_limiter: Arc<RateLimiter>,
}
