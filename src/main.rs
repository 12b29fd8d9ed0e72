// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tango CRM API Server
//!
//! Serves the authenticated dashboard API, resolves paid-feature
//! entitlements against Stripe and the hosted user store, and enforces
//! access at the edge gate.

use std::sync::Arc;

use tango_crm::{
    config::Config,
    db::SupabaseDb,
    middleware::rate_limit::{MemoryRateLimitStore, RateLimiter},
    services::{ActivityEventBus, EntitlementService, StripeService},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Tango CRM API");

    // Hosted user store (Supabase REST surface)
    let db = SupabaseDb::new(&config.supabase_url, &config.supabase_service_key)
        .expect("Failed to initialize Supabase client");
    tracing::info!(url = %config.supabase_url, "Supabase client initialized");

    // Stripe adapter (subscriptions, checkout, billing portal, webhooks)
    let stripe = StripeService::new(
        config.stripe_secret_key.clone(),
        config.stripe_webhook_secret.clone(),
    );
    tracing::info!("Stripe service initialized");

    // Entitlement resolver with its shared access cache
    let entitlements =
        EntitlementService::new(db.clone(), stripe.clone(), config.admin_emails.clone());

    // Activity timeline event bus (in-process fanout for dashboard refetch)
    let events = ActivityEventBus::new();

    // Rate limiter with the in-memory counter store.
    // Deployments scaled past one instance should inject a shared store here.
    let rate_limiter = Arc::new(RateLimiter::new(Arc::new(MemoryRateLimitStore::new())));

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        stripe,
        entitlements,
        events,
        rate_limiter,
    });

    // Build router
    let app = tango_crm::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tango_crm=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
