// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use http_body_util::BodyExt;
use std::sync::Arc;
use tango_crm::config::Config;
use tango_crm::db::SupabaseDb;
use tango_crm::middleware::auth::create_session_jwt;
use tango_crm::middleware::rate_limit::{MemoryRateLimitStore, RateLimiter};
use tango_crm::models::{Niche, UserRecord};
use tango_crm::routes::create_router;
use tango_crm::services::{ActivityEventBus, EntitlementService, StripeService};
use tango_crm::AppState;

/// Create a test app backed by in-memory stores.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = SupabaseDb::new_memory();
    let stripe = StripeService::new_memory(config.stripe_webhook_secret.clone());
    let entitlements =
        EntitlementService::new(db.clone(), stripe.clone(), config.admin_emails.clone());
    let events = ActivityEventBus::new();
    let rate_limiter = Arc::new(RateLimiter::new(Arc::new(MemoryRateLimitStore::new())));

    let state = Arc::new(AppState {
        config,
        db,
        stripe,
        entitlements,
        events,
        rate_limiter,
    });

    (create_router(state.clone()), state)
}

/// Bearer token for a test user.
#[allow(dead_code)]
pub fn bearer(state: &AppState, user_id: &str, email: Option<&str>) -> String {
    let token = create_session_jwt(user_id, email, &state.config.jwt_signing_key)
        .expect("JWT creation should succeed");
    format!("Bearer {}", token)
}

/// GET with auth.
#[allow(dead_code)]
pub fn authed_get(uri: &str, auth: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .body(Body::empty())
        .unwrap()
}

/// POST JSON with auth.
#[allow(dead_code)]
pub fn authed_post_json(uri: &str, auth: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Parse a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Seed a user who finished onboarding with an active subscription.
#[allow(dead_code)]
pub async fn seed_active_user(state: &AppState, user_id: &str, email: &str) -> UserRecord {
    let mut record = UserRecord::new(user_id, Some(email));
    record.onboarding_completed = true;
    record.subscription_status = tango_crm::models::SubscriptionStatus::Active;
    record.primary_niche = Some(Niche::Creator);
    record.niches = vec![Niche::Creator];
    state.db.upsert_user(&record).await.expect("seed user");
    record
}
