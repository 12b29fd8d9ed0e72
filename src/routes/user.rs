// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User-facing routes: entitlement status, onboarding, profile settings.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{EntitlementResult, Niche, UserRecord};
use crate::services::{Identity, RefreshMode};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/user/payment-status", get(payment_status))
        .route(
            "/api/user/force-refresh-payment-status",
            post(force_refresh_payment_status),
        )
        .route("/api/user/timezone", get(get_timezone).post(set_timezone))
        .route("/api/user/onboarding", post(complete_onboarding))
}

fn identity(user: &AuthUser) -> Identity {
    Identity::new(&user.user_id, user.email.as_deref())
}

/// Load the caller's record, or a fresh one seeded with the initial role.
async fn load_or_new(state: &AppState, user: &AuthUser) -> Result<UserRecord> {
    match state.db.get_user(&user.user_id).await? {
        Some(record) => Ok(record),
        None => {
            let mut record = UserRecord::new(&user.user_id, user.email.as_deref());
            record.role = state.entitlements.initial_role(user.email.as_deref());
            Ok(record)
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    user_id: String,
    email: Option<String>,
    entitlement: EntitlementResult,
}

/// Who am I, and what may I use?
async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let entitlement = state
        .entitlements
        .resolve(&identity(&user), RefreshMode::Cached)
        .await?;

    Ok(Json(MeResponse {
        user_id: user.user_id,
        email: user.email,
        entitlement,
    }))
}

/// Entitlement snapshot; served from the access cache when fresh.
async fn payment_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<EntitlementResult>> {
    let result = state
        .entitlements
        .resolve(&identity(&user), RefreshMode::Cached)
        .await?;
    Ok(Json(result))
}

/// The "loud" refresh: drop the cached entry and verify against Stripe
/// before answering. The frontend calls this right after checkout
/// returns, when the webhook may not have landed yet.
async fn force_refresh_payment_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<EntitlementResult>> {
    state.entitlements.invalidate(&user.user_id);
    let result = state
        .entitlements
        .resolve(&identity(&user), RefreshMode::Live)
        .await?;
    Ok(Json(result))
}

async fn get_timezone(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>> {
    let timezone = state
        .db
        .get_user(&user.user_id)
        .await?
        .map(|r| r.timezone)
        .unwrap_or_else(|| "UTC".to_string());

    Ok(Json(json!({ "timezone": timezone })))
}

#[derive(Deserialize)]
struct SetTimezoneRequest {
    timezone: String,
}

/// Store the user's display timezone. Only IANA names are accepted.
async fn set_timezone(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<SetTimezoneRequest>,
) -> Result<Json<serde_json::Value>> {
    if chrono_tz::Tz::from_str(&body.timezone).is_err() {
        return Err(AppError::BadRequest(format!(
            "Unknown timezone: {}",
            body.timezone
        )));
    }

    let mut record = load_or_new(&state, &user).await?;
    record.timezone = body.timezone.clone();
    record.updated_at = chrono::Utc::now();
    state.db.upsert_user(&record).await?;

    Ok(Json(json!({ "timezone": body.timezone })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OnboardingRequest {
    primary_niche: Niche,
    #[serde(default)]
    niches: Vec<Niche>,
}

/// Complete onboarding: record the chosen niches and unlock the app
/// shell (subscription checks still apply).
async fn complete_onboarding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<OnboardingRequest>,
) -> Result<Json<EntitlementResult>> {
    let mut record = load_or_new(&state, &user).await?;
    record.onboarding_completed = true;
    record.primary_niche = Some(body.primary_niche);
    record.niches = if body.niches.is_empty() {
        vec![body.primary_niche]
    } else {
        body.niches
    };
    record.updated_at = chrono::Utc::now();
    state.db.upsert_user(&record).await?;

    // The cached snapshot predates onboarding
    state.entitlements.invalidate(&user.user_id);

    let result = state
        .entitlements
        .resolve(&identity(&user), RefreshMode::Cached)
        .await?;
    Ok(Json(result))
}
