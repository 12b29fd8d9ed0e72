// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Billing routes: checkout and self-serve portal sessions.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::UserRecord;
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/stripe/create-checkout-session",
            post(create_checkout_session),
        )
        .route(
            "/api/stripe/create-portal-session",
            post(create_portal_session),
        )
}

/// Make sure the caller has a record with a Stripe customer attached,
/// creating both as needed. The customer id is persisted before the
/// checkout URL goes out, so a completed checkout can always be mapped
/// back to a user.
async fn ensure_customer(state: &AppState, user: &AuthUser) -> Result<UserRecord> {
    let mut record = match state.db.get_user(&user.user_id).await? {
        Some(record) => record,
        None => {
            let mut record = UserRecord::new(&user.user_id, user.email.as_deref());
            record.role = state.entitlements.initial_role(user.email.as_deref());
            record
        }
    };

    if record.payments_customer_id.is_none() {
        let customer = state
            .stripe
            .create_customer(&record.email, &record.id)
            .await?;
        tracing::info!(user_id = %record.id, customer_id = %customer.id, "Created Stripe customer");
        record.payments_customer_id = Some(customer.id);
        record.updated_at = chrono::Utc::now();
        state.db.upsert_user(&record).await?;
    }

    Ok(record)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutRequest {
    price_id: String,
    #[serde(default)]
    success_url: Option<String>,
    #[serde(default)]
    cancel_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResponse {
    session_id: String,
    url: String,
}

async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    if body.price_id.is_empty() {
        return Err(AppError::BadRequest("priceId is required".to_string()));
    }

    let record = ensure_customer(&state, &user).await?;
    let customer_id = record
        .payments_customer_id
        .as_deref()
        .ok_or_else(|| AppError::PaymentsApi("Customer creation returned no id".to_string()))?;

    let success_url = body
        .success_url
        .unwrap_or_else(|| format!("{}/dashboard?checkout=success", state.config.frontend_url));
    let cancel_url = body
        .cancel_url
        .unwrap_or_else(|| format!("{}/pricing", state.config.frontend_url));

    let session = state
        .stripe
        .create_checkout_session(
            customer_id,
            &body.price_id,
            &success_url,
            &cancel_url,
            &user.user_id,
        )
        .await?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

#[derive(Serialize)]
struct PortalResponse {
    url: String,
}

async fn create_portal_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PortalResponse>> {
    let record = state
        .db
        .get_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("No billing account for this user".to_string()))?;

    let customer_id = record
        .payments_customer_id
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("No billing account for this user".to_string()))?;

    let return_url = format!("{}/dashboard", state.config.frontend_url);
    let session = state
        .stripe
        .create_portal_session(customer_id, &return_url)
        .await?;

    Ok(Json(PortalResponse { url: session.url }))
}
