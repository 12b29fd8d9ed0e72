// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe webhook endpoint.
//!
//! Signature verification happens over the raw body before any JSON
//! parsing. Every verified event id goes into the ledger first; an id we
//! have already seen is acknowledged without re-applying side effects,
//! so Stripe's at-least-once delivery stays safe.

use crate::error::{AppError, Result};
use crate::models::SubscriptionStatus;
use crate::services::StripeEvent;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/stripe/webhook", post(handle_event))
}

/// String field helper for the loosely-typed `data.object` blob.
fn jstr<'a>(object: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    object.get(key).and_then(|v| v.as_str())
}

async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    let event = state.stripe.verify_webhook(&body, signature)?;

    // Ledger write must succeed before side effects; a failure here makes
    // Stripe retry the whole delivery
    let first_delivery = state
        .db
        .record_webhook_event(&event.id, &event.event_type)
        .await?;

    if !first_delivery {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Duplicate webhook delivery acknowledged");
        return Ok(Json(json!({ "received": true, "duplicate": true })));
    }

    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Webhook event received");

    match event.event_type.as_str() {
        "checkout.session.completed" => handle_checkout_completed(&state, &event).await,
        "customer.subscription.created" | "customer.subscription.updated" => {
            apply_subscription_object(&state, &event, None).await
        }
        "customer.subscription.deleted" => {
            apply_subscription_object(&state, &event, Some(SubscriptionStatus::Canceled)).await
        }
        other => {
            tracing::debug!(event_type = %other, "Ignoring unhandled event type");
        }
    }

    Ok(Json(json!({ "received": true })))
}

/// Checkout finished: attach the Stripe customer to the user who started
/// it. The user id rides along as `client_reference_id` (with
/// `metadata.user_id` as a fallback for sessions created elsewhere).
async fn handle_checkout_completed(state: &AppState, event: &StripeEvent) {
    let object = &event.data.object;

    let Some(customer_id) = jstr(object, "customer") else {
        tracing::warn!(event_id = %event.id, "Checkout session has no customer id");
        return;
    };

    let user_id = jstr(object, "client_reference_id").or_else(|| {
        object
            .get("metadata")
            .and_then(|m| m.get("user_id"))
            .and_then(|v| v.as_str())
    });

    let Some(user_id) = user_id else {
        tracing::warn!(event_id = %event.id, "Checkout session carries no user reference");
        return;
    };

    let record = match state.db.get_user(user_id).await {
        Ok(Some(record)) => Some(record),
        Ok(None) => None,
        Err(e) => {
            tracing::error!(error = %e, user_id = %user_id, "User lookup failed for checkout event");
            return;
        }
    };

    let mut record = match record {
        Some(record) => record,
        None => {
            // Checkout for an identity we have no row for yet
            let email = jstr(object, "customer_email");
            let mut record = crate::models::UserRecord::new(user_id, email);
            record.role = state.entitlements.initial_role(email);
            record
        }
    };

    record.payments_customer_id = Some(customer_id.to_string());
    record.updated_at = chrono::Utc::now();

    if let Err(e) = state.db.upsert_user(&record).await {
        tracing::error!(error = %e, user_id = %user_id, "Failed to attach customer id");
        return;
    }

    state.entitlements.invalidate(user_id);
    tracing::info!(user_id = %user_id, customer_id = %customer_id, "Checkout completed, customer attached");
}

/// Subscription lifecycle change: mirror the status onto the owning
/// user's record and drop their cached entitlement.
async fn apply_subscription_object(
    state: &AppState,
    event: &StripeEvent,
    override_status: Option<SubscriptionStatus>,
) {
    let object = &event.data.object;

    let Some(customer_id) = jstr(object, "customer") else {
        tracing::warn!(event_id = %event.id, "Subscription event has no customer id");
        return;
    };

    let status = override_status.unwrap_or_else(|| {
        SubscriptionStatus::from_stripe(jstr(object, "status").unwrap_or_default())
    });

    let record = match state.db.get_user_by_customer_id(customer_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::warn!(customer_id = %customer_id, "Subscription event for unknown customer");
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, customer_id = %customer_id, "Customer lookup failed");
            return;
        }
    };

    if let Err(e) = state.db.update_subscription_status(&record.id, status).await {
        tracing::error!(error = %e, user_id = %record.id, "Failed to mirror subscription status");
        return;
    }

    state.entitlements.invalidate(&record.id);
    tracing::info!(
        user_id = %record.id,
        status = ?status,
        event_type = %event.event_type,
        "Subscription status mirrored"
    );
}
