// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe webhook endpoint tests: signature enforcement, event side
//! effects, and idempotent redelivery.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

use tango_crm::models::{SubscriptionStatus, UserRecord};
use tango_crm::services::stripe::sign_payload;
use tango_crm::AppState;

mod common;

fn signed_webhook(state: &AppState, event: &serde_json::Value) -> Request<Body> {
    let payload = serde_json::to_vec(event).unwrap();
    let signature = sign_payload(
        &state.config.stripe_webhook_secret,
        &payload,
        chrono::Utc::now().timestamp(),
    );

    Request::builder()
        .method("POST")
        .uri("/api/stripe/webhook")
        .header("stripe-signature", signature)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload))
        .unwrap()
}

fn subscription_event(id: &str, event_type: &str, customer: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "type": event_type,
        "data": { "object": { "customer": customer, "status": status } }
    })
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/stripe/webhook")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"id":"evt_1","type":"x","data":{"object":{}}}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_signature_is_rejected() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/stripe/webhook")
                .header("stripe-signature", "t=0,v1=deadbeef")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"id":"evt_1","type":"x","data":{"object":{}}}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "invalid_signature");
}

#[tokio::test]
async fn test_checkout_completed_attaches_customer() {
    let (app, state) = common::create_test_app();
    state
        .db
        .upsert_user(&UserRecord::new("user_1", Some("u@example.com")))
        .await
        .unwrap();

    let event = serde_json::json!({
        "id": "evt_checkout_1",
        "type": "checkout.session.completed",
        "data": { "object": {
            "customer": "cus_9",
            "client_reference_id": "user_1",
            "payment_status": "paid"
        }}
    });

    let response = app.oneshot(signed_webhook(&state, &event)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["received"], true);

    let record = state.db.get_user("user_1").await.unwrap().unwrap();
    assert_eq!(record.payments_customer_id.as_deref(), Some("cus_9"));
}

#[tokio::test]
async fn test_subscription_update_mirrors_status() {
    let (app, state) = common::create_test_app();

    let mut record = UserRecord::new("user_1", Some("u@example.com"));
    record.payments_customer_id = Some("cus_9".to_string());
    state.db.upsert_user(&record).await.unwrap();

    let event = subscription_event("evt_sub_1", "customer.subscription.updated", "cus_9", "past_due");
    let response = app.oneshot(signed_webhook(&state, &event)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = state.db.get_user("user_1").await.unwrap().unwrap();
    assert_eq!(stored.subscription_status, SubscriptionStatus::PastDue);
}

#[tokio::test]
async fn test_subscription_deleted_marks_canceled() {
    let (app, state) = common::create_test_app();

    let mut record = UserRecord::new("user_1", None);
    record.subscription_status = SubscriptionStatus::Active;
    record.payments_customer_id = Some("cus_9".to_string());
    state.db.upsert_user(&record).await.unwrap();

    let event = serde_json::json!({
        "id": "evt_del_1",
        "type": "customer.subscription.deleted",
        "data": { "object": { "customer": "cus_9" } }
    });

    let response = app.oneshot(signed_webhook(&state, &event)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = state.db.get_user("user_1").await.unwrap().unwrap();
    assert_eq!(stored.subscription_status, SubscriptionStatus::Canceled);
}

#[tokio::test]
async fn test_redelivered_event_is_acknowledged_without_side_effects() {
    let (app, state) = common::create_test_app();

    let mut record = UserRecord::new("user_1", None);
    record.payments_customer_id = Some("cus_9".to_string());
    state.db.upsert_user(&record).await.unwrap();

    let first = subscription_event("evt_dup", "customer.subscription.updated", "cus_9", "past_due");
    let response = app.clone().oneshot(signed_webhook(&state, &first)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Same event id arrives again carrying a different body; the ledger
    // wins and nothing is re-applied
    let replay = subscription_event("evt_dup", "customer.subscription.updated", "cus_9", "active");
    let response = app.oneshot(signed_webhook(&state, &replay)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["duplicate"], true);

    let stored = state.db.get_user("user_1").await.unwrap().unwrap();
    assert_eq!(stored.subscription_status, SubscriptionStatus::PastDue);
}

#[tokio::test]
async fn test_event_for_unknown_customer_is_acknowledged() {
    let (app, state) = common::create_test_app();

    let event = subscription_event("evt_x", "customer.subscription.updated", "cus_missing", "active");
    let response = app.oneshot(signed_webhook(&state, &event)).await.unwrap();

    // Stripe must not retry forever over a customer we never stored
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unhandled_event_types_are_acknowledged() {
    let (app, state) = common::create_test_app();

    let event = serde_json::json!({
        "id": "evt_other",
        "type": "invoice.paid",
        "data": { "object": {} }
    });

    let response = app.oneshot(signed_webhook(&state, &event)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_subscription_change_invalidates_cached_entitlement() {
    let (app, state) = common::create_test_app();

    let mut record = UserRecord::new("user_1", Some("u@example.com"));
    record.onboarding_completed = true;
    record.subscription_status = SubscriptionStatus::Active;
    record.primary_niche = Some(tango_crm::models::Niche::Creator);
    state.db.upsert_user(&record).await.unwrap();

    // Prime the cache with the active snapshot
    let auth = common::bearer(&state, "user_1", None);
    let response = app
        .clone()
        .oneshot(common::authed_get("/api/user/payment-status", &auth))
        .await
        .unwrap();
    let body = common::body_json(response).await;
    assert_eq!(body["hasActiveSubscription"], true);

    // Cancellation webhook lands (no customer id on record, so no grace)
    record.payments_customer_id = Some("cus_9".to_string());
    state.db.upsert_user(&record).await.unwrap();
    let event = serde_json::json!({
        "id": "evt_cancel",
        "type": "customer.subscription.deleted",
        "data": { "object": { "customer": "cus_9" } }
    });
    let response = app.clone().oneshot(signed_webhook(&state, &event)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Next status check recomputes instead of serving the stale snapshot
    let response = app
        .oneshot(common::authed_get("/api/user/payment-status", &auth))
        .await
        .unwrap();
    let body = common::body_json(response).await;
    assert_eq!(body["subscriptionStatus"], "canceled");
}
