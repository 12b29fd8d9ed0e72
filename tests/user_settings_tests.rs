// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Onboarding and profile settings tests.

use axum::http::StatusCode;
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_timezone_defaults_to_utc() {
    let (app, state) = common::create_test_app();
    let auth = common::bearer(&state, "user_1", None);

    let response = app
        .oneshot(common::authed_get("/api/user/timezone", &auth))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["timezone"], "UTC");
}

#[tokio::test]
async fn test_timezone_round_trip() {
    let (app, state) = common::create_test_app();
    let auth = common::bearer(&state, "user_1", Some("u@example.com"));

    let response = app
        .clone()
        .oneshot(common::authed_post_json(
            "/api/user/timezone",
            &auth,
            &serde_json::json!({ "timezone": "America/New_York" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(common::authed_get("/api/user/timezone", &auth))
        .await
        .unwrap();
    let body = common::body_json(response).await;
    assert_eq!(body["timezone"], "America/New_York");
}

#[tokio::test]
async fn test_invalid_timezone_is_rejected() {
    let (app, state) = common::create_test_app();
    let auth = common::bearer(&state, "user_1", None);

    let response = app
        .oneshot(common::authed_post_json(
            "/api/user/timezone",
            &auth,
            &serde_json::json!({ "timezone": "Mars/Olympus_Mons" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "bad_request");
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("Mars/Olympus_Mons"));
}

#[tokio::test]
async fn test_onboarding_unlocks_the_shell() {
    let (app, state) = common::create_test_app();
    let auth = common::bearer(&state, "user_1", Some("u@example.com"));

    let response = app
        .clone()
        .oneshot(common::authed_post_json(
            "/api/user/onboarding",
            &auth,
            &serde_json::json!({ "primaryNiche": "coach" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["hasCompletedOnboarding"], true);
    // Niche list falls back to the primary choice
    assert_eq!(body["niches"], serde_json::json!(["coach"]));
    // Still unpaid
    assert_eq!(body["hasActiveSubscription"], false);

    let record = state.db.get_user("user_1").await.unwrap().unwrap();
    assert!(record.onboarding_completed);
    assert_eq!(record.email, "u@example.com");
}

#[tokio::test]
async fn test_onboarding_accepts_multiple_niches() {
    let (app, state) = common::create_test_app();
    let auth = common::bearer(&state, "user_1", None);

    let response = app
        .oneshot(common::authed_post_json(
            "/api/user/onboarding",
            &auth,
            &serde_json::json!({
                "primaryNiche": "creator",
                "niches": ["creator", "freelancer"]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["primaryNiche"], "creator");
    assert_eq!(body["niches"], serde_json::json!(["creator", "freelancer"]));
}

#[tokio::test]
async fn test_unknown_niche_is_rejected() {
    let (app, state) = common::create_test_app();
    let auth = common::bearer(&state, "user_1", None);

    let response = app
        .oneshot(common::authed_post_json(
            "/api/user/onboarding",
            &auth,
            &serde_json::json!({ "primaryNiche": "astronaut" }),
        ))
        .await
        .unwrap();

    // Serde rejects the unknown variant before the handler runs
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
