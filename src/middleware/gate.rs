// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Edge gate: every request is classified and checked against the
//! caller's entitlement before it reaches a handler.
//!
//! Page routes get redirects (the frontend renders the destination),
//! API routes get JSON status codes. On resolver failure the gate fails
//! closed, treating the caller as unentitled.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::error::AppError;
use crate::middleware::auth::extract_auth_user;
use crate::services::{Identity, RefreshMode};
use crate::AppState;

/// What a path requires before a handler may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// No session needed (marketing pages, auth endpoints, webhooks)
    Public,
    /// Session needed, entitlement not checked (onboarding, billing setup)
    AuthOnly,
    /// Session plus completed onboarding plus active subscription
    Protected,
    /// Admin role required
    Admin,
}

const PUBLIC_PREFIXES: &[&str] = &[
    "/",
    "/health",
    "/signin",
    "/signup",
    "/pricing",
    "/terms",
    "/privacy",
    "/api/auth",
    "/api/stripe/webhook",
];

const ADMIN_PREFIXES: &[&str] = &["/admin", "/api/admin"];

const PROTECTED_PREFIXES: &[&str] = &[
    "/dashboard",
    "/clients",
    "/calendar",
    "/api/activities",
    "/api/dashboard",
];

/// Prefix match on path segments: "/api/auth" covers "/api/auth/signin"
/// but not "/api/authx". The bare "/" prefix covers only "/" itself.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

pub fn classify(path: &str) -> RouteClass {
    // Admin before public: "/admin" must never fall through
    if ADMIN_PREFIXES.iter().any(|p| matches_prefix(path, p)) {
        return RouteClass::Admin;
    }
    if PUBLIC_PREFIXES.iter().any(|p| matches_prefix(path, p)) {
        return RouteClass::Public;
    }
    if PROTECTED_PREFIXES.iter().any(|p| matches_prefix(path, p)) {
        return RouteClass::Protected;
    }
    RouteClass::AuthOnly
}

fn is_api(path: &str) -> bool {
    matches_prefix(path, "/api")
}

/// Deny with the error's JSON response for API calls or a redirect for pages.
fn deny(path: &str, frontend_url: &str, error: AppError, page: &str) -> Response {
    if is_api(path) {
        error.into_response()
    } else {
        Redirect::temporary(&format!("{}{}", frontend_url, page)).into_response()
    }
}

pub async fn edge_gate(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    let class = classify(&path);
    if class == RouteClass::Public {
        return next.run(request).await;
    }

    let Some(user) = extract_auth_user(request.headers(), &state.config.jwt_signing_key) else {
        return deny(
            &path,
            &state.config.frontend_url,
            AppError::Unauthorized,
            "/signin",
        );
    };

    if class == RouteClass::AuthOnly {
        return next.run(request).await;
    }

    let identity = Identity::new(&user.user_id, user.email.as_deref());
    let entitlement = match state
        .entitlements
        .resolve(&identity, RefreshMode::Cached)
        .await
    {
        Ok(entitlement) => entitlement,
        Err(e) => {
            // Fail closed: an unresolvable caller is an unentitled caller
            tracing::warn!(error = %e, user_id = %user.user_id, "Entitlement resolution failed at gate");
            return deny(
                &path,
                &state.config.frontend_url,
                AppError::PaymentRequired,
                "/pricing?require_payment=true",
            );
        }
    };

    match class {
        RouteClass::Admin => {
            if entitlement.is_admin() {
                next.run(request).await
            } else {
                // Non-admins are sent back to the home page
                deny(&path, &state.config.frontend_url, AppError::Forbidden, "/")
            }
        }
        RouteClass::Protected => {
            // Admins bypass onboarding and subscription checks
            if entitlement.is_admin() {
                return next.run(request).await;
            }
            if !entitlement.has_completed_onboarding {
                return deny(
                    &path,
                    &state.config.frontend_url,
                    AppError::Forbidden,
                    "/onboarding",
                );
            }
            if !entitlement.has_active_subscription {
                return deny(
                    &path,
                    &state.config.frontend_url,
                    AppError::PaymentRequired,
                    "/pricing?require_payment=true",
                );
            }
            next.run(request).await
        }
        RouteClass::Public | RouteClass::AuthOnly => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_public_but_subpaths_are_not() {
        assert_eq!(classify("/"), RouteClass::Public);
        assert_eq!(classify("/anything"), RouteClass::AuthOnly);
    }

    #[test]
    fn test_public_prefixes() {
        assert_eq!(classify("/health"), RouteClass::Public);
        assert_eq!(classify("/pricing"), RouteClass::Public);
        assert_eq!(classify("/api/auth/signin"), RouteClass::Public);
        assert_eq!(classify("/api/stripe/webhook"), RouteClass::Public);
    }

    #[test]
    fn test_prefix_match_respects_segments() {
        assert!(matches_prefix("/api/auth/signin", "/api/auth"));
        assert!(!matches_prefix("/api/authx", "/api/auth"));
        assert!(matches_prefix("/api/auth", "/api/auth"));
    }

    #[test]
    fn test_admin_prefixes_win() {
        assert_eq!(classify("/admin"), RouteClass::Admin);
        assert_eq!(classify("/api/admin/entitlement/u1"), RouteClass::Admin);
    }

    #[test]
    fn test_protected_prefixes() {
        assert_eq!(classify("/dashboard"), RouteClass::Protected);
        assert_eq!(classify("/clients/abc"), RouteClass::Protected);
        assert_eq!(classify("/api/activities"), RouteClass::Protected);
    }

    #[test]
    fn test_everything_else_needs_auth_only() {
        assert_eq!(classify("/onboarding"), RouteClass::AuthOnly);
        assert_eq!(classify("/api/user/payment-status"), RouteClass::AuthOnly);
        assert_eq!(
            classify("/api/stripe/create-checkout-session"),
            RouteClass::AuthOnly
        );
    }
}
