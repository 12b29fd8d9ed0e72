// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session token authentication.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "tango_session";

/// Session token claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Email, when the identity provider supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from the session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

/// Pull a valid session out of the request headers, cookie first, then
/// the Authorization header. Shared between the edge gate (which needs a
/// non-rejecting probe) and `require_auth`.
pub fn extract_auth_user(headers: &HeaderMap, signing_key: &[u8]) -> Option<AuthUser> {
    let jar = CookieJar::from_headers(headers);
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())?;
        auth_header.strip_prefix("Bearer ")?.to_string()
    };

    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<Claims>(&token, &key, &validation).ok()?;

    if token_data.claims.sub.is_empty() {
        return None;
    }

    Some(AuthUser {
        user_id: token_data.claims.sub,
        email: token_data.claims.email,
    })
}

/// Middleware that requires a valid session token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_user = extract_auth_user(request.headers(), &state.config.jwt_signing_key)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Create a session token for a user.
pub fn create_session_jwt(
    user_id: &str,
    email: Option<&str>,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.map(str::to_string),
        iat: now,
        exp: now + 30 * 24 * 60 * 60, // 30 days
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const KEY: &[u8] = b"test_jwt_key_32_bytes_minimum!!";

    #[test]
    fn test_bearer_header_round_trip() {
        let token = create_session_jwt("user_1", Some("u@example.com"), KEY).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        let user = extract_auth_user(&headers, KEY).unwrap();
        assert_eq!(user.user_id, "user_1");
        assert_eq!(user.email.as_deref(), Some("u@example.com"));
    }

    #[test]
    fn test_cookie_takes_precedence_over_header() {
        let cookie_token = create_session_jwt("cookie_user", None, KEY).unwrap();
        let header_token = create_session_jwt("header_user", None, KEY).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, cookie_token)).unwrap(),
        );
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", header_token)).unwrap(),
        );

        let user = extract_auth_user(&headers, KEY).unwrap();
        assert_eq!(user.user_id, "cookie_user");
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let token = create_session_jwt("user_1", None, KEY).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        assert!(extract_auth_user(&headers, b"another_key_entirely_here!!!!!!").is_none());
    }

    #[test]
    fn test_missing_token_yields_none() {
        assert!(extract_auth_user(&HeaderMap::new(), KEY).is_none());
    }
}
