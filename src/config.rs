// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and held in memory; in production
//! the deployment platform injects them as environment variables.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Non-sensitive ---
    /// Frontend URL for gate redirects and CORS
    pub frontend_url: String,
    /// Supabase project URL (REST surface lives under /rest/v1)
    pub supabase_url: String,
    /// Server port
    pub port: u16,
    /// Admin seed list: emails granted the admin role when their record
    /// is first created or backfilled. Runtime admin checks use the
    /// persisted role; this list only exists for the transition period.
    pub admin_emails: Vec<String>,

    // --- Secrets ---
    /// Supabase service-role key
    pub supabase_service_key: String,
    /// Stripe API secret key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            supabase_url: env::var("SUPABASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            admin_emails: env::var("ADMIN_EMAILS")
                .map(|v| parse_admin_emails(&v))
                .unwrap_or_default(),

            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_SERVICE_KEY"))?,
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRIPE_SECRET_KEY"))?,
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Default config for tests only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            port: 8080,
            admin_emails: vec!["admin@tangocrm.app".to_string()],
            supabase_service_key: "test_service_key".to_string(),
            stripe_secret_key: "sk_test_key".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

/// Parse the comma-separated admin email list, lowercased for
/// case-insensitive comparison.
fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
