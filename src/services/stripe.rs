// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe API client for subscriptions, checkout, and webhooks.
//!
//! Handles:
//! - Listing a customer's subscriptions (live entitlement verification)
//! - Customer / checkout-session / billing-portal creation
//! - Webhook signature verification (HMAC-SHA256 over `{t}.{payload}`)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted skew between the signature timestamp and our clock.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Low-level Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: &'static str,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: STRIPE_API_BASE,
            secret_key,
        }
    }

    /// List a customer's subscriptions, any status, newest first.
    pub async fn list_subscriptions(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<StripeSubscription>, AppError> {
        let url = format!("{}/subscriptions", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .query(&[
                ("customer", customer_id.to_string()),
                ("status", "all".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::PaymentsApi(e.to_string()))?;

        let list: SubscriptionList = self.check_response_json(response).await?;
        Ok(list.data)
    }

    /// Create a customer tagged with our identity id.
    pub async fn create_customer(
        &self,
        email: &str,
        user_id: &str,
    ) -> Result<StripeCustomer, AppError> {
        let url = format!("{}/customers", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&[("email", email), ("metadata[user_id]", user_id)])
            .send()
            .await
            .map_err(|e| AppError::PaymentsApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Create a subscription checkout session.
    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
        client_reference_id: &str,
    ) -> Result<CheckoutSession, AppError> {
        let url = format!("{}/checkout/sessions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&[
                ("mode", "subscription"),
                ("customer", customer_id),
                ("line_items[0][price]", price_id),
                ("line_items[0][quantity]", "1"),
                ("success_url", success_url),
                ("cancel_url", cancel_url),
                ("client_reference_id", client_reference_id),
            ])
            .send()
            .await
            .map_err(|e| AppError::PaymentsApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Create a billing-portal session for self-serve plan management.
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError> {
        let url = format!("{}/billing_portal/sessions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&[("customer", customer_id), ("return_url", return_url)])
            .send()
            .await
            .map_err(|e| AppError::PaymentsApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PaymentsApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::PaymentsApi(format!("JSON parse error: {}", e)))
    }
}

/// One subscription as returned by Stripe.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    /// Creation time (Unix timestamp)
    pub created: i64,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Deserialize)]
struct SubscriptionList {
    data: Vec<StripeSubscription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

/// A verified webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// StripeService - high-level adapter with test backends
// ─────────────────────────────────────────────────────────────────────────────

/// High-level Stripe adapter.
///
/// The memory backend serves tests: canned subscriptions per customer id
/// plus a call counter, so tests can prove the resolver never queries
/// Stripe on admin and cached paths. The offline backend fails every call
/// to exercise failure tolerance.
#[derive(Clone)]
pub struct StripeService {
    backend: StripeBackend,
    webhook_secret: String,
}

#[derive(Clone)]
enum StripeBackend {
    Live(StripeClient),
    Memory(Arc<MockStripe>),
    Offline,
}

#[derive(Default)]
struct MockStripe {
    subscriptions: DashMap<String, StripeSubscription>,
    calls: AtomicU64,
}

impl StripeService {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            backend: StripeBackend::Live(StripeClient::new(secret_key)),
            webhook_secret,
        }
    }

    /// In-memory backend with canned subscriptions (tests only).
    pub fn new_memory(webhook_secret: String) -> Self {
        Self {
            backend: StripeBackend::Memory(Arc::new(MockStripe::default())),
            webhook_secret,
        }
    }

    /// Offline backend; every API call errors (tests only).
    pub fn new_mock() -> Self {
        Self {
            backend: StripeBackend::Offline,
            webhook_secret: "whsec_test_secret".to_string(),
        }
    }

    /// Install a canned subscription for a customer (memory backend only).
    pub fn set_mock_subscription(&self, customer_id: &str, status: &str) {
        if let StripeBackend::Memory(mock) = &self.backend {
            mock.subscriptions.insert(
                customer_id.to_string(),
                StripeSubscription {
                    id: format!("sub_mock_{}", customer_id),
                    status: status.to_string(),
                    created: chrono::Utc::now().timestamp(),
                    cancel_at_period_end: false,
                },
            );
        }
    }

    /// How many subscription lookups have hit the mock (memory backend only).
    pub fn mock_call_count(&self) -> u64 {
        match &self.backend {
            StripeBackend::Memory(mock) => mock.calls.load(Ordering::Relaxed),
            _ => 0,
        }
    }

    fn offline_err() -> AppError {
        AppError::PaymentsApi("Stripe not configured (offline mode)".to_string())
    }

    // ─── Subscription Source ─────────────────────────────────────

    /// The customer's most recent subscription, any status.
    pub async fn latest_subscription(
        &self,
        customer_id: &str,
    ) -> Result<Option<StripeSubscription>, AppError> {
        match &self.backend {
            StripeBackend::Live(client) => {
                let mut subs = client.list_subscriptions(customer_id, 1).await?;
                Ok(subs.pop())
            }
            StripeBackend::Memory(mock) => {
                mock.calls.fetch_add(1, Ordering::Relaxed);
                Ok(mock.subscriptions.get(customer_id).map(|s| s.clone()))
            }
            StripeBackend::Offline => Err(Self::offline_err()),
        }
    }

    // ─── Billing Operations ──────────────────────────────────────

    pub async fn create_customer(
        &self,
        email: &str,
        user_id: &str,
    ) -> Result<StripeCustomer, AppError> {
        match &self.backend {
            StripeBackend::Live(client) => client.create_customer(email, user_id).await,
            StripeBackend::Memory(_) => Ok(StripeCustomer {
                id: format!("cus_mock_{}", Uuid::new_v4().simple()),
            }),
            StripeBackend::Offline => Err(Self::offline_err()),
        }
    }

    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
        client_reference_id: &str,
    ) -> Result<CheckoutSession, AppError> {
        match &self.backend {
            StripeBackend::Live(client) => {
                client
                    .create_checkout_session(
                        customer_id,
                        price_id,
                        success_url,
                        cancel_url,
                        client_reference_id,
                    )
                    .await
            }
            StripeBackend::Memory(_) => Ok(CheckoutSession {
                id: format!("cs_mock_{}", Uuid::new_v4().simple()),
                url: "https://checkout.stripe.com/c/pay/mock".to_string(),
            }),
            StripeBackend::Offline => Err(Self::offline_err()),
        }
    }

    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError> {
        match &self.backend {
            StripeBackend::Live(client) => {
                client.create_portal_session(customer_id, return_url).await
            }
            StripeBackend::Memory(_) => Ok(PortalSession {
                url: "https://billing.stripe.com/p/session/mock".to_string(),
            }),
            StripeBackend::Offline => Err(Self::offline_err()),
        }
    }

    // ─── Webhooks ────────────────────────────────────────────────

    /// Verify a webhook payload against its `Stripe-Signature` header and
    /// parse the event. Signature failures reject the request outright.
    pub fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, AppError> {
        verify_signature(
            &self.webhook_secret,
            payload,
            signature_header,
            chrono::Utc::now().timestamp(),
        )?;

        serde_json::from_slice(payload)
            .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {}", e)))
    }
}

/// Verify a `Stripe-Signature` header: `t=<unix>,v1=<hex hmac>`.
///
/// The signed payload is `"{t}.{body}"`. Multiple `v1` entries may be
/// present during secret rotation; any valid one passes.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<(), AppError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(AppError::InvalidSignature)?;
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        tracing::warn!(timestamp, "Webhook signature timestamp outside tolerance");
        return Err(AppError::InvalidSignature);
    }

    if candidates.is_empty() {
        return Err(AppError::InvalidSignature);
    }

    for candidate in candidates {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);

        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(AppError::InvalidSignature)
}

/// Build a valid `Stripe-Signature` header for a payload (tests).
pub fn sign_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
