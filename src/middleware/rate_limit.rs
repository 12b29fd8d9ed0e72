// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sliding-window rate limiting, applied before any auth work.
//!
//! Limits are keyed by client IP and path bucket. The counter store is a
//! trait so deployments running more than one instance can plug in a
//! shared store without touching the enforcement logic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::error::AppError;
use crate::AppState;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

/// Counter storage behind the limiter.
pub trait RateLimitStore: Send + Sync {
    /// Record a request attempt against `key` and decide whether it fits
    /// in the window. Rejected attempts must not extend the window.
    fn check(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
        max_requests: usize,
    ) -> RateDecision;
}

/// How many checks between sweeps of keys that went quiet.
const SWEEP_EVERY: u64 = 256;

/// In-process store: per-key timestamps of accepted requests.
#[derive(Default)]
pub struct MemoryRateLimitStore {
    hits: DashMap<String, Vec<DateTime<Utc>>>,
    checks: AtomicU64,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.hits.len()
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    fn check(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
        max_requests: usize,
    ) -> RateDecision {
        let cutoff = now - window;

        // Periodically drop keys whose hits have all aged out, so clients
        // that went quiet do not pin a Vec forever. All buckets share the
        // 60s window, making one cutoff safe for the whole map. Must run
        // before the entry guard below is taken.
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.hits.retain(|_, hits| hits.iter().any(|t| *t > cutoff));
        }

        let mut entry = self.hits.entry(key.to_string()).or_default();
        entry.retain(|t| *t > cutoff);

        if entry.len() >= max_requests {
            // Oldest surviving hit decides when a slot frees up
            let retry_after = entry
                .first()
                .map(|oldest| (*oldest + window - now).num_seconds().max(1) as u64)
                .unwrap_or(1);
            return RateDecision::Limited {
                retry_after_secs: retry_after,
            };
        }

        entry.push(now);
        RateDecision::Allowed
    }
}

struct Bucket {
    prefix: &'static str,
    max_requests: usize,
    window_secs: i64,
}

/// Buckets are matched longest-prefix-first; the catch-all covers page
/// routes and anything new.
const BUCKETS: &[Bucket] = &[
    Bucket {
        prefix: "/api/auth",
        max_requests: 5,
        window_secs: 60,
    },
    Bucket {
        prefix: "/api/stripe",
        max_requests: 20,
        window_secs: 60,
    },
    Bucket {
        prefix: "/api/admin",
        max_requests: 20,
        window_secs: 60,
    },
    Bucket {
        prefix: "/api",
        max_requests: 120,
        window_secs: 60,
    },
    Bucket {
        prefix: "",
        max_requests: 300,
        window_secs: 60,
    },
];

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    pub fn check(&self, client_ip: &str, path: &str) -> RateDecision {
        self.check_at(client_ip, path, Utc::now())
    }

    /// Check with an explicit clock.
    pub fn check_at(&self, client_ip: &str, path: &str, now: DateTime<Utc>) -> RateDecision {
        let bucket = BUCKETS
            .iter()
            .filter(|b| path.starts_with(b.prefix))
            .max_by_key(|b| b.prefix.len())
            .unwrap_or(&BUCKETS[BUCKETS.len() - 1]);

        let key = format!("{}:{}", client_ip, bucket.prefix);
        self.store.check(
            &key,
            now,
            Duration::seconds(bucket.window_secs),
            bucket.max_requests,
        )
    }
}

/// Best-effort client IP: first hop of X-Forwarded-For, else a fixed
/// local key (tests and direct connections).
fn client_ip(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| "local".to_string())
}

/// Middleware enforcing the per-bucket limits. Runs before auth so a
/// flood of bad credentials still gets throttled.
pub async fn enforce_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(&request);
    let path = request.uri().path().to_string();

    match state.rate_limiter.check(&ip, &path) {
        RateDecision::Allowed => Ok(next.run(request).await),
        RateDecision::Limited { retry_after_secs } => {
            tracing::warn!(ip = %ip, path = %path, "Rate limit exceeded");
            Err(AppError::RateLimited { retry_after_secs })
        }
    }
}
