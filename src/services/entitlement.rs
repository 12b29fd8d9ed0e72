// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entitlement resolution: does this identity currently have access to
//! paid features, and which niches are unlocked?
//!
//! Every call site (payment-status route, force-refresh route, admin
//! debug view, edge gate) goes through this one resolver; none of them
//! re-implements the branching.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::db::SupabaseDb;
use crate::error::AppError;
use crate::models::{EntitlementResult, Niche, SubscriptionStatus, UserRecord, UserRole};
use crate::services::stripe::StripeService;

/// How long a computed result stays valid in the access cache.
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// The caller's identity as taken from the session token.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    /// May be absent from the token; the resolver then falls back to the
    /// stored record. An identity with neither is treated as unknown.
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: &str, email: Option<&str>) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: email.map(str::to_string),
        }
    }
}

/// Whether a resolution may serve from the access cache or must verify
/// against Stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Serve a fresh-enough cached result; compute from stored data on miss.
    Cached,
    /// Bypass the cache and verify the subscription status live.
    Live,
}

struct CachedEntitlement {
    result: EntitlementResult,
    cached_at: Instant,
}

/// Entitlement resolver with its shared access cache.
#[derive(Clone)]
pub struct EntitlementService {
    db: SupabaseDb,
    stripe: StripeService,
    /// Lowercased admin seed list (transition-period fallback; the
    /// persisted role is authoritative)
    admin_emails: Arc<Vec<String>>,
    cache: Arc<DashMap<String, CachedEntitlement>>,
}

impl EntitlementService {
    pub fn new(db: SupabaseDb, stripe: StripeService, admin_emails: Vec<String>) -> Self {
        Self {
            db,
            stripe,
            admin_emails: Arc::new(
                admin_emails.into_iter().map(|e| e.to_lowercase()).collect(),
            ),
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Resolve the caller's entitlement.
    ///
    /// A missing record is a normal "no access" outcome for a brand-new
    /// identity. The only error surfaced to the caller is a malformed
    /// identity (no id at all).
    pub async fn resolve(
        &self,
        identity: &Identity,
        mode: RefreshMode,
    ) -> Result<EntitlementResult, AppError> {
        if identity.user_id.is_empty() {
            return Err(AppError::Unauthorized);
        }

        if mode == RefreshMode::Cached {
            if let Some(hit) = self.cache_get(&identity.user_id) {
                return Ok(hit);
            }
        }

        let result = self.resolve_uncached(identity, mode).await?;

        self.cache.insert(
            identity.user_id.clone(),
            CachedEntitlement {
                result: result.clone(),
                cached_at: Instant::now(),
            },
        );

        Ok(result)
    }

    /// Drop any cached result for a user. Called after checkout completes
    /// or a subscription lifecycle webhook lands.
    pub fn invalidate(&self, user_id: &str) {
        self.cache.remove(user_id);
    }

    /// The role a newly created record should carry. This is the only
    /// place the allow-list grants anything; runtime checks read the
    /// persisted role.
    pub fn initial_role(&self, email: Option<&str>) -> UserRole {
        match email {
            Some(email) if self.email_on_allowlist(email) => UserRole::Admin,
            _ => UserRole::User,
        }
    }

    fn cache_get(&self, user_id: &str) -> Option<EntitlementResult> {
        let entry = self.cache.get(user_id)?;
        if entry.cached_at.elapsed() < CACHE_TTL {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    fn email_on_allowlist(&self, email: &str) -> bool {
        let email = email.to_lowercase();
        self.admin_emails.iter().any(|a| *a == email)
    }

    /// True if the record carries the admin role, or (transition fallback)
    /// the identity's or record's email is on the seed list. An identity
    /// with no email and no record is treated as unknown, never guessed.
    fn is_admin(&self, identity: &Identity, record: Option<&UserRecord>) -> bool {
        if record.is_some_and(|r| r.role == UserRole::Admin) {
            return true;
        }
        let email = identity
            .email
            .as_deref()
            .or(record.map(|r| r.email.as_str()));
        email.is_some_and(|e| self.email_on_allowlist(e))
    }

    async fn resolve_uncached(
        &self,
        identity: &Identity,
        mode: RefreshMode,
    ) -> Result<EntitlementResult, AppError> {
        // Primary lookup by id, secondary by email
        let record = match self.db.get_user(&identity.user_id).await? {
            Some(record) => Some(record),
            None => match identity.email.as_deref() {
                Some(email) => self.db.get_user_by_email(email).await?,
                None => None,
            },
        };

        // Admins get everything and never touch Stripe
        if self.is_admin(identity, record.as_ref()) {
            return Ok(EntitlementResult::admin());
        }

        let Some(record) = record else {
            return Ok(EntitlementResult::no_access());
        };

        let has_completed_onboarding = record.onboarding_completed;
        let mut status = record.subscription_status;

        // Paid-niche grace clause: a purchased niche stays unlocked even
        // after cancellation.
        let grace = !record.niches.is_empty() && record.payments_customer_id.is_some();
        let mut has_active_subscription = status.grants_access() || grace;

        if mode == RefreshMode::Live && has_completed_onboarding {
            if let Some(customer_id) = record.payments_customer_id.as_deref() {
                match self.stripe.latest_subscription(customer_id).await {
                    Ok(Some(subscription)) => {
                        let live = SubscriptionStatus::from_stripe(&subscription.status);
                        if live != status {
                            tracing::info!(
                                user_id = %record.id,
                                stored = ?status,
                                live = ?live,
                                "Live verification changed subscription status"
                            );
                            if let Err(e) =
                                self.db.update_subscription_status(&record.id, live).await
                            {
                                tracing::warn!(
                                    error = %e,
                                    user_id = %record.id,
                                    "Failed to persist live subscription status"
                                );
                            }
                        }
                        // The live value supersedes the stored one and the
                        // grace clause no longer applies.
                        status = live;
                        has_active_subscription = live.grants_access();
                    }
                    Ok(None) => {
                        tracing::debug!(
                            user_id = %record.id,
                            "No subscription at Stripe, keeping stored status"
                        );
                    }
                    Err(e) => {
                        // Live verification failure must never be fatal
                        tracing::warn!(
                            error = %e,
                            user_id = %record.id,
                            "Live verification failed, using stored status"
                        );
                    }
                }
            }
        }

        let primary_niche = record.primary_niche.unwrap_or(Niche::Creator);
        let niches = if record.niches.is_empty() {
            vec![primary_niche]
        } else {
            record.niches.clone()
        };

        Ok(EntitlementResult {
            has_completed_onboarding,
            has_active_subscription,
            subscription_status: status,
            subscription_tier: record.subscription_tier,
            primary_niche: Some(primary_niche),
            niches,
            payments_customer_id: record.payments_customer_id,
        })
    }
}
