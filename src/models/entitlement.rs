// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The derived entitlement result returned to the UI and the edge gate.

use serde::{Deserialize, Serialize};

use super::user::{Niche, SubscriptionStatus, SubscriptionTier};

/// Computed right of an identity to use paid features.
///
/// Never persisted; computed per resolution and cached briefly per user.
/// Serialized camelCase because this is the wire contract with the
/// dashboard hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementResult {
    pub has_completed_onboarding: bool,
    pub has_active_subscription: bool,
    pub subscription_status: SubscriptionStatus,
    pub subscription_tier: SubscriptionTier,
    pub primary_niche: Option<Niche>,
    pub niches: Vec<Niche>,
    pub payments_customer_id: Option<String>,
}

impl EntitlementResult {
    /// The legitimate state for a brand-new identity with no record.
    /// Not an error.
    pub fn no_access() -> Self {
        Self {
            has_completed_onboarding: false,
            has_active_subscription: false,
            subscription_status: SubscriptionStatus::Inactive,
            subscription_tier: SubscriptionTier::Free,
            primary_niche: None,
            niches: Vec::new(),
            payments_customer_id: None,
        }
    }

    /// Full entitlement for admins: every niche, no billing involved.
    pub fn admin() -> Self {
        Self {
            has_completed_onboarding: true,
            has_active_subscription: true,
            subscription_status: SubscriptionStatus::Active,
            subscription_tier: SubscriptionTier::Admin,
            primary_niche: Some(Niche::Creator),
            niches: Niche::ALL.to_vec(),
            payments_customer_id: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.subscription_tier == SubscriptionTier::Admin
    }
}
