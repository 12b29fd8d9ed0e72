// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User record as stored in the `users` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription status mirrored from Stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Inactive,
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unknown,
}

impl SubscriptionStatus {
    /// Statuses that grant access on their own, before the grace clause.
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing | Self::PastDue)
    }

    /// Map a raw Stripe subscription status string.
    ///
    /// Stripe has more states than we track (`incomplete`, `unpaid`, ...);
    /// anything unrecognized maps to `Unknown` rather than failing.
    pub fn from_stripe(raw: &str) -> Self {
        match raw {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "incomplete" | "incomplete_expired" | "unpaid" | "paused" => Self::Inactive,
            _ => Self::Unknown,
        }
    }
}

/// Feature tier reported to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Core,
    Admin,
}

/// Persisted role on the user record.
///
/// Admin is a stored role, not something recomputed from an email list on
/// every request. The configured allow-list only seeds this field when a
/// record is first created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

/// A feature-set / workspace variant a user can unlock individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Niche {
    Creator,
    Coach,
    Podcaster,
    Freelancer,
}

impl Niche {
    /// The full niche vocabulary, used for admin entitlements.
    pub const ALL: [Niche; 4] = [
        Niche::Creator,
        Niche::Coach,
        Niche::Podcaster,
        Niche::Freelancer,
    ];
}

/// User profile row, keyed by the external identity id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// External identity id (primary key)
    pub id: String,
    /// Email address; a placeholder until the identity provider shares it
    pub email: String,
    #[serde(default)]
    pub onboarding_completed: bool,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub primary_niche: Option<Niche>,
    /// Unlocked niches; set semantics, order irrelevant
    #[serde(default)]
    pub niches: Vec<Niche>,
    /// Stripe customer id, once billing has been set up
    #[serde(default)]
    pub payments_customer_id: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub updated_at: DateTime<Utc>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl UserRecord {
    /// A fresh record for an identity we have not seen before.
    pub fn new(id: &str, email: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            email: email
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}@placeholder.invalid", id)),
            onboarding_completed: false,
            subscription_status: SubscriptionStatus::Inactive,
            subscription_tier: SubscriptionTier::Free,
            role: UserRole::User,
            primary_niche: None,
            niches: Vec::new(),
            payments_customer_id: None,
            timezone: default_timezone(),
            updated_at: Utc::now(),
        }
    }
}
