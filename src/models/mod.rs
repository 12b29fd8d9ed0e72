// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod entitlement;
pub mod user;

pub use activity::{ActivityType, OpportunityActivity};
pub use entitlement::EntitlementResult;
pub use user::{Niche, SubscriptionStatus, SubscriptionTier, UserRecord, UserRole};
