// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod entitlement;
pub mod events;
pub mod stripe;

pub use entitlement::{EntitlementService, Identity, RefreshMode};
pub use events::{ActivityEvent, ActivityEventBus};
pub use stripe::{StripeEvent, StripeService, StripeSubscription};
