// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Supabase REST surface).

pub mod supabase;

pub use supabase::SupabaseDb;

/// Table names as constants.
pub mod tables {
    pub const USERS: &str = "users";
    pub const OPPORTUNITY_ACTIVITIES: &str = "opportunity_activities";
    /// Ledger of processed Stripe event ids (webhook idempotency)
    pub const WEBHOOK_EVENTS: &str = "webhook_events";
}
