// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request middleware: auth, edge gate, rate limiting, security headers.

pub mod auth;
pub mod gate;
pub mod rate_limit;
pub mod security;

pub use auth::{require_auth, AuthUser};
pub use gate::edge_gate;
pub use rate_limit::{enforce_rate_limit, MemoryRateLimitStore, RateLimitStore, RateLimiter};
pub use security::add_security_headers;
