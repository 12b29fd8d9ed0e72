// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin-only routes. The edge gate has already verified the caller's
//! admin role before these handlers run.

use crate::error::Result;
use crate::models::EntitlementResult;
use crate::services::{Identity, RefreshMode};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/admin/entitlement/{user_id}", get(inspect_entitlement))
}

#[derive(Deserialize)]
struct InspectQuery {
    /// Verify against Stripe instead of serving the cached snapshot
    #[serde(default)]
    live: bool,
}

/// Support view: resolve any user's entitlement exactly the way the
/// product would.
async fn inspect_entitlement(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<InspectQuery>,
) -> Result<Json<EntitlementResult>> {
    let mode = if query.live {
        RefreshMode::Live
    } else {
        RefreshMode::Cached
    };

    let identity = Identity::new(&user_id, None);
    let result = state.entitlements.resolve(&identity, mode).await?;
    Ok(Json(result))
}
