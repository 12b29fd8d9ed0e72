// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Opportunity activity timeline: list, record, and live stream.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ActivityType, OpportunityActivity};
use crate::services::ActivityEvent;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Extension, Json, Router,
};
use futures_util::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activities", get(list_activities).post(record_activity))
        .route("/api/activities/stream", get(stream_activities))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    opportunity_id: Uuid,
}

/// Timeline for one opportunity, newest first. Scoped to the caller; an
/// opportunity id belonging to someone else just yields an empty list.
async fn list_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OpportunityActivity>>> {
    let rows = state
        .db
        .activities_for_opportunity(&user.user_id, query.opportunity_id)
        .await?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordActivityRequest {
    opportunity_id: Uuid,
    activity_type: ActivityType,
    description: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

/// Append a timeline entry. The event bus is notified only after the row
/// is stored.
async fn record_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RecordActivityRequest>,
) -> Result<(StatusCode, Json<OpportunityActivity>)> {
    if body.description.trim().is_empty() {
        return Err(AppError::BadRequest("description is required".to_string()));
    }

    let activity = OpportunityActivity::new(
        body.opportunity_id,
        &user.user_id,
        body.activity_type,
        body.description,
        body.metadata,
    );

    state.db.insert_activity(&activity).await?;
    state.events.publish(ActivityEvent::from(&activity));

    Ok((StatusCode::CREATED, Json(activity)))
}

/// Live stream of the caller's own activity events (SSE).
async fn stream_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = futures_util::stream::unfold(
        (rx, user.user_id),
        |(mut rx, user_id)| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.user_id == user_id => {
                        match Event::default().event("activity").json_data(&event) {
                            Ok(sse_event) => return Some((Ok(sse_event), (rx, user_id))),
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to encode SSE event");
                                continue;
                            }
                        }
                    }
                    // Not ours
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "SSE subscriber lagged, events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}
