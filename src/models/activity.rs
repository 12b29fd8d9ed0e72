// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity timeline entries for opportunities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of timeline event recorded against an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    NoteAdded,
    StageChanged,
    EmailSent,
    CallLogged,
    MeetingScheduled,
    FileUploaded,
}

/// One row in the `opportunity_activities` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityActivity {
    pub id: Uuid,
    pub opportunity_id: Uuid,
    /// Owner's external identity id
    pub user_id: String,
    pub activity_type: ActivityType,
    pub description: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl OpportunityActivity {
    pub fn new(
        opportunity_id: Uuid,
        user_id: &str,
        activity_type: ActivityType,
        description: String,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            opportunity_id,
            user_id: user_id.to_string(),
            activity_type,
            description,
            metadata,
            created_at: Utc::now(),
        }
    }
}
