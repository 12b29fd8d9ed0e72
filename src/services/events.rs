// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process activity event bus.
//!
//! Timeline writes publish here and the SSE stream endpoint subscribes.
//! Delivery is best-effort: with no subscribers events are dropped, and
//! a slow subscriber may miss events (the channel lags rather than
//! blocking publishers).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{ActivityType, OpportunityActivity};

const CHANNEL_CAPACITY: usize = 64;

/// Lightweight notification emitted after an activity is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub activity_id: Uuid,
    pub opportunity_id: Uuid,
    pub user_id: String,
    pub activity_type: ActivityType,
}

impl From<&OpportunityActivity> for ActivityEvent {
    fn from(activity: &OpportunityActivity) -> Self {
        Self {
            activity_id: activity.id,
            opportunity_id: activity.opportunity_id,
            user_id: activity.user_id.clone(),
            activity_type: activity.activity_type,
        }
    }
}

#[derive(Clone)]
pub struct ActivityEventBus {
    tx: broadcast::Sender<ActivityEvent>,
}

impl ActivityEventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish after the activity row is durably written, never before.
    pub fn publish(&self, event: ActivityEvent) {
        // send only fails with zero subscribers, which is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.tx.subscribe()
    }
}

impl Default for ActivityEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> ActivityEvent {
        ActivityEvent {
            activity_id: Uuid::new_v4(),
            opportunity_id: Uuid::new_v4(),
            user_id: "user_1".to_string(),
            activity_type: ActivityType::NoteAdded,
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let bus = ActivityEventBus::new();
        let mut rx = bus.subscribe();

        let event = sample_event();
        bus.publish(event.clone());

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_panic() {
        let bus = ActivityEventBus::new();
        bus.publish(sample_event());
    }

    #[tokio::test]
    async fn test_each_subscriber_gets_its_own_copy() {
        let bus = ActivityEventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let event = sample_event();
        bus.publish(event.clone());

        assert_eq!(rx1.recv().await.unwrap(), event);
        assert_eq!(rx2.recv().await.unwrap(), event);
    }
}
