// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile, onboarding, subscription state)
//! - Opportunity activities (timeline CRUD)
//! - Webhook event ledger (idempotent Stripe event processing)
//!
//! All writes go through the PostgREST surface with the service-role key;
//! row-level security is the hosted store's concern, not ours.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::db::tables;
use crate::error::AppError;
use crate::models::{OpportunityActivity, SubscriptionStatus, UserRecord};

/// Supabase database client.
#[derive(Clone)]
pub struct SupabaseDb {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    /// Real PostgREST client
    Rest(RestClient),
    /// In-memory store for tests (full read/write)
    Memory(MemoryStore),
    /// Every operation errors; used to prove failure tolerance
    Offline,
}

#[derive(Clone)]
struct RestClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Clone, Default)]
struct MemoryStore {
    users: Arc<DashMap<String, UserRecord>>,
    activities: Arc<DashMap<Uuid, OpportunityActivity>>,
    webhook_events: Arc<DashMap<String, String>>,
}

impl SupabaseDb {
    /// Create a client against a Supabase project.
    pub fn new(base_url: &str, service_key: &str) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Database(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            backend: Backend::Rest(RestClient {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                service_key: service_key.to_string(),
            }),
        })
    }

    /// Create an in-memory database for tests.
    pub fn new_memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryStore::default()),
        }
    }

    /// Create a mock client whose every operation fails (offline mode).
    pub fn new_mock() -> Self {
        Self {
            backend: Backend::Offline,
        }
    }

    fn offline_err() -> AppError {
        AppError::Database("Database not connected (offline mode)".to_string())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by their external identity id.
    pub async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        match &self.backend {
            Backend::Rest(rest) => {
                rest.select_one(tables::USERS, &[("id", &format!("eq.{}", id))])
                    .await
            }
            Backend::Memory(mem) => Ok(mem.users.get(id).map(|r| r.clone())),
            Backend::Offline => Err(Self::offline_err()),
        }
    }

    /// Secondary lookup by email, for identities whose token carried an
    /// email but whose record was created under a different id.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        match &self.backend {
            Backend::Rest(rest) => {
                rest.select_one(tables::USERS, &[("email", &format!("eq.{}", email))])
                    .await
            }
            Backend::Memory(mem) => Ok(mem
                .users
                .iter()
                .find(|r| r.email.eq_ignore_ascii_case(email))
                .map(|r| r.clone())),
            Backend::Offline => Err(Self::offline_err()),
        }
    }

    /// Lookup by Stripe customer id (webhook handlers resolve users this way).
    pub async fn get_user_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<UserRecord>, AppError> {
        match &self.backend {
            Backend::Rest(rest) => {
                rest.select_one(
                    tables::USERS,
                    &[("payments_customer_id", &format!("eq.{}", customer_id))],
                )
                .await
            }
            Backend::Memory(mem) => Ok(mem
                .users
                .iter()
                .find(|r| r.payments_customer_id.as_deref() == Some(customer_id))
                .map(|r| r.clone())),
            Backend::Offline => Err(Self::offline_err()),
        }
    }

    /// Create or update a user record.
    pub async fn upsert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        match &self.backend {
            Backend::Rest(rest) => {
                rest.upsert(tables::USERS, user).await?;
                Ok(())
            }
            Backend::Memory(mem) => {
                mem.users.insert(user.id.clone(), user.clone());
                Ok(())
            }
            Backend::Offline => Err(Self::offline_err()),
        }
    }

    /// Overwrite just the subscription status (live-verification write-back).
    pub async fn update_subscription_status(
        &self,
        id: &str,
        status: SubscriptionStatus,
    ) -> Result<(), AppError> {
        match &self.backend {
            Backend::Rest(rest) => {
                let patch = serde_json::json!({
                    "subscription_status": status,
                    "updated_at": Utc::now(),
                });
                rest.patch(tables::USERS, &[("id", &format!("eq.{}", id))], &patch)
                    .await
            }
            Backend::Memory(mem) => {
                if let Some(mut user) = mem.users.get_mut(id) {
                    user.subscription_status = status;
                    user.updated_at = Utc::now();
                }
                Ok(())
            }
            Backend::Offline => Err(Self::offline_err()),
        }
    }

    // ─── Webhook Event Ledger ────────────────────────────────────

    /// Record a Stripe event id; returns `true` if this is the first time
    /// we have seen it. Duplicates are acknowledged but must not re-apply
    /// side effects.
    pub async fn record_webhook_event(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> Result<bool, AppError> {
        match &self.backend {
            Backend::Rest(rest) => {
                let row = serde_json::json!({
                    "event_id": event_id,
                    "event_type": event_type,
                    "received_at": Utc::now(),
                });
                rest.insert_if_absent(tables::WEBHOOK_EVENTS, &row).await
            }
            Backend::Memory(mem) => Ok(mem
                .webhook_events
                .insert(event_id.to_string(), event_type.to_string())
                .is_none()),
            Backend::Offline => Err(Self::offline_err()),
        }
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Store a timeline activity.
    pub async fn insert_activity(&self, activity: &OpportunityActivity) -> Result<(), AppError> {
        match &self.backend {
            Backend::Rest(rest) => {
                rest.insert(tables::OPPORTUNITY_ACTIVITIES, activity).await
            }
            Backend::Memory(mem) => {
                mem.activities.insert(activity.id, activity.clone());
                Ok(())
            }
            Backend::Offline => Err(Self::offline_err()),
        }
    }

    /// Get the activity timeline for one opportunity, newest first.
    pub async fn activities_for_opportunity(
        &self,
        user_id: &str,
        opportunity_id: Uuid,
    ) -> Result<Vec<OpportunityActivity>, AppError> {
        match &self.backend {
            Backend::Rest(rest) => {
                rest.select_many(
                    tables::OPPORTUNITY_ACTIVITIES,
                    &[
                        ("user_id", &format!("eq.{}", user_id)),
                        ("opportunity_id", &format!("eq.{}", opportunity_id)),
                        ("order", "created_at.desc"),
                    ],
                )
                .await
            }
            Backend::Memory(mem) => {
                let mut rows: Vec<OpportunityActivity> = mem
                    .activities
                    .iter()
                    .filter(|a| a.user_id == user_id && a.opportunity_id == opportunity_id)
                    .map(|a| a.clone())
                    .collect();
                rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(rows)
            }
            Backend::Offline => Err(Self::offline_err()),
        }
    }
}

// ─── PostgREST plumbing ─────────────────────────────────────────

impl RestClient {
    fn url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn select_one<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, &str)],
    ) -> Result<Option<T>, AppError> {
        let mut rows: Vec<T> = self.select_rows(table, filters, Some(1)).await?;
        Ok(rows.pop())
    }

    async fn select_many<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<T>, AppError> {
        self.select_rows(table, filters, None).await
    }

    async fn select_rows<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, &str)],
        limit: Option<u32>,
    ) -> Result<Vec<T>, AppError> {
        let mut request = self.authed(self.http.get(self.url(table))).query(filters);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit.to_string())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Database(format!("JSON parse error: {}", e)))
    }

    async fn insert<T: serde::Serialize>(&self, table: &str, row: &T) -> Result<(), AppError> {
        let response = self
            .authed(self.http.post(self.url(table)))
            .header("Prefer", "return=minimal")
            .json(&[row])
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }

    async fn upsert<T: serde::Serialize>(&self, table: &str, row: &T) -> Result<(), AppError> {
        let response = self
            .authed(self.http.post(self.url(table)))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row])
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }

    /// Insert with duplicate suppression; `true` means the row was new.
    ///
    /// PostgREST returns the inserted rows under `ignore-duplicates`, so an
    /// empty representation means the key already existed.
    async fn insert_if_absent<T: serde::Serialize>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<bool, AppError> {
        let response = self
            .authed(self.http.post(self.url(table)))
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(&[row])
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let inserted: Vec<serde_json::Value> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Database(format!("JSON parse error: {}", e)))?;

        Ok(!inserted.is_empty())
    }

    async fn patch(
        &self,
        table: &str,
        filters: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<(), AppError> {
        let response = self
            .authed(self.http.patch(self.url(table)))
            .query(filters)
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Database(format!("HTTP {}: {}", status, body)))
    }
}
