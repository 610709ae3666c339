// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recorded activities.

use crate::db::{DocumentStore, Filter, FindOptions};
use crate::error::StoreError;
use crate::models::{Activity, Id, Timestamp};
use crate::store::{Actor, ResourceStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct ActivityService {
    activities: ResourceStore<Activity>,
}

impl ActivityService {
    pub fn new(db: Arc<dyn DocumentStore>) -> Self {
        Self {
            activities: ResourceStore::new(db),
        }
    }

    /// Record an activity. Non-admins always record for themselves.
    pub async fn create(&self, actor: &Actor, mut activity: Activity) -> Result<Activity, StoreError> {
        let caller = actor.require_user()?;
        if !actor.admin || activity.user_id.is_empty() {
            activity.user_id = caller.clone();
        }
        activity.id = Id::default();

        let id = self.activities.create(activity).await?;
        tracing::debug!(activity_id = %id, user_id = %caller, "Activity recorded");
        self.activities.read(actor, &id).await
    }

    pub async fn get(&self, actor: &Actor, id: &Id) -> Result<Activity, StoreError> {
        self.activities.read(actor, id).await
    }

    /// Activities of `user` (the caller when `None`). Users see their own;
    /// admins see anyone's.
    pub async fn list(
        &self,
        actor: &Actor,
        user: Option<&Id>,
        options: &FindOptions,
    ) -> Result<Vec<Activity>, StoreError> {
        let caller = actor.require_user()?;
        let owner = user.unwrap_or(caller);
        if !actor.is_self_or_admin(owner) {
            return Err(StoreError::Forbidden(format!(
                "activities of {owner} are not visible to {caller}"
            )));
        }
        self.activities
            .find_all(&Filter::eq("user_id", owner), options)
            .await
    }

    pub async fn update(&self, actor: &Actor, mut activity: Activity) -> Result<Activity, StoreError> {
        if !actor.admin {
            // Only the owner gets past the permission check, so ownership
            // cannot be handed to someone else.
            activity.user_id = actor.require_user()?.clone();
        }
        self.activities.update(actor, activity).await
    }

    pub async fn delete(&self, actor: &Actor, id: &Id) -> Result<(), StoreError> {
        self.activities.delete(actor, id).await
    }

    /// Activities of `user` that started within `[start, end]`. No
    /// permission checks; used for progress evaluation.
    pub async fn started_between(
        &self,
        user: &Id,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Activity>, StoreError> {
        Ok(self
            .activities
            .find_all(&Filter::eq("user_id", user), &FindOptions::default())
            .await?
            .into_iter()
            .filter(|a| start <= a.start && a.start <= end)
            .collect())
    }
}
