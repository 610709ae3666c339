// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profiles and the account-deletion cascade.

use crate::db::{collections, DocumentStore, Filter, FindOptions, Transaction};
use crate::error::StoreError;
use crate::models::{Activity, Id, Membership, User};
use crate::store::{Actor, Operation, ResourceStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct UserService {
    db: Arc<dyn DocumentStore>,
    users: ResourceStore<User>,
    memberships: ResourceStore<Membership>,
    activities: ResourceStore<Activity>,
}

impl UserService {
    pub fn new(db: Arc<dyn DocumentStore>) -> Self {
        Self {
            users: ResourceStore::new(db.clone()),
            memberships: ResourceStore::new(db.clone()),
            activities: ResourceStore::new(db.clone()),
            db,
        }
    }

    /// Create a profile. Users register themselves under their own id;
    /// admins may create profiles for anyone.
    pub async fn create(&self, actor: &Actor, mut user: User) -> Result<User, StoreError> {
        let caller = actor.require_user()?;
        if !actor.admin || user.id.is_empty() {
            user.id = caller.clone();
        }
        user.challenges.clear();

        let id = self.users.create(user).await?;
        tracing::info!(user_id = %id, "User created");
        self.get(actor, &id).await
    }

    pub async fn get(&self, actor: &Actor, id: &Id) -> Result<User, StoreError> {
        let mut user = self.users.read(actor, id).await?;
        user.challenges = self.challenges_of(id).await?;
        Ok(user)
    }

    /// All users. Admin only.
    pub async fn list(&self, actor: &Actor, options: &FindOptions) -> Result<Vec<User>, StoreError> {
        if !actor.admin {
            return Err(StoreError::Forbidden("listing users requires admin".to_string()));
        }
        let mut users = self.users.find_all(&Filter::All, options).await?;
        for user in &mut users {
            user.challenges = self.challenges_of(&user.id).await?;
        }
        Ok(users)
    }

    pub async fn update(&self, actor: &Actor, mut user: User) -> Result<User, StoreError> {
        user.challenges.clear();
        let mut updated = self.users.update(actor, user).await?;
        updated.challenges = self.challenges_of(&updated.id).await?;
        Ok(updated)
    }

    /// Delete a user together with their memberships and activities, in one
    /// transaction.
    pub async fn delete(&self, actor: &Actor, id: &Id) -> Result<(), StoreError> {
        let user = self
            .users
            .permitted(actor, &Filter::by_id(id), Operation::Delete)
            .await?;

        let mut transaction = Transaction::new();
        self.users
            .stage_delete_where(&mut transaction, Filter::by_id(&user.id));
        self.memberships
            .stage_delete_where(&mut transaction, Filter::eq("user", &user.id));
        self.activities
            .stage_delete_where(&mut transaction, Filter::eq("user_id", &user.id));

        self.db
            .commit(transaction)
            .await
            .map_err(|e| e.context(format!("{}.delete {}", collections::USERS, user.id)))?;

        tracing::info!(user_id = %user.id, "User and dependent records deleted");
        Ok(())
    }

    async fn challenges_of(&self, user: &Id) -> Result<Vec<Id>, StoreError> {
        Ok(self
            .memberships
            .find_all(&Filter::eq("user", user), &FindOptions::default())
            .await?
            .into_iter()
            .map(|m| m.challenge)
            .collect())
    }
}
