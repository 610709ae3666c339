// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenges: detail documents composed with their memberships, the
//! transactions that keep the two consistent, and progress evaluation.

use crate::db::{collections, DocumentStore, Filter, FindOptions, Transaction, Update};
use crate::error::StoreError;
use crate::models::challenge::INVITES_FIELD;
use crate::models::{Challenge, Detail, Id, Invite, Membership, Progress};
use crate::services::activities::ActivityService;
use crate::services::geocoding::Geocoder;
use crate::store::{Actor, Operation, Resource, ResourceStore};
use chrono::Utc;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Members evaluated at once by [`ChallengeService::member_progress`].
const MAX_CONCURRENT_EVALUATIONS: usize = 8;

/// One step of a challenge update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChallengeOperation {
    /// Replace the detail document.
    SetDetail(Detail),
    /// Add (`member: true`) or remove a member.
    SetMember { user: Id, member: bool },
}

/// Progress of one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberProgress {
    pub user: Id,
    pub progress: Progress,
}

#[derive(Clone)]
pub struct ChallengeService {
    db: Arc<dyn DocumentStore>,
    details: ResourceStore<Detail>,
    memberships: ResourceStore<Membership>,
    activities: ActivityService,
    geocoder: Arc<dyn Geocoder>,
}

impl ChallengeService {
    pub fn new(db: Arc<dyn DocumentStore>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            details: ResourceStore::new(db.clone()),
            memberships: ResourceStore::new(db.clone()),
            activities: ActivityService::new(db.clone()),
            db,
            geocoder,
        }
    }

    async fn commit(&self, transaction: Transaction, operation: &str, id: &Id) -> Result<(), StoreError> {
        self.db
            .commit(transaction)
            .await
            .map_err(|e| e.context(format!("{}.{operation} {id}", collections::CHALLENGES)))
    }

    /// Create a challenge and its initial memberships in one transaction.
    pub async fn create(
        &self,
        actor: &Actor,
        mut detail: Detail,
        members: Vec<Id>,
    ) -> Result<Challenge, StoreError> {
        let caller = actor.require_user()?;
        if members.is_empty() {
            return Err(StoreError::Invalid("challenge needs at least one member".to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = members.iter().find(|m| !seen.insert(*m)) {
            return Err(StoreError::Invalid(format!("duplicate member {duplicate}")));
        }

        if !actor.admin || detail.created_by.is_empty() {
            detail.created_by = caller.clone();
        }
        let now = Utc::now();
        for invite in &mut detail.invites {
            if invite.invited_by.is_empty() {
                invite.invited_by = detail.created_by.clone();
            }
            invite.created_date = now;
        }
        detail.target.prepare();

        let mut transaction = Transaction::new();
        let id = self.details.stage_create(&mut transaction, detail)?;
        for user in members {
            self.memberships
                .stage_create(&mut transaction, Membership::new(id.clone(), user))?;
        }
        self.commit(transaction, "create", &id).await?;

        tracing::info!(challenge_id = %id, created_by = %caller, "Challenge created");
        self.get(actor, &id).await
    }

    pub async fn get(&self, actor: &Actor, id: &Id) -> Result<Challenge, StoreError> {
        let detail = self.details.read(actor, id).await?;
        self.compose(detail).await
    }

    async fn compose(&self, detail: Detail) -> Result<Challenge, StoreError> {
        let members = self.members(&detail.id).await?;
        Ok(Challenge { detail, members })
    }

    async fn members(&self, challenge: &Id) -> Result<Vec<Id>, StoreError> {
        Ok(self
            .memberships
            .find_all(&Filter::eq("challenge", challenge), &FindOptions::default())
            .await?
            .into_iter()
            .map(|m| m.user)
            .collect())
    }

    /// Challenges visible to `actor`: everything for admins, otherwise public
    /// challenges plus the ones the actor created or belongs to.
    pub async fn list(&self, actor: &Actor, options: &FindOptions) -> Result<Vec<Challenge>, StoreError> {
        let details = if actor.admin {
            self.details.find_all(&Filter::All, options).await?
        } else {
            let mut found = BTreeMap::new();
            let mut collect = |details: Vec<Detail>| {
                for detail in details {
                    found.entry(detail.id.clone()).or_insert(detail);
                }
            };

            let all = FindOptions::default();
            collect(self.details.find_all(&Filter::eq("public", true), &all).await?);
            if let Some(user) = &actor.user_id {
                collect(self.details.find_all(&Filter::eq("created_by", user), &all).await?);
                let joined = self
                    .memberships
                    .find_all(&Filter::eq("user", user), &all)
                    .await?;
                for membership in joined {
                    collect(
                        self.details
                            .find_all(&Filter::by_id(&membership.challenge), &all)
                            .await?,
                    );
                }
            }

            options.page(found.into_values())
        };

        let mut challenges = Vec::with_capacity(details.len());
        for detail in details {
            let challenge = self.compose(detail).await?;
            if challenge.can_be_listed_by(actor) {
                challenges.push(challenge);
            }
        }
        Ok(challenges)
    }

    /// Apply `operations` in order as one transaction.
    pub async fn update(
        &self,
        actor: &Actor,
        id: &Id,
        operations: Vec<ChallengeOperation>,
    ) -> Result<Challenge, StoreError> {
        if operations.is_empty() {
            return Err(StoreError::Invalid(format!("challenge {id}: no operations")));
        }
        let existing = self.details.read(actor, id).await?;

        let mut transaction = Transaction::new();
        for operation in operations {
            match operation {
                ChallengeOperation::SetDetail(mut detail) => {
                    detail.id = existing.id.clone();
                    detail.created_by = existing.created_by.clone();
                    detail.invites = existing.invites.clone();
                    detail.target.prepare();
                    self.details
                        .stage_replace(&mut transaction, actor, detail)
                        .await?;
                }
                ChallengeOperation::SetMember { user, member } => {
                    self.check_member_change(actor, &existing, &user, member)?;
                    if member {
                        self.stage_membership(&mut transaction, &existing.id, user)?;
                    } else {
                        self.memberships.stage_delete_where(
                            &mut transaction,
                            Filter::eq("challenge", &existing.id).and(Filter::eq("user", &user)),
                        );
                    }
                }
            }
        }

        let writes = transaction.len();
        self.commit(transaction, "update", id).await?;
        tracing::info!(challenge_id = %id, writes, "Challenge updated");
        self.get(actor, id).await
    }

    /// Stage a membership of `user` in `challenge` together with a pull of the
    /// user's invite from the detail. The pull matches only while the detail
    /// exists, so a challenge deleted before the commit fails it with
    /// `NotFound` instead of leaving the membership behind.
    fn stage_membership(
        &self,
        transaction: &mut Transaction,
        challenge: &Id,
        user: Id,
    ) -> Result<(), StoreError> {
        self.details.stage_update(
            transaction,
            Filter::by_id(challenge),
            Update::pull(INVITES_FIELD, &user),
        );
        self.memberships
            .stage_create(transaction, Membership::new(challenge.clone(), user))?;
        Ok(())
    }

    /// Managers may add or remove anyone. Users may remove themselves, and add
    /// themselves unless the challenge is invite-only and they were not invited.
    fn check_member_change(
        &self,
        actor: &Actor,
        detail: &Detail,
        user: &Id,
        member: bool,
    ) -> Result<(), StoreError> {
        let allowed = detail.can_be_updated_by(actor)
            || (actor.is(user) && (!member || !detail.invite_only || detail.is_invited(user)));
        if allowed {
            Ok(())
        } else {
            Err(StoreError::Forbidden(format!(
                "{}.set_member {}: {user}",
                collections::CHALLENGES,
                detail.id
            )))
        }
    }

    /// Delete the challenge and all of its memberships in one transaction.
    pub async fn delete(&self, actor: &Actor, id: &Id) -> Result<(), StoreError> {
        let detail = self
            .details
            .permitted(actor, &Filter::by_id(id), Operation::Delete)
            .await?;

        let mut transaction = Transaction::new();
        self.details
            .stage_delete_where(&mut transaction, Filter::by_id(&detail.id));
        self.memberships
            .stage_delete_where(&mut transaction, Filter::eq("challenge", &detail.id));
        self.commit(transaction, "delete", id).await?;

        tracing::info!(challenge_id = %id, "Challenge deleted");
        Ok(())
    }

    /// Join as the calling user. Joining an invite-only challenge consumes the
    /// invite in the same transaction.
    pub async fn join(&self, actor: &Actor, id: &Id) -> Result<Challenge, StoreError> {
        let user = actor.require_user()?.clone();
        let detail = self.details.read(actor, id).await?;
        self.check_member_change(actor, &detail, &user, true)?;

        let mut transaction = Transaction::new();
        self.stage_membership(&mut transaction, &detail.id, user.clone())?;
        self.commit(transaction, "join", id).await?;

        tracing::info!(challenge_id = %id, user_id = %user, "Joined challenge");
        self.get(actor, id).await
    }

    pub async fn leave(&self, actor: &Actor, id: &Id) -> Result<(), StoreError> {
        let user = actor.require_user()?;
        self.memberships
            .delete_with_criteria(actor, &Filter::by_id(&Membership::key(id, user)))
            .await?;
        tracing::info!(challenge_id = %id, user_id = %user, "Left challenge");
        Ok(())
    }

    /// Invite `user`. Inviting the same user twice is `AlreadyExists`.
    pub async fn invite(&self, actor: &Actor, id: &Id, user: &Id) -> Result<Invite, StoreError> {
        let invite = Invite {
            id: user.clone(),
            invited_by: actor.require_user()?.clone(),
            created_date: Utc::now(),
        };
        self.details
            .append_attribute(actor, id, INVITES_FIELD, &invite)
            .await?;
        Ok(invite)
    }

    pub async fn invites(&self, actor: &Actor, id: &Id) -> Result<Vec<Invite>, StoreError> {
        self.details.read_attribute(actor, id, INVITES_FIELD).await
    }

    pub async fn get_invite(&self, actor: &Actor, id: &Id, user: &Id) -> Result<Invite, StoreError> {
        self.details
            .read_single_attribute(actor, id, INVITES_FIELD, user)
            .await
    }

    pub async fn revoke_invite(&self, actor: &Actor, id: &Id, user: &Id) -> Result<(), StoreError> {
        self.details
            .remove_attribute(actor, id, INVITES_FIELD, user)
            .await
    }

    /// Progress of `member`, counting only activities that started inside the
    /// challenge window.
    pub async fn progress(&self, actor: &Actor, id: &Id, member: &Id) -> Result<Progress, StoreError> {
        let challenge = self.get(actor, id).await?;
        if !challenge.is_member(member) {
            return Err(StoreError::NotFound(format!(
                "{}.progress {id}: {member} is not a member",
                collections::CHALLENGES
            )));
        }
        self.evaluate(&challenge.detail, member).await
    }

    /// Progress of every member, highest first.
    pub async fn member_progress(&self, actor: &Actor, id: &Id) -> Result<Vec<MemberProgress>, StoreError> {
        let challenge = self.get(actor, id).await?;
        let detail = &challenge.detail;

        let mut results: Vec<MemberProgress> = stream::iter(challenge.members.clone())
            .map(|user: Id| async move {
                let progress = self.evaluate(detail, &user).await?;
                Ok::<_, StoreError>(MemberProgress { user, progress })
            })
            .buffer_unordered(MAX_CONCURRENT_EVALUATIONS)
            .try_collect()
            .await?;

        results.sort_by(|a, b| {
            b.progress
                .percentage()
                .total_cmp(&a.progress.percentage())
                .then_with(|| a.user.cmp(&b.user))
        });
        Ok(results)
    }

    async fn evaluate(&self, detail: &Detail, member: &Id) -> Result<Progress, StoreError> {
        let activities = self
            .activities
            .started_between(member, detail.start_date, detail.end_date)
            .await?;
        let mut progress = detail
            .target
            .evaluate(&activities)
            .map_err(|e| StoreError::Invalid(format!("challenge {}: {e}", detail.id)))?;

        if let Some(location) = progress.location_mut() {
            match self.geocoder.place_name(location.lat, location.lng).await {
                Ok(name) => location.name = name,
                Err(e) => {
                    tracing::warn!(error = %e, lat = location.lat, lng = location.lng, "Reverse geocoding failed");
                }
            }
        }
        Ok(progress)
    }
}
