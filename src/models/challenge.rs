// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge detail, memberships and invites.
//!
//! A challenge is stored as a detail document in `challenges` plus one
//! membership record per member in `memberships`. [`Challenge`] is the
//! composed view returned to callers.

use crate::db::collections;
use crate::models::target::Target;
use crate::models::{Id, Timestamp};
use crate::store::{Actor, Attribute, Resource};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// Field of [`Detail`] holding the invites.
pub const INVITES_FIELD: &str = "invites";

/// Invitation of a user to an invite-only challenge, embedded in the detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    /// Invited user
    pub id: Id,
    pub invited_by: Id,
    #[serde(default)]
    pub created_date: Timestamp,
}

impl Attribute for Invite {
    fn id(&self) -> &Id {
        &self.id
    }
}

/// Challenge detail document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_detail"))]
pub struct Detail {
    #[serde(default)]
    pub id: Id,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub invite_only: bool,
    #[serde(default)]
    pub created_by: Id,
    #[serde(default)]
    pub created_date: Timestamp,
    pub target: Target,
    #[serde(default)]
    pub invites: Vec<Invite>,
}

fn validate_detail(detail: &Detail) -> Result<(), ValidationError> {
    if detail.end_date <= detail.start_date {
        return Err(ValidationError::new("end_date")
            .with_message(Cow::from("end date must be after start date")));
    }
    if detail.created_by.is_empty() {
        return Err(ValidationError::new("created_by")
            .with_message(Cow::from("challenge must have a creator")));
    }
    if let Err(e) = detail.target.validate() {
        return Err(ValidationError::new("target").with_message(Cow::from(e.to_string())));
    }
    Ok(())
}

impl Detail {
    pub fn is_invited(&self, user: &Id) -> bool {
        self.invites.iter().any(|invite| &invite.id == user)
    }

    fn is_managed_by(&self, actor: &Actor) -> bool {
        actor.is_self_or_admin(&self.created_by)
    }
}

impl Resource for Detail {
    const COLLECTION: &'static str = collections::CHALLENGES;

    fn id(&self) -> &Id {
        &self.id
    }

    fn created_date(&self) -> Timestamp {
        self.created_date
    }

    fn assign(&mut self, id: Id, created_date: Timestamp) {
        self.id = id;
        self.created_date = created_date;
    }

    fn can_be_read_by(&self, _actor: &Actor) -> bool {
        true
    }

    fn can_be_updated_by(&self, actor: &Actor) -> bool {
        self.is_managed_by(actor)
    }

    fn can_be_deleted_by(&self, actor: &Actor) -> bool {
        self.is_managed_by(actor)
    }
}

/// Detail plus current members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(flatten)]
    pub detail: Detail,
    #[serde(default)]
    pub members: Vec<Id>,
}

impl Challenge {
    pub fn id(&self) -> &Id {
        &self.detail.id
    }

    pub fn is_member(&self, user: &Id) -> bool {
        self.members.contains(user)
    }

    /// Public challenges are visible to everyone; private ones to their
    /// members, their creator and admins.
    pub fn can_be_listed_by(&self, actor: &Actor) -> bool {
        self.detail.public
            || self.detail.is_managed_by(actor)
            || actor.user_id.as_ref().is_some_and(|u| self.is_member(u))
    }

    pub fn can_be_read_by(&self, actor: &Actor) -> bool {
        self.detail.can_be_read_by(actor)
    }

    pub fn can_be_updated_by(&self, actor: &Actor) -> bool {
        self.detail.can_be_updated_by(actor)
    }

    pub fn can_be_deleted_by(&self, actor: &Actor) -> bool {
        self.detail.can_be_deleted_by(actor)
    }
}

/// Link between one user and one challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Membership {
    /// Derived from the (challenge, user) pair
    #[serde(default)]
    pub id: Id,
    pub challenge: Id,
    pub user: Id,
    #[serde(default)]
    pub created_date: Timestamp,
}

impl Membership {
    pub fn new(challenge: Id, user: Id) -> Self {
        Self {
            id: Self::key(&challenge, &user),
            challenge,
            user,
            created_date: Timestamp::default(),
        }
    }

    /// Document id of the membership of `user` in `challenge`. One document
    /// per pair keeps the pair unique. The separator is always escaped inside
    /// the encoded parts, so distinct pairs never share a key.
    pub fn key(challenge: &Id, user: &Id) -> Id {
        let challenge = urlencoding::encode(challenge.as_str());
        let user = urlencoding::encode(user.as_str());
        Id::new(format!("{challenge}+{user}"))
    }
}

impl Resource for Membership {
    const COLLECTION: &'static str = collections::MEMBERSHIPS;

    fn id(&self) -> &Id {
        &self.id
    }

    fn created_date(&self) -> Timestamp {
        self.created_date
    }

    fn assign(&mut self, id: Id, created_date: Timestamp) {
        self.id = id;
        self.created_date = created_date;
    }

    fn can_be_read_by(&self, _actor: &Actor) -> bool {
        true
    }

    fn can_be_updated_by(&self, actor: &Actor) -> bool {
        actor.admin
    }

    fn can_be_deleted_by(&self, actor: &Actor) -> bool {
        actor.is_self_or_admin(&self.user)
    }
}
