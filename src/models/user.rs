//! User profile model.

use crate::db::collections;
use crate::models::{Id, Timestamp};
use crate::store::{Actor, Resource};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct User {
    /// Document ID (the identity provider's subject for self-registered users)
    #[serde(default)]
    pub id: Id,
    #[validate(length(min = 1, message = "first name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "last name is required"))]
    pub last_name: String,
    #[validate(email(message = "email is not valid"))]
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub created_date: Timestamp,
    /// Challenges the user is a member of. Filled in from memberships when
    /// the user is read; never persisted.
    #[serde(default, skip_deserializing)]
    pub challenges: Vec<Id>,
}

impl Resource for User {
    const COLLECTION: &'static str = collections::USERS;

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

    fn can_be_read_by(&self, actor: &Actor) -> bool {
        actor.is_self_or_admin(&self.id)
    }

    fn can_be_updated_by(&self, actor: &Actor) -> bool {
        actor.is_self_or_admin(&self.id)
    }

    fn can_be_deleted_by(&self, actor: &Actor) -> bool {
        actor.is_self_or_admin(&self.id)
    }
}
