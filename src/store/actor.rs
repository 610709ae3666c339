// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The identity an operation runs as.

use crate::error::StoreError;
use crate::models::Id;

/// Who is performing an operation: a user id (absent for anonymous callers)
/// plus the admin flag. Passed explicitly to every permission-checked store
/// operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<Id>,
    pub admin: bool,
}

impl Actor {
    pub fn user(id: impl Into<Id>) -> Self {
        Self {
            user_id: Some(id.into()),
            admin: false,
        }
    }

    pub fn admin(id: impl Into<Id>) -> Self {
        Self {
            user_id: Some(id.into()),
            admin: true,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// True when this actor is the user `id`.
    pub fn is(&self, id: &Id) -> bool {
        !id.is_empty() && self.user_id.as_ref() == Some(id)
    }

    /// True when this actor is the user `id` or an admin.
    pub fn is_self_or_admin(&self, id: &Id) -> bool {
        self.admin || self.is(id)
    }

    /// The actor's user id, or a typed "no actor" error.
    pub fn require_user(&self) -> Result<&Id, StoreError> {
        self.user_id
            .as_ref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::Forbidden("operation requires an authenticated user".to_string()))
    }
}
