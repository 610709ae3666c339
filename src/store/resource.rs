// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Capability contracts for stored entities and their embedded sub-documents.

use crate::models::{Id, Timestamp};
use crate::store::Actor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use validator::Validate;

/// A top-level, independently addressable stored entity.
///
/// Authorization lives on the entity: the store fetches the stored document
/// and asks it whether the actor may perform the operation.
pub trait Resource: Serialize + DeserializeOwned + Validate + Send + Sync {
    /// Collection the entity is stored in.
    const COLLECTION: &'static str;

    fn id(&self) -> &Id;

    fn created_date(&self) -> Timestamp;

    /// Set the identity fields. Called by the store at insert, and to carry
    /// the stored identity over a full-document replace.
    fn assign(&mut self, id: Id, created_date: Timestamp);

    fn can_be_read_by(&self, actor: &Actor) -> bool;

    fn can_be_updated_by(&self, actor: &Actor) -> bool;

    fn can_be_deleted_by(&self, actor: &Actor) -> bool;
}

/// A sub-document embedded in a resource's array field, identified by its
/// own id for uniqueness and removal.
pub trait Attribute {
    fn id(&self) -> &Id;
}

/// Plain id arrays (e.g. lists of user ids) hold the id itself.
impl Attribute for Id {
    fn id(&self) -> &Id {
        self
    }
}

/// Operation an actor asks permission for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn allowed<T: Resource>(self, resource: &T, actor: &Actor) -> bool {
        match self {
            Operation::Read => resource.can_be_read_by(actor),
            Operation::Update => resource.can_be_updated_by(actor),
            Operation::Delete => resource.can_be_deleted_by(actor),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}
