// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document-store layer.
//!
//! The core talks to the backing database only through [`DocumentStore`]:
//! documents are JSON objects keyed by their `id` field, filters and updates
//! are small declarative values, and multi-document atomicity goes through an
//! explicit [`Transaction`] write set.

pub mod filter;
pub mod firestore;
pub mod memory;

pub use filter::{FieldValue, Filter, Update};
pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::models::Id;
use async_trait::async_trait;
use serde_json::Value;

/// Name of the field holding a document's identifier.
pub const ID_FIELD: &str = "id";

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const ACTIVITIES: &str = "activities";
    pub const CHALLENGES: &str = "challenges";
    /// Challenge/user join records (keyed by the pair)
    pub const MEMBERSHIPS: &str = "memberships";
}

/// Paging options for scans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Apply skip/limit to an already-filtered sequence.
    pub fn page<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Outcome of a conditional single-document update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

/// One staged write inside a [`Transaction`].
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Insert a new document; fails with `AlreadyExists` if the id is taken.
    Insert {
        collection: String,
        id: Id,
        document: Value,
    },
    /// Update the first document matching `filter`; fails with `NotFound` if
    /// nothing matches.
    Update {
        collection: String,
        filter: Filter,
        update: Update,
    },
    /// Delete every document matching `filter` (zero is fine).
    Delete { collection: String, filter: Filter },
}

/// An ordered write set committed all-or-nothing by
/// [`DocumentStore::commit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    writes: Vec<Write>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: &str, id: Id, document: Value) -> &mut Self {
        self.writes.push(Write::Insert {
            collection: collection.to_string(),
            id,
            document,
        });
        self
    }

    pub fn update(&mut self, collection: &str, filter: Filter, update: Update) -> &mut Self {
        self.writes.push(Write::Update {
            collection: collection.to_string(),
            filter,
            update,
        });
        self
    }

    pub fn delete(&mut self, collection: &str, filter: Filter) -> &mut Self {
        self.writes.push(Write::Delete {
            collection: collection.to_string(),
            filter,
        });
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Document-store client.
///
/// Implementations must make `update_one` a single atomic conditional write
/// (the filter is evaluated against the current document state at write
/// time) and `commit` all-or-nothing.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, filter: &Filter)
        -> Result<Option<Value>, StoreError>;

    /// Like `find_one`, but only the listed top-level fields are returned.
    async fn find_one_projected(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &[&str],
    ) -> Result<Option<Value>, StoreError>;

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError>;

    async fn insert_one(&self, collection: &str, id: &Id, document: Value)
        -> Result<(), StoreError>;

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError>;

    /// Returns the number of deleted documents (0 or 1).
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn commit(&self, transaction: Transaction) -> Result<(), StoreError>;
}

/// Keep only `fields` (plus nothing else) of a document.
pub(crate) fn project(document: &Value, fields: &[&str]) -> Value {
    let mut projected = serde_json::Map::new();
    if let Some(object) = document.as_object() {
        for field in fields {
            if let Some(value) = object.get(*field) {
                projected.insert((*field).to_string(), value.clone());
            }
        }
    }
    Value::Object(projected)
}

/// Read the identifier stored in a document.
pub(crate) fn document_id(document: &Value) -> Result<Id, StoreError> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .map(Id::from)
        .ok_or_else(|| StoreError::Decode("document has no string id field".to_string()))
}
