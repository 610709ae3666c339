// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Generic, permission-aware resource store.
//!
//! [`ResourceStore<T>`] provides typed CRUD and attribute operations over the
//! collection of one [`Resource`] type. Every read, update and delete fetches
//! the stored document first and asks the entity whether the actor may
//! proceed; attribute appends are single conditional writes so concurrent
//! duplicates cannot both succeed.

pub mod actor;
pub mod resource;

pub use actor::Actor;
pub use resource::{Attribute, Operation, Resource};

use crate::db::filter::element_has_id;
use crate::db::{DocumentStore, Filter, FindOptions, Transaction, Update, ID_FIELD};
use crate::error::StoreError;
use crate::models::Id;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed, permission-checked access to one collection.
pub struct ResourceStore<T> {
    db: Arc<dyn DocumentStore>,
    collection: &'static str,
    _resource: PhantomData<fn() -> T>,
}

impl<T> Clone for ResourceStore<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            collection: self.collection,
            _resource: PhantomData,
        }
    }
}

impl<T: Resource> ResourceStore<T> {
    pub fn new(db: Arc<dyn DocumentStore>) -> Self {
        Self {
            db,
            collection: T::COLLECTION,
            _resource: PhantomData,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    fn context(&self, operation: &str) -> String {
        format!("{}.{}", self.collection, operation)
    }

    fn decode(&self, document: Value) -> Result<T, StoreError> {
        serde_json::from_value(document)
            .map_err(|e| StoreError::Decode(format!("{}: {e}", self.collection)))
    }

    fn encode<S: Serialize>(&self, value: &S) -> Result<Value, StoreError> {
        serde_json::to_value(value)
            .map_err(|e| StoreError::Invalid(format!("{}: failed to encode: {e}", self.collection)))
    }

    /// Validate, assign identity and encode a new resource.
    fn prepare_insert(&self, mut resource: T) -> Result<(Id, Value), StoreError> {
        resource.validate()?;
        let id = if resource.id().is_empty() {
            Id::generate()
        } else {
            resource.id().clone()
        };
        resource.assign(id.clone(), Utc::now());
        Ok((id, self.encode(&resource)?))
    }

    /// Insert a new resource. The store generates the id unless the resource
    /// already carries one; the creation timestamp is always set here.
    pub async fn create(&self, resource: T) -> Result<Id, StoreError> {
        let (id, document) = self.prepare_insert(resource)?;
        self.db
            .insert_one(self.collection, &id, document)
            .await
            .map_err(|e| e.context(self.context("create")))?;

        tracing::debug!(collection = self.collection, id = %id, "Resource created");
        Ok(id)
    }

    /// Fetch the resource matching `filter` and check that `actor` may
    /// perform `operation` on it. Returns the stored resource.
    pub async fn permitted(
        &self,
        actor: &Actor,
        filter: &Filter,
        operation: Operation,
    ) -> Result<T, StoreError> {
        let document = self
            .db
            .find_one(self.collection, filter)
            .await
            .map_err(|e| e.context(self.context(&operation.to_string())))?
            .ok_or_else(|| {
                StoreError::NotFound(format!("{}: no document matches", self.context(&operation.to_string())))
            })?;
        let resource = self.decode(document)?;

        if !operation.allowed(&resource, actor) {
            tracing::debug!(
                collection = self.collection,
                id = %resource.id(),
                user_id = ?actor.user_id,
                admin = actor.admin,
                %operation,
                "Permission denied"
            );
            return Err(StoreError::Forbidden(format!(
                "{} {}",
                self.context(&operation.to_string()),
                resource.id()
            )));
        }

        Ok(resource)
    }

    pub async fn read(&self, actor: &Actor, id: &Id) -> Result<T, StoreError> {
        self.permitted(actor, &Filter::by_id(id), Operation::Read).await
    }

    /// Every resource in the collection, without per-item permission checks.
    /// Callers gate access before using this.
    pub async fn read_all(&self) -> Result<Vec<T>, StoreError> {
        self.find_all(&Filter::All, &FindOptions::default()).await
    }

    /// Resources matching `filter`, paged by `options`. No permission checks.
    pub async fn find_all(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<T>, StoreError> {
        self.db
            .find_many(self.collection, filter, options)
            .await
            .map_err(|e| e.context(self.context("find")))?
            .into_iter()
            .map(|document| self.decode(document))
            .collect()
    }

    pub async fn update(&self, actor: &Actor, resource: T) -> Result<T, StoreError> {
        let filter = Filter::by_id(resource.id());
        self.update_with_criteria(actor, resource, &filter).await
    }

    /// Replace the stored resource matching `filter` with `resource`.
    ///
    /// The permission check runs against the stored document, and its id and
    /// creation date are carried over to the replacement.
    pub async fn update_with_criteria(
        &self,
        actor: &Actor,
        mut resource: T,
        filter: &Filter,
    ) -> Result<T, StoreError> {
        let existing = self.permitted(actor, filter, Operation::Update).await?;
        resource.assign(existing.id().clone(), existing.created_date());
        resource.validate()?;

        let document = self.encode(&resource)?;
        let target = Filter::by_id(existing.id()).and(filter.clone());
        let result = self
            .db
            .update_one(self.collection, &target, &Update::Replace(document))
            .await
            .map_err(|e| e.context(self.context("update")))?;

        if result.matched != 1 {
            return Err(StoreError::NotFound(format!(
                "{} {}: matched {} documents",
                self.context("update"),
                existing.id(),
                result.matched
            )));
        }

        tracing::debug!(collection = self.collection, id = %existing.id(), "Resource updated");
        Ok(resource)
    }

    pub async fn delete(&self, actor: &Actor, id: &Id) -> Result<(), StoreError> {
        self.delete_with_criteria(actor, &Filter::by_id(id)).await
    }

    pub async fn delete_with_criteria(&self, actor: &Actor, filter: &Filter) -> Result<(), StoreError> {
        let existing = self.permitted(actor, filter, Operation::Delete).await?;
        let target = Filter::by_id(existing.id()).and(filter.clone());
        let deleted = self
            .db
            .delete_one(self.collection, &target)
            .await
            .map_err(|e| e.context(self.context("delete")))?;

        if deleted == 0 {
            return Err(StoreError::NotFound(format!(
                "{} {}",
                self.context("delete"),
                existing.id()
            )));
        }

        tracing::debug!(collection = self.collection, id = %existing.id(), "Resource deleted");
        Ok(())
    }

    /// Read the field `key` of resource `id` without decoding the whole
    /// resource into `T`.
    pub async fn read_attribute<A: DeserializeOwned>(
        &self,
        actor: &Actor,
        id: &Id,
        key: &str,
    ) -> Result<A, StoreError> {
        self.permitted(actor, &Filter::by_id(id), Operation::Read).await?;

        let projected = self
            .db
            .find_one_projected(self.collection, &Filter::by_id(id), &[key])
            .await
            .map_err(|e| e.context(self.context("read_attribute")))?
            .ok_or_else(|| StoreError::NotFound(format!("{} {id}", self.context("read_attribute"))))?;

        let value = projected.get(key).cloned().ok_or_else(|| {
            StoreError::NotFound(format!("{} {id}: no field '{key}'", self.context("read_attribute")))
        })?;
        serde_json::from_value(value).map_err(|e| {
            StoreError::Decode(format!("{} {id}.{key}: {e}", self.context("read_attribute")))
        })
    }

    /// Read the element of the array `key` whose id is `attribute_id`.
    pub async fn read_single_attribute<A: Attribute + DeserializeOwned>(
        &self,
        actor: &Actor,
        id: &Id,
        key: &str,
        attribute_id: &Id,
    ) -> Result<A, StoreError> {
        let elements: Vec<Value> = self.read_attribute(actor, id, key).await?;
        let element = elements
            .into_iter()
            .find(|e| element_has_id(e, attribute_id.as_str()))
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "{} {id}.{key}[{attribute_id}]",
                    self.context("read_attribute")
                ))
            })?;
        serde_json::from_value(element).map_err(|e| {
            StoreError::Decode(format!("{} {id}.{key}[{attribute_id}]: {e}", self.context("read_attribute")))
        })
    }

    /// Append `attribute` to the array `key` of resource `id`, unless an
    /// element with the same id is already there.
    ///
    /// The duplicate check is part of the update's filter, so two concurrent
    /// appends of the same attribute cannot both succeed.
    pub async fn append_attribute<A: Attribute + Serialize>(
        &self,
        actor: &Actor,
        id: &Id,
        key: &str,
        attribute: &A,
    ) -> Result<Id, StoreError> {
        self.permitted(actor, &Filter::by_id(id), Operation::Update).await?;

        let attribute_id = attribute.id().clone();
        if attribute_id.is_empty() {
            return Err(StoreError::Invalid(format!(
                "{} {id}.{key}: attribute id is empty",
                self.context("append_attribute")
            )));
        }

        let filter = Filter::by_id(id).and(Filter::not_contains(key, &attribute_id));
        let update = Update::push(key, self.encode(attribute)?);
        let result = self
            .db
            .update_one(self.collection, &filter, &update)
            .await
            .map_err(|e| e.context(self.context("append_attribute")))?;

        if result.modified == 0 {
            let exists = self
                .db
                .find_one_projected(self.collection, &Filter::by_id(id), &[ID_FIELD])
                .await
                .map_err(|e| e.context(self.context("append_attribute")))?
                .is_some();
            let message = format!("{} {id}.{key}[{attribute_id}]", self.context("append_attribute"));
            return Err(if exists {
                StoreError::AlreadyExists(message)
            } else {
                StoreError::NotFound(message)
            });
        }

        tracing::debug!(
            collection = self.collection,
            id = %id,
            key,
            attribute_id = %attribute_id,
            "Attribute appended"
        );
        Ok(attribute_id)
    }

    /// Remove every element of the array `key` whose id is `attribute_id`.
    pub async fn remove_attribute(
        &self,
        actor: &Actor,
        id: &Id,
        key: &str,
        attribute_id: &Id,
    ) -> Result<(), StoreError> {
        self.permitted(actor, &Filter::by_id(id), Operation::Update).await?;

        let result = self
            .db
            .update_one(self.collection, &Filter::by_id(id), &Update::pull(key, attribute_id))
            .await
            .map_err(|e| e.context(self.context("remove_attribute")))?;

        if result.modified == 0 {
            return Err(StoreError::NotFound(format!(
                "{} {id}.{key}[{attribute_id}]",
                self.context("remove_attribute")
            )));
        }
        Ok(())
    }

    // ─── Staged Operations ───────────────────────────────────────
    //
    // These add writes to a caller-owned transaction instead of touching the
    // database; nothing is visible until the transaction is committed.

    /// Stage the insert of a new resource. Returns the id it will have.
    pub fn stage_create(&self, transaction: &mut Transaction, resource: T) -> Result<Id, StoreError> {
        let (id, document) = self.prepare_insert(resource)?;
        transaction.insert(self.collection, id.clone(), document);
        Ok(id)
    }

    /// Permission-check and stage a full replace of the stored resource with
    /// the same id, carrying its identity over.
    pub async fn stage_replace(
        &self,
        transaction: &mut Transaction,
        actor: &Actor,
        mut resource: T,
    ) -> Result<T, StoreError> {
        let existing = self
            .permitted(actor, &Filter::by_id(resource.id()), Operation::Update)
            .await?;
        resource.assign(existing.id().clone(), existing.created_date());
        resource.validate()?;

        let document = self.encode(&resource)?;
        transaction.update(self.collection, Filter::by_id(existing.id()), Update::Replace(document));
        Ok(resource)
    }

    /// Stage a raw update. The caller is responsible for authorization.
    pub fn stage_update(&self, transaction: &mut Transaction, filter: Filter, update: Update) {
        transaction.update(self.collection, filter, update);
    }

    /// Stage the deletion of every resource matching `filter`. The caller is
    /// responsible for authorization.
    pub fn stage_delete_where(&self, transaction: &mut Transaction, filter: Filter) {
        transaction.delete(self.collection, filter);
    }
}
