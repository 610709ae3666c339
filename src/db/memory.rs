// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store.
//!
//! Used for local development (`STORE_BACKEND=memory`) and by the test suite.
//! Every operation runs under one mutex, which makes conditional updates and
//! transaction commits trivially atomic.

use crate::db::{
    document_id, project, DocumentStore, Filter, FindOptions, Transaction, Update, UpdateResult,
    Write, ID_FIELD,
};
use crate::error::StoreError;
use crate::models::Id;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

type Collection = BTreeMap<String, Value>;
type Collections = HashMap<String, Collection>;

/// In-memory document store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Collections>>,
    fail_commit_after: Arc<Mutex<Option<usize>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` fail after applying `writes` of its writes,
    /// as if the process died mid-transaction. Nothing from that commit
    /// becomes visible.
    pub fn fail_next_commit_after(&self, writes: usize) {
        if let Ok(mut slot) = self.fail_commit_after.lock() {
            *slot = Some(writes);
        }
    }

    /// Number of documents currently stored in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.data
            .lock()
            .map(|data| data.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.data
            .lock()
            .map_err(|_| StoreError::Unknown("memory store lock poisoned".to_string()))
    }

    fn take_failpoint(&self) -> Result<Option<usize>, StoreError> {
        self.fail_commit_after
            .lock()
            .map(|mut slot| slot.take())
            .map_err(|_| StoreError::Unknown("memory store lock poisoned".to_string()))
    }
}

/// Key of the first document in `collection` matching `filter`.
fn first_match(collection: &Collection, filter: &Filter) -> Option<String> {
    if let Some(id) = filter.id_equality() {
        return collection
            .get(id)
            .filter(|doc| filter.matches(doc))
            .map(|_| id.to_string());
    }
    collection
        .iter()
        .find(|(_, doc)| filter.matches(doc))
        .map(|(key, _)| key.clone())
}

fn matching<'a>(collection: &'a Collection, filter: &'a Filter) -> impl Iterator<Item = &'a Value> {
    collection.values().filter(move |doc| filter.matches(doc))
}

fn insert_into(data: &mut Collections, collection: &str, id: &Id, mut document: Value)
    -> Result<(), StoreError> {
    if id.is_empty() {
        return Err(StoreError::Invalid(format!("{collection}: empty document id")));
    }
    let object = document
        .as_object_mut()
        .ok_or_else(|| StoreError::Invalid(format!("{collection}/{id}: document is not an object")))?;
    object.insert(ID_FIELD.to_string(), Value::String(id.to_string()));

    let docs = data.entry(collection.to_string()).or_default();
    if docs.contains_key(id.as_str()) {
        return Err(StoreError::AlreadyExists(format!("{collection}/{id}")));
    }
    docs.insert(id.to_string(), document);
    Ok(())
}

fn update_in(data: &mut Collections, collection: &str, filter: &Filter, update: &Update)
    -> Result<UpdateResult, StoreError> {
    let Some(docs) = data.get_mut(collection) else {
        return Ok(UpdateResult::default());
    };
    let Some(key) = first_match(docs, filter) else {
        return Ok(UpdateResult::default());
    };
    let Some(doc) = docs.get_mut(&key) else {
        return Ok(UpdateResult::default());
    };

    let mut updated = doc.clone();
    let modified = update.apply(&mut updated)?;
    if document_id(&updated)?.as_str() != key {
        return Err(StoreError::Invalid(format!(
            "{collection}/{key}: update may not change the document id"
        )));
    }
    *doc = updated;

    Ok(UpdateResult {
        matched: 1,
        modified: u64::from(modified),
    })
}

fn delete_in(data: &mut Collections, collection: &str, filter: &Filter) -> u64 {
    let Some(docs) = data.get_mut(collection) else {
        return 0;
    };
    let before = docs.len();
    docs.retain(|_, doc| !filter.matches(doc));
    (before - docs.len()) as u64
}

fn apply_write(data: &mut Collections, write: Write) -> Result<(), StoreError> {
    match write {
        Write::Insert {
            collection,
            id,
            document,
        } => insert_into(data, &collection, &id, document),
        Write::Update {
            collection,
            filter,
            update,
        } => {
            let result = update_in(data, &collection, &filter, &update)?;
            if result.matched == 0 {
                return Err(StoreError::NotFound(format!(
                    "{collection}: no document matches {filter:?}"
                )));
            }
            Ok(())
        }
        Write::Delete { collection, filter } => {
            delete_in(data, &collection, &filter);
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, filter: &Filter)
        -> Result<Option<Value>, StoreError> {
        let data = self.lock()?;
        Ok(data
            .get(collection)
            .and_then(|docs| first_match(docs, filter).and_then(|key| docs.get(&key).cloned())))
    }

    async fn find_one_projected(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &[&str],
    ) -> Result<Option<Value>, StoreError> {
        let found = self.find_one(collection, filter).await?;
        Ok(found.map(|doc| project(&doc, fields)))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let data = self.lock()?;
        Ok(match data.get(collection) {
            Some(docs) => options.page(matching(docs, filter).cloned()),
            None => Vec::new(),
        })
    }

    async fn insert_one(&self, collection: &str, id: &Id, document: Value)
        -> Result<(), StoreError> {
        let mut data = self.lock()?;
        insert_into(&mut data, collection, id, document)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        let mut data = self.lock()?;
        update_in(&mut data, collection, filter, update)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut data = self.lock()?;
        let Some(docs) = data.get_mut(collection) else {
            return Ok(0);
        };
        Ok(match first_match(docs, filter) {
            Some(key) => u64::from(docs.remove(&key).is_some()),
            None => 0,
        })
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut data = self.lock()?;
        Ok(delete_in(&mut data, collection, filter))
    }

    async fn commit(&self, transaction: Transaction) -> Result<(), StoreError> {
        let fail_after = self.take_failpoint()?;
        let mut data = self.lock()?;

        // Writes go to a scratch copy that replaces the live data only once
        // every write has succeeded.
        let mut staged = data.clone();
        for (applied, write) in transaction.into_writes().into_iter().enumerate() {
            if fail_after == Some(applied) {
                tracing::warn!(applied, "Simulated failure during commit");
                return Err(StoreError::Unknown(format!(
                    "simulated failure after {applied} writes"
                )));
            }
            apply_write(&mut staged, write)?;
        }
        if let Some(after) = fail_after {
            tracing::warn!(after, "Simulated failure before commit point");
            return Err(StoreError::Unknown("simulated failure at commit".to_string()));
        }

        *data = staged;
        Ok(())
    }
}
