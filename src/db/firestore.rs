// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed [`DocumentStore`].
//!
//! Documents are stored under their `id` field as the Firestore document id.
//! Equality clauses are pushed down to Firestore queries; the remaining parts
//! of a filter are evaluated client-side by the shared evaluator. Every
//! conditional write runs inside a Firestore transaction so the read that
//! checks the filter and the write that depends on it commit together.

use crate::db::{
    document_id, project, DocumentStore, FieldValue, Filter, FindOptions, Transaction, Update,
    UpdateResult, Write,
};
use crate::error::StoreError;
use crate::models::Id;
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::{FirestoreConsistencySelector, FirestoreWritePrecondition};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

// Firestore limits a transaction to 500 writes.
const MAX_TRANSACTION_WRITES: usize = 500;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Pending state of one document inside a transaction.
struct Staged {
    document: Option<Value>,
    /// Document did not exist when the transaction read it.
    created: bool,
}

type StagedDocs = BTreeMap<(String, String), Staged>;

#[derive(Debug, Clone, Copy, Default)]
struct WriteOutcome {
    matched: u64,
    modified: u64,
}

// Attempts for a transaction that Firestore aborts because a concurrent
// transaction touched the same documents.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Firestore aborted the transaction because of contention; running it again
/// re-reads the documents and re-evaluates every filter.
fn is_contention(err: &FirestoreError) -> bool {
    matches!(
        err,
        FirestoreError::DatabaseError(db) if db.retry_possible && db.public.code == "Aborted"
    )
}

fn map_error(context: &str, err: FirestoreError) -> StoreError {
    let message = format!("{context}: {err}");
    match err {
        FirestoreError::DataConflictError(_) => StoreError::AlreadyExists(message),
        FirestoreError::DataNotFoundError(_) => StoreError::NotFound(message),
        FirestoreError::DeserializeError(_) => StoreError::Decode(message),
        ref e if is_contention(e) => {
            StoreError::Unknown(format!("{message} (gave up after {MAX_TRANSACTION_ATTEMPTS} attempts)"))
        }
        _ => StoreError::Unknown(message),
    }
}

/// Result of one transaction attempt.
enum Attempt {
    Committed(Vec<WriteOutcome>),
    Contended(FirestoreError),
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| map_error("failed to connect to Firestore", e))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| map_error("failed to connect to Firestore emulator", e))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every operation returns an error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client
            .as_ref()
            .ok_or_else(|| StoreError::Unknown("database not connected (offline mode)".to_string()))
    }

    /// Fetch every document in `collection` matching `filter`, using `reader`
    /// (which may be bound to a transaction).
    async fn load(
        reader: &firestore::FirestoreDb,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Value>, StoreError> {
        if let Some(id) = filter.id_equality() {
            let doc: Option<Value> = reader
                .fluent()
                .select()
                .by_id_in(collection)
                .obj()
                .one(id)
                .await
                .map_err(|e| map_error(collection, e))?;
            return Ok(doc.into_iter().filter(|d| filter.matches(d)).collect());
        }

        let equalities: Vec<(String, FieldValue)> = filter
            .equalities()
            .into_iter()
            .map(|(field, value)| (field.to_string(), value.clone()))
            .collect();

        let docs: Vec<Value> = if equalities.is_empty() {
            reader
                .fluent()
                .select()
                .from(collection)
                .obj()
                .query()
                .await
        } else {
            reader
                .fluent()
                .select()
                .from(collection)
                .filter(move |q| {
                    let clauses: Vec<_> = equalities
                        .iter()
                        .map(|(field, value)| match value {
                            FieldValue::Str(s) => q.field(field.as_str()).eq(s.clone()),
                            FieldValue::Bool(b) => q.field(field.as_str()).eq(*b),
                        })
                        .collect();
                    q.for_all(clauses)
                })
                .obj()
                .query()
                .await
        }
        .map_err(|e| map_error(collection, e))?;

        Ok(docs.into_iter().filter(|d| filter.matches(d)).collect())
    }

    /// Documents matching `filter` as seen by a transaction: what Firestore
    /// returned, overlaid with the transaction's own pending writes.
    async fn load_staged(
        reader: &firestore::FirestoreDb,
        staged: &StagedDocs,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Value>, StoreError> {
        let fetched = Self::load(reader, collection, filter).await?;
        let mut seen = Vec::with_capacity(fetched.len());
        let mut out = Vec::with_capacity(fetched.len());

        for doc in fetched {
            let id = document_id(&doc)?;
            match staged.get(&(collection.to_string(), id.to_string())) {
                Some(entry) => {
                    if let Some(pending) = entry.document.as_ref().filter(|d| filter.matches(d)) {
                        out.push(pending.clone());
                    }
                }
                None => out.push(doc),
            }
            seen.push(id.to_string());
        }

        for ((col, id), entry) in staged {
            if col != collection || seen.contains(id) {
                continue;
            }
            if let Some(pending) = entry.document.as_ref().filter(|d| filter.matches(d)) {
                out.push(pending.clone());
            }
        }

        Ok(out)
    }

    /// Run `writes` as one Firestore transaction.
    ///
    /// With `strict`, an update that matches nothing aborts the transaction
    /// with `NotFound`; otherwise it is reported as matching zero documents.
    ///
    /// A transaction aborted by contention is retried from scratch a bounded
    /// number of times, so the loser of a race sees the winner's write (for a
    /// conditional append, a filter that no longer matches).
    async fn run(&self, writes: Vec<Write>, strict: bool) -> Result<Vec<WriteOutcome>, StoreError> {
        let mut attempt = 1;
        loop {
            match self.run_once(writes.clone(), strict).await? {
                Attempt::Committed(outcomes) => return Ok(outcomes),
                Attempt::Contended(e) if attempt >= MAX_TRANSACTION_ATTEMPTS => {
                    return Err(map_error("transaction commit failed", e));
                }
                Attempt::Contended(e) => {
                    tracing::debug!(attempt, error = %e, "Firestore transaction aborted, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn run_once(&self, writes: Vec<Write>, strict: bool) -> Result<Attempt, StoreError> {
        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| map_error("failed to begin transaction", e))?;
        let reader = client.clone_with_consistency_selector(
            FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
        );

        let staged = match Self::stage(&reader, writes, strict).await {
            Ok(staged) => staged,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        };
        let (staged, outcomes) = staged;

        if staged.len() > MAX_TRANSACTION_WRITES {
            let _ = transaction.rollback().await;
            return Err(StoreError::Invalid(format!(
                "transaction touches {} documents (limit {MAX_TRANSACTION_WRITES})",
                staged.len()
            )));
        }

        for ((collection, id), entry) in &staged {
            let added = match &entry.document {
                Some(doc) if entry.created => client
                    .fluent()
                    .update()
                    .in_col(collection)
                    .precondition(FirestoreWritePrecondition::Exists(false))
                    .document_id(id)
                    .object(doc)
                    .add_to_transaction(&mut transaction)
                    .map(|_| ()),
                Some(doc) => client
                    .fluent()
                    .update()
                    .in_col(collection)
                    .document_id(id)
                    .object(doc)
                    .add_to_transaction(&mut transaction)
                    .map(|_| ()),
                None => client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(id)
                    .add_to_transaction(&mut transaction)
                    .map(|_| ()),
            };
            added.map_err(|e| map_error(&format!("failed to stage {collection}/{id}"), e))?;
        }

        match transaction.commit().await {
            Ok(_) => Ok(Attempt::Committed(outcomes)),
            Err(e) if is_contention(&e) => Ok(Attempt::Contended(e)),
            Err(e) => Err(map_error("transaction commit failed", e)),
        }
    }

    /// Evaluate `writes` in order against the transaction's view, collapsing
    /// them into one final state per touched document.
    async fn stage(
        reader: &firestore::FirestoreDb,
        writes: Vec<Write>,
        strict: bool,
    ) -> Result<(StagedDocs, Vec<WriteOutcome>), StoreError> {
        let mut staged = StagedDocs::new();
        let mut outcomes = Vec::with_capacity(writes.len());

        for write in writes {
            match write {
                Write::Insert {
                    collection,
                    id,
                    mut document,
                } => {
                    let key = (collection.clone(), id.to_string());
                    let created = match staged.get(&key) {
                        Some(Staged {
                            document: Some(_), ..
                        }) => {
                            return Err(StoreError::AlreadyExists(format!("{collection}/{id}")));
                        }
                        Some(Staged { document: None, .. }) => false,
                        None => {
                            if !Self::load(reader, &collection, &Filter::by_id(&id))
                                .await?
                                .is_empty()
                            {
                                return Err(StoreError::AlreadyExists(format!(
                                    "{collection}/{id}"
                                )));
                            }
                            true
                        }
                    };
                    if let Some(object) = document.as_object_mut() {
                        object.insert(
                            crate::db::ID_FIELD.to_string(),
                            Value::String(id.to_string()),
                        );
                    }
                    staged.insert(
                        key,
                        Staged {
                            document: Some(document),
                            created,
                        },
                    );
                    outcomes.push(WriteOutcome {
                        matched: 1,
                        modified: 1,
                    });
                }
                Write::Update {
                    collection,
                    filter,
                    update,
                } => {
                    let found = Self::load_staged(reader, &staged, &collection, &filter).await?;
                    let Some(mut document) = found.into_iter().next() else {
                        if strict {
                            return Err(StoreError::NotFound(format!(
                                "{collection}: no document matches {filter:?}"
                            )));
                        }
                        outcomes.push(WriteOutcome::default());
                        continue;
                    };
                    let id = document_id(&document)?;
                    let modified = update.apply(&mut document)?;
                    if document_id(&document)? != id {
                        return Err(StoreError::Invalid(format!(
                            "{collection}/{id}: update may not change the document id"
                        )));
                    }
                    if modified {
                        let key = (collection.clone(), id.to_string());
                        let created = staged.get(&key).is_some_and(|s| s.created);
                        staged.insert(
                            key,
                            Staged {
                                document: Some(document),
                                created,
                            },
                        );
                    }
                    outcomes.push(WriteOutcome {
                        matched: 1,
                        modified: u64::from(modified),
                    });
                }
                Write::Delete { collection, filter } => {
                    let found = Self::load_staged(reader, &staged, &collection, &filter).await?;
                    let count = found.len() as u64;
                    for doc in found {
                        let key = (collection.clone(), document_id(&doc)?.to_string());
                        match staged.get(&key) {
                            // Created and deleted inside this transaction: no write at all.
                            Some(entry) if entry.created => {
                                staged.remove(&key);
                            }
                            _ => {
                                staged.insert(
                                    key,
                                    Staged {
                                        document: None,
                                        created: false,
                                    },
                                );
                            }
                        }
                    }
                    outcomes.push(WriteOutcome {
                        matched: count,
                        modified: count,
                    });
                }
            }
        }

        Ok((staged, outcomes))
    }
}

#[async_trait]
impl DocumentStore for FirestoreDb {
    async fn find_one(&self, collection: &str, filter: &Filter)
        -> Result<Option<Value>, StoreError> {
        let client = self.get_client()?;
        Ok(Self::load(client, collection, filter).await?.into_iter().next())
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
        let client = self.get_client()?;
        Ok(options.page(Self::load(client, collection, filter).await?))
    }

    async fn insert_one(&self, collection: &str, id: &Id, document: Value)
        -> Result<(), StoreError> {
        let mut transaction = Transaction::new();
        transaction.insert(collection, id.clone(), document);
        self.run(transaction.into_writes(), true).await?;
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        let mut transaction = Transaction::new();
        transaction.update(collection, filter.clone(), update.clone());
        let outcome = self
            .run(transaction.into_writes(), false)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();
        Ok(UpdateResult {
            matched: outcome.matched,
            modified: outcome.modified,
        })
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let Some(doc) = self.find_one(collection, filter).await? else {
            return Ok(0);
        };
        let only = Filter::by_id(&document_id(&doc)?).and(filter.clone());
        self.delete_many(collection, &only).await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut transaction = Transaction::new();
        transaction.delete(collection, filter.clone());
        let outcomes = self.run(transaction.into_writes(), false).await?;
        Ok(outcomes.first().map_or(0, |o| o.matched))
    }

    async fn commit(&self, transaction: Transaction) -> Result<(), StoreError> {
        let writes = transaction.len();
        self.run(transaction.into_writes(), true).await?;
        tracing::debug!(writes, "Firestore transaction committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firestore::errors::{FirestoreDatabaseError, FirestoreErrorPublicGenericDetails};

    fn database_error(code: &str, retry_possible: bool) -> FirestoreError {
        FirestoreError::DatabaseError(FirestoreDatabaseError::new(
            FirestoreErrorPublicGenericDetails::new(code.to_string()),
            "status".to_string(),
            retry_possible,
        ))
    }

    #[test]
    fn test_aborted_commit_is_contention() {
        assert!(is_contention(&database_error("Aborted", true)));
        assert!(!is_contention(&database_error("Unavailable", true)));
        assert!(!is_contention(&database_error("Internal", false)));
    }

    #[test]
    fn test_exhausted_contention_is_reported() {
        let err = map_error("transaction commit failed", database_error("Aborted", true));
        assert_eq!(err.kind(), crate::error::ErrorKind::Unknown);
        assert!(err.to_string().contains("gave up after"));
    }
}
