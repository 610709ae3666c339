// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (`FIRESTORE_EMULATOR_HOST` set); they are skipped otherwise.
//! Every test uses fresh ids, so runs against a shared emulator don't collide.

use challenge_tracker::config::Config;
use challenge_tracker::db::{collections, DocumentStore, Filter, FindOptions, Transaction};
use challenge_tracker::error::ErrorKind;
use challenge_tracker::models::challenge::INVITES_FIELD;
use challenge_tracker::models::{ActivityType, Detail, Id, Invite, User};
use challenge_tracker::services::NoopGeocoder;
use challenge_tracker::store::{Actor, ResourceStore};
use challenge_tracker::AppState;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{activity, detail, test_db, unique_id, user};

async fn emulator_state() -> (Arc<dyn DocumentStore>, AppState) {
    let db: Arc<dyn DocumentStore> = Arc::new(test_db().await);
    let state = AppState::new(Config::test_default(), db.clone(), Arc::new(NoopGeocoder));
    (db, state)
}

// ═══════════════════════════════════════════════════════════════════════════
// DOCUMENT STORE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_insert_find_and_duplicate() {
    require_emulator!();

    let db = test_db().await;
    let id = unique_id("doc");

    db.insert_one(collections::USERS, &id, json!({"first_name": "Doc", "public": true}))
        .await
        .unwrap();
    let found = db
        .find_one(collections::USERS, &Filter::by_id(&id))
        .await
        .unwrap()
        .expect("document should exist");
    assert_eq!(found["first_name"], "Doc");
    assert_eq!(found["id"], id.as_str());

    let err = db
        .insert_one(collections::USERS, &id, json!({"first_name": "Again"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let deleted = db
        .delete_many(collections::USERS, &Filter::by_id(&id))
        .await
        .unwrap();
    assert_eq!(deleted, 1);
}

#[tokio::test]
async fn test_find_many_pushes_equality_down() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_id("owner");
    for n in 0..3 {
        db.insert_one(
            collections::ACTIVITIES,
            &unique_id("act"),
            json!({"user_id": owner.as_str(), "n": n}),
        )
        .await
        .unwrap();
    }

    let filter = Filter::eq("user_id", &owner);
    let all = db
        .find_many(collections::ACTIVITIES, &filter, &FindOptions::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let page = db
        .find_many(collections::ACTIVITIES, &filter, &FindOptions::new().limit(2).skip(2))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);

    assert_eq!(db.delete_many(collections::ACTIVITIES, &filter).await.unwrap(), 3);
}

#[tokio::test]
async fn test_transaction_insert_conflict_rolls_back() {
    require_emulator!();

    let db = test_db().await;
    let existing = unique_id("exists");
    let fresh = unique_id("fresh");
    db.insert_one(collections::MEMBERSHIPS, &existing, json!({"user": "u1"}))
        .await
        .unwrap();

    let mut transaction = Transaction::new();
    transaction
        .insert(collections::MEMBERSHIPS, fresh.clone(), json!({"user": "u2"}))
        .insert(collections::MEMBERSHIPS, existing.clone(), json!({"user": "u3"}));
    let err = db.commit(transaction).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let missing = db
        .find_one(collections::MEMBERSHIPS, &Filter::by_id(&fresh))
        .await
        .unwrap();
    assert!(missing.is_none(), "partial transaction must not be visible");
}

// ═══════════════════════════════════════════════════════════════════════════
// RESOURCE STORE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_update_preserves_identity() {
    require_emulator!();

    let db: Arc<dyn DocumentStore> = Arc::new(test_db().await);
    let users: ResourceStore<User> = ResourceStore::new(db);
    let id = unique_id("user");
    let actor = Actor::user(id.clone());

    users.create(user(id.as_str())).await.unwrap();
    let original = users.read(&actor, &id).await.unwrap();

    let mut changed = user(id.as_str());
    changed.bio = "Updated".to_string();
    users.update(&actor, changed).await.unwrap();

    let fetched = users.read(&actor, &id).await.unwrap();
    assert_eq!(fetched.bio, "Updated");
    assert_eq!(fetched.created_date, original.created_date);

    let err = users.read(&Actor::user("stranger"), &id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    users.delete(&actor, &id).await.unwrap();
    let err = users.read(&actor, &id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_invite_append_is_unique() {
    require_emulator!();

    let db: Arc<dyn DocumentStore> = Arc::new(test_db().await);
    let details: ResourceStore<Detail> = ResourceStore::new(db);
    let owner_id = unique_id("owner");
    let owner = Actor::user(owner_id.clone());

    let mut d = detail("invites", Utc::now());
    d.created_by = owner_id.clone();
    let id = details.create(d).await.unwrap();

    let invite = Invite {
        id: Id::from("guest"),
        invited_by: owner_id,
        created_date: Utc::now(),
    };
    details
        .append_attribute(&owner, &id, INVITES_FIELD, &invite)
        .await
        .unwrap();
    let err = details
        .append_attribute(&owner, &id, INVITES_FIELD, &invite)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let invites: Vec<Invite> = details.read_attribute(&owner, &id, INVITES_FIELD).await.unwrap();
    assert_eq!(invites.len(), 1);

    details.delete(&owner, &id).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invite_appends_yield_one_success() {
    require_emulator!();

    let db: Arc<dyn DocumentStore> = Arc::new(test_db().await);
    let details: ResourceStore<Detail> = ResourceStore::new(db);
    let owner_id = unique_id("owner");
    let owner = Actor::user(owner_id.clone());

    let mut d = detail("race", Utc::now());
    d.created_by = owner_id.clone();
    let id = details.create(d).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let details = details.clone();
        let owner = owner.clone();
        let id = id.clone();
        let invited_by = owner_id.clone();
        handles.push(tokio::spawn(async move {
            let invite = Invite {
                id: Id::from("guest"),
                invited_by,
                created_date: Utc::now(),
            };
            details.append_attribute(&owner, &id, INVITES_FIELD, &invite).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::AlreadyExists, "{e}"),
        }
    }
    assert_eq!(successes, 1);

    details.delete(&owner, &id).await.unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════
// DOMAIN TRANSACTIONS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_challenge_and_user_cascades() {
    require_emulator!();

    let (db, state) = emulator_state().await;
    let alice_id = unique_id("alice");
    let bob_id = unique_id("bob");
    let alice = Actor::user(alice_id.clone());
    let start = Utc::now() - Duration::days(1);

    state.users.create(&alice, user(alice_id.as_str())).await.unwrap();
    for km in [1.0, 2.0, 3.0] {
        state
            .activities
            .create(&alice, activity(alice_id.as_str(), ActivityType::Running, km, start))
            .await
            .unwrap();
    }

    let challenge = state
        .challenges
        .create(
            &alice,
            detail("cascade", start),
            vec![alice_id.clone(), bob_id.clone()],
        )
        .await
        .unwrap();
    assert_eq!(challenge.members.len(), 2);

    let progress = state
        .challenges
        .progress(&alice, challenge.id(), &alice_id)
        .await
        .unwrap();
    assert!(progress.percentage() > 0.0);

    state.users.delete(&alice, &alice_id).await.unwrap();
    let left = db
        .find_many(
            collections::ACTIVITIES,
            &Filter::eq("user_id", &alice_id),
            &FindOptions::default(),
        )
        .await
        .unwrap();
    assert!(left.is_empty());

    let remaining = state
        .challenges
        .get(&Actor::admin("root"), challenge.id())
        .await
        .unwrap();
    assert_eq!(remaining.members, vec![bob_id]);

    state
        .challenges
        .delete(&Actor::admin("root"), challenge.id())
        .await
        .unwrap();
    let memberships = db
        .find_many(
            collections::MEMBERSHIPS,
            &Filter::eq("challenge", challenge.id()),
            &FindOptions::default(),
        )
        .await
        .unwrap();
    assert!(memberships.is_empty());
}
