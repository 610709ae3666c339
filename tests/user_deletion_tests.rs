// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration tests for user deletion.
//!
//! Deleting a user removes their memberships and activities in the same
//! transaction; a failure part way through must leave everything in place.

use challenge_tracker::db::collections;
use challenge_tracker::error::ErrorKind;
use challenge_tracker::models::{ActivityType, Id};
use challenge_tracker::store::Actor;
use chrono::{Duration, Utc};

mod common;
use common::{activity, detail, memory_state, user};

/// A user with 3 activities and 2 memberships, plus an unrelated user with
/// one of each.
async fn populate(state: &challenge_tracker::AppState) -> (Actor, Vec<Id>) {
    let alice = Actor::user("alice");
    let bob = Actor::user("bob");
    let start = Utc::now() - Duration::days(1);

    state.users.create(&alice, user("alice")).await.unwrap();
    state.users.create(&bob, user("bob")).await.unwrap();

    for km in [1.0, 2.0, 3.0] {
        state
            .activities
            .create(&alice, activity("alice", ActivityType::Running, km, start))
            .await
            .unwrap();
    }
    state
        .activities
        .create(&bob, activity("bob", ActivityType::Walking, 4.0, start))
        .await
        .unwrap();

    let mut challenges = Vec::new();
    for name in ["first", "second"] {
        let challenge = state
            .challenges
            .create(
                &bob,
                detail(name, start),
                vec![Id::from("alice"), Id::from("bob")],
            )
            .await
            .unwrap();
        challenges.push(challenge.id().clone());
    }
    (alice, challenges)
}

#[tokio::test]
async fn test_delete_user_removes_all_dependent_records() {
    let (store, state) = memory_state();
    let (alice, challenges) = populate(&state).await;

    assert_eq!(store.count(collections::ACTIVITIES), 4);
    assert_eq!(store.count(collections::MEMBERSHIPS), 4);

    state.users.delete(&alice, &Id::from("alice")).await.unwrap();

    assert_eq!(store.count(collections::USERS), 1);
    assert_eq!(store.count(collections::ACTIVITIES), 1);
    assert_eq!(store.count(collections::MEMBERSHIPS), 2);

    let err = state
        .users
        .get(&Actor::admin("root"), &Id::from("alice"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // The challenges survive with bob as the only member.
    for id in &challenges {
        let challenge = state.challenges.get(&Actor::user("bob"), id).await.unwrap();
        assert_eq!(challenge.members, vec![Id::from("bob")]);
    }
}

#[tokio::test]
async fn test_failed_delete_leaves_no_partial_state() {
    let (store, state) = memory_state();
    let (alice, _) = populate(&state).await;

    // Fail after the user document and some dependents have been staged.
    for fail_after in [1, 2, 3] {
        store.fail_next_commit_after(fail_after);
        let err = state
            .users
            .delete(&alice, &Id::from("alice"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);

        assert_eq!(store.count(collections::USERS), 2);
        assert_eq!(store.count(collections::ACTIVITIES), 4);
        assert_eq!(store.count(collections::MEMBERSHIPS), 4);
    }

    // Retrying without the failure succeeds.
    state.users.delete(&alice, &Id::from("alice")).await.unwrap();
    assert_eq!(store.count(collections::ACTIVITIES), 1);
}

#[tokio::test]
async fn test_only_self_or_admin_may_delete() {
    let (store, state) = memory_state();
    populate(&state).await;

    let err = state
        .users
        .delete(&Actor::user("bob"), &Id::from("alice"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(store.count(collections::USERS), 2);

    state
        .users
        .delete(&Actor::admin("root"), &Id::from("alice"))
        .await
        .unwrap();
    assert_eq!(store.count(collections::USERS), 1);
}

#[tokio::test]
async fn test_user_reads_include_challenges() {
    let (_, state) = memory_state();
    let (alice, challenges) = populate(&state).await;

    let mut read = state.users.get(&alice, &Id::from("alice")).await.unwrap();
    read.challenges.sort();
    let mut expected = challenges.clone();
    expected.sort();
    assert_eq!(read.challenges, expected);
}
