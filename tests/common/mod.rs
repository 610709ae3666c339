// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use challenge_tracker::config::Config;
use challenge_tracker::db::{FirestoreDb, MemoryStore};
use challenge_tracker::models::{
    Activity, ActivityType, Detail, Id, Route, RouteMovingTarget, Target, User, Waypoint,
};
use challenge_tracker::routes::create_router;
use challenge_tracker::services::NoopGeocoder;
use challenge_tracker::AppState;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Generate a unique id for test isolation against a shared emulator.
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> Id {
    Id::new(format!("{prefix}-{}", uuid::Uuid::new_v4().simple()))
}

/// App state over a fresh in-memory store. The store handle is returned too
/// so tests can inspect collections and inject commit failures.
#[allow(dead_code)]
pub fn memory_state() -> (Arc<MemoryStore>, Arc<AppState>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(
        Config::test_default(),
        store.clone(),
        Arc::new(NoopGeocoder),
    ));
    (store, state)
}

/// Create a test app over the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let (_, state) = memory_state();
    (create_router(state.clone()), state)
}

#[allow(dead_code)]
pub fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC 3339 timestamp")
        .with_timezone(&Utc)
}

#[allow(dead_code)]
pub fn user(id: &str) -> User {
    User {
        id: Id::from(id),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: format!("{id}@example.com"),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn activity(user_id: &str, activity_type: ActivityType, km: f64, start: DateTime<Utc>) -> Activity {
    Activity {
        id: Id::default(),
        user_id: Id::from(user_id),
        activity_type,
        value: km,
        start,
        end: start + Duration::hours(1),
        created_date: Utc::now(),
    }
}

/// Two waypoints on the equator roughly 1000 km apart.
#[allow(dead_code)]
pub fn equator_route() -> Route {
    Route::new(vec![Waypoint::new(0.0, 0.0), Waypoint::new(0.0, 8.9932)])
}

/// A challenge running from `start` for 30 days along [`equator_route`].
#[allow(dead_code)]
pub fn detail(name: &str, start: DateTime<Utc>) -> Detail {
    Detail {
        id: Id::default(),
        name: name.to_string(),
        description: String::new(),
        start_date: start,
        end_date: start + Duration::days(30),
        public: false,
        invite_only: false,
        created_by: Id::default(),
        created_date: Utc::now(),
        target: Target::RouteMoving(RouteMovingTarget::new(equator_route())),
        invites: Vec::new(),
    }
}
