// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge Tracker: fitness activities, challenges and progress along
//! geographic routes.
//!
//! This crate provides a permission-aware resource store over a document
//! database, the target evaluation engine, and the backend API around them.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use config::{Config, StoreBackend};
use db::{DocumentStore, FirestoreDb, MemoryStore};
use services::{ActivityService, ChallengeService, Geocoder, GoogleGeocoder, NoopGeocoder, UserService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn DocumentStore>,
    pub users: UserService,
    pub activities: ActivityService,
    pub challenges: ChallengeService,
}

impl AppState {
    /// Wire the services over `db` and `geocoder`.
    pub fn new(config: Config, db: Arc<dyn DocumentStore>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            users: UserService::new(db.clone()),
            activities: ActivityService::new(db.clone()),
            challenges: ChallengeService::new(db.clone(), geocoder),
            config,
            db,
        }
    }

    /// Connect to the configured backend and geocoder.
    pub async fn from_config(config: Config) -> Result<Self, error::StoreError> {
        let db: Arc<dyn DocumentStore> = match config.store_backend {
            StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        let geocoder: Arc<dyn Geocoder> = match &config.maps_api_key {
            Some(key) => Arc::new(GoogleGeocoder::new(key.clone())),
            None => {
                tracing::info!("MAPS_API_KEY not set; reverse geocoding disabled");
                Arc::new(NoopGeocoder)
            }
        };

        Ok(Self::new(config, db, geocoder))
    }
}
