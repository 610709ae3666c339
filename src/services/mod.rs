// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activities;
pub mod challenges;
pub mod geocoding;
pub mod users;

pub use activities::ActivityService;
pub use challenges::{ChallengeOperation, ChallengeService, MemberProgress};
pub use geocoding::{GeocodeError, Geocoder, GoogleGeocoder, NoopGeocoder};
pub use users::UserService;
