// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod challenge;
pub mod ids;
pub mod route;
pub mod target;
pub mod user;

pub use activity::{Activity, ActivityType};
pub use challenge::{Challenge, Detail, Invite, Membership};
pub use ids::{Id, Timestamp};
pub use route::{Route, RouteError, Waypoint};
pub use target::{Location, Progress, RouteMovingProgress, RouteMovingTarget, Target, TargetType};
pub use user::User;
