// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge targets and the progress they evaluate to.
//!
//! `Target` and `Progress` are tagged on a `type` field; the tag selects the
//! concrete variant when a stored challenge is decoded. Evaluation is a pure
//! function of the target and the activities passed in.

use crate::models::activity::Activity;
use crate::models::route::{Route, RouteError};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use std::fmt;

/// Discriminator of a [`Target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    RouteMoving,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::RouteMoving => f.write_str("route_moving"),
        }
    }
}

/// Goal attached to a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    RouteMoving(RouteMovingTarget),
}

impl Target {
    pub fn target_type(&self) -> TargetType {
        match self {
            Target::RouteMoving(_) => TargetType::RouteMoving,
        }
    }

    pub fn validate(&self) -> Result<(), RouteError> {
        match self {
            Target::RouteMoving(t) => t.route.validate(),
        }
    }

    /// Cache derived values before the target is stored.
    pub fn prepare(&mut self) {
        match self {
            Target::RouteMoving(t) => t.prepare(),
        }
    }

    pub fn evaluate(&self, activities: &[Activity]) -> Result<Progress, RouteError> {
        match self {
            Target::RouteMoving(t) => t.evaluate(activities).map(Progress::RouteMoving),
        }
    }
}

/// Travel the length of a route, counting every moving activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteMovingTarget {
    pub route: Route,
    /// Route length in kilometres, cached when the challenge is saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_distance: Option<f64>,
}

impl RouteMovingTarget {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            total_distance: None,
        }
    }

    pub fn prepare(&mut self) {
        self.total_distance = Some(self.route.total_distance());
    }

    pub fn total_distance(&self) -> f64 {
        self.total_distance
            .unwrap_or_else(|| self.route.total_distance())
    }

    pub fn evaluate(&self, activities: &[Activity]) -> Result<RouteMovingProgress, RouteError> {
        let moved = activities
            .iter()
            .filter(|a| a.activity_type.is_moving())
            .map(|a| a.value)
            .filter(|v| v.is_finite())
            .sum::<f64>()
            .max(0.0);

        let total = self.total_distance();
        let percent = if total > 0.0 {
            (100.0 * moved / total).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let at = self.route.location_at(moved)?;

        Ok(RouteMovingProgress {
            percent,
            distance_covered: moved,
            location: Location {
                lat: at.lat,
                lng: at.lng,
                name: None,
            },
        })
    }
}

/// A position, optionally decorated with a place name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RouteMovingProgress {
    pub percent: f64,
    /// Kilometres of moving activity counted.
    pub distance_covered: f64,
    pub location: Location,
}

/// Evaluated progress toward a [`Target`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Progress {
    RouteMoving(RouteMovingProgress),
}

impl Progress {
    /// Completion in percent, always within 0..=100.
    pub fn percentage(&self) -> f64 {
        match self {
            Progress::RouteMoving(p) => p.percent,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            Progress::RouteMoving(p) => Some(&p.location),
        }
    }

    pub fn location_mut(&mut self) -> Option<&mut Location> {
        match self {
            Progress::RouteMoving(p) => Some(&mut p.location),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::ActivityType;
    use crate::models::route::Waypoint;
    use crate::models::Id;
    use chrono::{Duration, Utc};

    fn activity(activity_type: ActivityType, value: f64) -> Activity {
        let start = Utc::now();
        Activity {
            id: Id::default(),
            user_id: Id::from("u1"),
            activity_type,
            value,
            start,
            end: start + Duration::hours(1),
            created_date: start,
        }
    }

    #[test]
    fn test_target_serializes_with_type_tag() {
        let target = Target::RouteMoving(RouteMovingTarget::new(Route::new(vec![
            Waypoint::new(1.0, 2.0),
        ])));
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["type"], "route_moving");
        assert_eq!(json["route"]["waypoints"][0]["lat"], 1.0);

        let back: Target = serde_json::from_value(json).unwrap();
        assert_eq!(back, target);
        assert_eq!(back.target_type().to_string(), "route_moving");
    }

    #[test]
    fn test_unknown_target_type_is_rejected() {
        let json = serde_json::json!({"type": "step_count", "steps": 10});
        assert!(serde_json::from_value::<Target>(json).is_err());
    }

    #[test]
    fn test_only_moving_activities_count() {
        let target = RouteMovingTarget::new(Route::new(vec![
            Waypoint::new(0.0, 0.0),
            Waypoint::new(0.0, 10.0),
        ]));
        let progress = target
            .evaluate(&[
                activity(ActivityType::Running, 10.0),
                activity(ActivityType::Any, 500.0),
                activity(ActivityType::Cycling, 5.0),
            ])
            .unwrap();
        assert!((progress.distance_covered - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_length_route_has_zero_percent() {
        let target = RouteMovingTarget::new(Route::new(vec![Waypoint::new(5.0, 5.0)]));
        let progress = target.evaluate(&[activity(ActivityType::Walking, 3.0)]).unwrap();
        assert_eq!(progress.percent, 0.0);
        assert_eq!(progress.location.lat, 5.0);
    }

    #[test]
    fn test_prepare_caches_total_distance() {
        let mut target = Target::RouteMoving(RouteMovingTarget::new(Route::new(vec![
            Waypoint::new(0.0, 0.0),
            Waypoint::new(0.0, 1.0),
        ])));
        target.prepare();
        let Target::RouteMoving(t) = &target;
        let cached = t.total_distance.unwrap();
        assert!((cached - t.route.total_distance()).abs() < 1e-12);
    }
}
