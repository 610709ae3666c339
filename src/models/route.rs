// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Great-circle route geometry.
//!
//! Distances are in kilometres. Positions along a route are found by walking
//! its segments and projecting from the start of the segment that contains
//! the requested distance, along the initial bearing toward the segment end.

use geo::{Bearing, Destination, Distance, Haversine, Point};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const METRES_PER_KM: f64 = 1000.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RouteError {
    #[error("route has no waypoints")]
    Empty,

    #[error("waypoint {index} is out of range (lat {lat}, lng {lng})")]
    InvalidWaypoint { index: usize, lat: f64, lng: f64 },
}

/// One coordinate of a route, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
}

impl Waypoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    fn point(&self) -> Point<f64> {
        Point::new(self.lng, self.lat)
    }

    fn from_point(point: Point<f64>) -> Self {
        Self {
            lat: point.y(),
            lng: point.x(),
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance in kilometres.
    pub fn distance_to(&self, other: &Waypoint) -> f64 {
        Haversine.distance(self.point(), other.point()) / METRES_PER_KM
    }

    /// The point `km` kilometres from here along the initial bearing toward
    /// `toward`.
    pub fn project_toward(&self, toward: &Waypoint, km: f64) -> Waypoint {
        let bearing = Haversine.bearing(self.point(), toward.point());
        Waypoint::from_point(Haversine.destination(self.point(), bearing, km * METRES_PER_KM))
    }
}

/// Ordered sequence of waypoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Route {
    pub waypoints: Vec<Waypoint>,
}

impl Route {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }

    /// Non-empty, with every coordinate in range.
    pub fn validate(&self) -> Result<(), RouteError> {
        if self.waypoints.is_empty() {
            return Err(RouteError::Empty);
        }
        match self.waypoints.iter().position(|w| !w.is_valid()) {
            Some(index) => Err(RouteError::InvalidWaypoint {
                index,
                lat: self.waypoints[index].lat,
                lng: self.waypoints[index].lng,
            }),
            None => Ok(()),
        }
    }

    /// Sum of consecutive segment lengths in kilometres.
    pub fn total_distance(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|pair| pair[0].distance_to(&pair[1]))
            .sum()
    }

    /// Position `distance` kilometres along the route.
    ///
    /// Zero or negative distances give the first waypoint, distances past
    /// the end give the last one, and zero-length segments are skipped.
    pub fn location_at(&self, distance: f64) -> Result<Waypoint, RouteError> {
        let (first, last) = match (self.waypoints.first(), self.waypoints.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(RouteError::Empty),
        };
        // Also catches NaN.
        if !(distance > 0.0) {
            return Ok(first);
        }

        let mut covered = 0.0;
        for pair in self.waypoints.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let segment = from.distance_to(&to);
            if segment <= 0.0 {
                continue;
            }
            if covered + segment >= distance {
                let remaining = distance - covered;
                if remaining >= segment {
                    return Ok(to);
                }
                return Ok(from.project_toward(&to, remaining));
            }
            covered += segment;
        }

        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equator_route() -> Route {
        // Two points on the equator, 10 degrees of longitude apart (~1112 km).
        Route::new(vec![Waypoint::new(0.0, 0.0), Waypoint::new(0.0, 10.0)])
    }

    #[test]
    fn test_distance_along_equator() {
        let d = Waypoint::new(0.0, 0.0).distance_to(&Waypoint::new(0.0, 1.0));
        assert!((d - 111.19).abs() < 0.1, "got {d}");
    }

    #[test]
    fn test_total_distance_sums_segments() {
        let route = Route::new(vec![
            Waypoint::new(0.0, 0.0),
            Waypoint::new(0.0, 1.0),
            Waypoint::new(0.0, 2.0),
        ]);
        let whole = Waypoint::new(0.0, 0.0).distance_to(&Waypoint::new(0.0, 2.0));
        assert!((route.total_distance() - whole).abs() < 1e-6);
    }

    #[test]
    fn test_location_at_bounds() {
        let route = equator_route();
        assert_eq!(route.location_at(0.0).unwrap(), Waypoint::new(0.0, 0.0));
        assert_eq!(route.location_at(-5.0).unwrap(), Waypoint::new(0.0, 0.0));
        assert_eq!(route.location_at(1e9).unwrap(), Waypoint::new(0.0, 10.0));
    }

    #[test]
    fn test_location_at_midpoint_of_segment() {
        let route = equator_route();
        let half = route.total_distance() / 2.0;
        let mid = route.location_at(half).unwrap();
        assert!(mid.lat.abs() < 1e-6);
        assert!((mid.lng - 5.0).abs() < 1e-3, "got {mid:?}");
    }

    #[test]
    fn test_location_in_second_segment() {
        let route = Route::new(vec![
            Waypoint::new(0.0, 0.0),
            Waypoint::new(0.0, 1.0),
            Waypoint::new(1.0, 1.0),
        ]);
        let first_leg = route.waypoints[0].distance_to(&route.waypoints[1]);
        let p = route.location_at(first_leg + 55.0).unwrap();
        assert!((p.lng - 1.0).abs() < 1e-3, "got {p:?}");
        assert!(p.lat > 0.4 && p.lat < 0.6, "got {p:?}");
    }

    #[test]
    fn test_single_and_empty_routes() {
        let single = Route::new(vec![Waypoint::new(37.0, -122.0)]);
        assert_eq!(single.total_distance(), 0.0);
        assert_eq!(single.location_at(10.0).unwrap(), Waypoint::new(37.0, -122.0));

        let empty = Route::default();
        assert_eq!(empty.location_at(1.0), Err(RouteError::Empty));
        assert_eq!(empty.validate(), Err(RouteError::Empty));
    }

    #[test]
    fn test_zero_length_segments_are_skipped() {
        let route = Route::new(vec![
            Waypoint::new(0.0, 0.0),
            Waypoint::new(0.0, 0.0),
            Waypoint::new(0.0, 2.0),
        ]);
        let p = route.location_at(route.total_distance() / 2.0).unwrap();
        assert!((p.lng - 1.0).abs() < 1e-3, "got {p:?}");
    }

    #[test]
    fn test_validate_rejects_out_of_range_waypoint() {
        let route = Route::new(vec![Waypoint::new(0.0, 0.0), Waypoint::new(91.0, 0.0)]);
        assert!(matches!(
            route.validate(),
            Err(RouteError::InvalidWaypoint { index: 1, .. })
        ));
    }
}
