// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reverse geocoding: coordinate to human-readable place name.
//!
//! Only used to decorate progress locations, so callers treat failures as
//! "no name" rather than errors.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;

const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Coordinates are cached at roughly 11 m resolution.
const CACHE_SCALE: f64 = 10_000.0;

/// Place names are looked up again after a day.
const CACHE_TTL_HOURS: i64 = 24;

/// Upper bound on cached coordinates.
const MAX_CACHED_PLACES: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geocoding service returned status {0}")]
    Status(String),
}

/// Reverse-geocoding lookup.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Name of the place at `(lat, lng)`, or `None` when there is none.
    async fn place_name(&self, lat: f64, lng: f64) -> Result<Option<String>, GeocodeError>;
}

/// Geocoder used when no maps API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGeocoder;

#[async_trait]
impl Geocoder for NoopGeocoder {
    async fn place_name(&self, _lat: f64, _lng: f64) -> Result<Option<String>, GeocodeError> {
        Ok(None)
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    formatted_address: String,
}

#[derive(Clone)]
struct CachedPlace {
    name: Option<String>,
    expires_at: DateTime<Utc>,
}

/// Google Geocoding API client, restricted to political results (towns,
/// regions, countries) and cached per coordinate.
pub struct GoogleGeocoder {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    cache: Arc<DashMap<(i64, i64), CachedPlace>>,
    capacity: usize,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, GOOGLE_GEOCODE_URL)
    }

    /// Client for a Geocoding API compatible endpoint at `base_url`.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            cache: Arc::new(DashMap::new()),
            capacity: MAX_CACHED_PLACES,
        }
    }

    fn cached(&self, key: &(i64, i64)) -> Option<Option<String>> {
        let entry = self.cache.get(key)?;
        if entry.expires_at > Utc::now() {
            Some(entry.name.clone())
        } else {
            None
        }
    }

    /// Cache `name`. A full cache first drops expired entries, and is emptied
    /// if that does not make room.
    fn remember(&self, key: (i64, i64), name: Option<String>) {
        let now = Utc::now();
        if self.cache.len() >= self.capacity && !self.cache.contains_key(&key) {
            self.cache.retain(|_, place| place.expires_at > now);
            if self.cache.len() >= self.capacity {
                tracing::debug!(entries = self.cache.len(), "Geocoding cache full, clearing");
                self.cache.clear();
            }
        }
        self.cache.insert(
            key,
            CachedPlace {
                name,
                expires_at: now + Duration::hours(CACHE_TTL_HOURS),
            },
        );
    }

    fn cache_key(lat: f64, lng: f64) -> (i64, i64) {
        (
            (lat * CACHE_SCALE).round() as i64,
            (lng * CACHE_SCALE).round() as i64,
        )
    }

    async fn lookup(&self, lat: f64, lng: f64) -> Result<Option<String>, GeocodeError> {
        let latlng = format!("{lat},{lng}");
        let response: GeocodeResponse = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latlng", latlng.as_str()),
                ("result_type", "political"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.status.as_str() {
            "OK" => Ok(response
                .results
                .into_iter()
                .next()
                .map(|r| r.formatted_address)),
            "ZERO_RESULTS" => Ok(None),
            other => {
                tracing::warn!(
                    status = other,
                    message = ?response.error_message,
                    "Geocoding API error"
                );
                Err(GeocodeError::Status(other.to_string()))
            }
        }
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn place_name(&self, lat: f64, lng: f64) -> Result<Option<String>, GeocodeError> {
        let key = Self::cache_key(lat, lng);
        if let Some(name) = self.cached(&key) {
            return Ok(name);
        }

        let name = self.lookup(lat, lng).await?;
        self.remember(key, name.clone());
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, extract::State, routing::get, Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serve a fake Geocoding API on a local port. The answer depends on the
    /// latitude: 10.5 has a name, 20.5 has none, anything else is denied.
    async fn fake_geocoding_api(hits: Arc<AtomicUsize>) -> String {
        async fn geocode(
            State(hits): State<Arc<AtomicUsize>>,
            Query(params): Query<HashMap<String, String>>,
        ) -> Json<Value> {
            hits.fetch_add(1, Ordering::SeqCst);
            let lat = params
                .get("latlng")
                .and_then(|l| l.split(',').next())
                .unwrap_or_default()
                .to_string();
            Json(match lat.as_str() {
                "10.5" => json!({
                    "status": "OK",
                    "results": [{"formatted_address": "Somewhere"}]
                }),
                "20.5" => json!({"status": "ZERO_RESULTS", "results": []}),
                _ => json!({"status": "REQUEST_DENIED", "error_message": "bad key"}),
            })
        }

        let app = Router::new().route("/geocode", get(geocode)).with_state(hits);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/geocode")
    }

    #[tokio::test]
    async fn test_google_geocoder_statuses_and_cache() {
        let hits = Arc::new(AtomicUsize::new(0));
        let geocoder = GoogleGeocoder::with_base_url("key", fake_geocoding_api(hits.clone()).await);

        assert_eq!(
            geocoder.place_name(10.5, 0.5).await.unwrap().as_deref(),
            Some("Somewhere")
        );
        assert_eq!(
            geocoder.place_name(10.5, 0.5).await.unwrap().as_deref(),
            Some("Somewhere")
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(geocoder.place_name(20.5, 0.5).await.unwrap(), None);

        let err = geocoder.place_name(30.5, 0.5).await.unwrap_err();
        assert!(matches!(err, GeocodeError::Status(ref s) if s == "REQUEST_DENIED"));
        // Failures are not cached.
        geocoder.place_name(30.5, 0.5).await.unwrap_err();
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_cache_is_bounded() {
        let mut geocoder = GoogleGeocoder::new("key");
        geocoder.capacity = 2;

        geocoder.remember((1, 1), Some("a".to_string()));
        geocoder.remember((2, 2), Some("b".to_string()));
        geocoder.remember((3, 3), Some("c".to_string()));
        assert_eq!(geocoder.cache.len(), 1);
        assert_eq!(geocoder.cached(&(3, 3)), Some(Some("c".to_string())));
        assert_eq!(geocoder.cached(&(1, 1)), None);
    }

    #[test]
    fn test_expired_entries_are_ignored() {
        let geocoder = GoogleGeocoder::new("key");
        geocoder.cache.insert(
            (1, 1),
            CachedPlace {
                name: Some("stale".to_string()),
                expires_at: Utc::now() - Duration::seconds(1),
            },
        );
        assert_eq!(geocoder.cached(&(1, 1)), None);
    }

    #[tokio::test]
    async fn test_noop_geocoder_has_no_names() {
        assert_eq!(NoopGeocoder.place_name(37.4, -122.1).await.unwrap(), None);
    }

    #[test]
    fn test_cache_key_rounds_nearby_points_together() {
        assert_eq!(
            GoogleGeocoder::cache_key(37.400001, -122.100001),
            GoogleGeocoder::cache_key(37.4, -122.1)
        );
        assert_ne!(
            GoogleGeocoder::cache_key(37.401, -122.1),
            GoogleGeocoder::cache_key(37.4, -122.1)
        );
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"status":"OK","results":[{"formatted_address":"Palo Alto, CA, USA","types":["locality"]}]}"#;
        let parsed: GeocodeResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, "OK");
        assert_eq!(parsed.results[0].formatted_address, "Palo Alto, CA, USA");
    }
}
