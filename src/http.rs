//! HTTP client for the Mapbox-compatible map-matching API.
//!
//! One request per finished trip:
//! `GET {base}/matching/v5/{profile}/{coordinates}?geometries=geojson&access_token={token}`.
//! There is no retry; a failed request resolves to the zeroed trip result in
//! [`MapboxMatcher::trip_distance`].

use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use std::time::{Duration, Instant};

use crate::buffer::count_pairs;
use crate::matching::{get_trip_distance, parse_matching_response, RouteMatcher};
use crate::{Result, TrackerError, TripResult};

const DEFAULT_BASE_URL: &str = "https://api.mapbox.com";
const DEFAULT_PROFILE: &str = "mapbox/driving";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Environment variables read by [`MatchingConfig::from_env`]
pub const ENV_ACCESS_TOKEN: &str = "MAPBOX_ACCESS_TOKEN";
pub const ENV_BASE_URL: &str = "MAPBOX_MATCHING_URL";
pub const ENV_PROFILE: &str = "MAPBOX_MATCHING_PROFILE";

/// Configuration for the map-matching client.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Scheme and host of the API, no trailing slash.
    /// Default: https://api.mapbox.com
    pub base_url: String,
    /// Routing profile path segment.
    /// Default: mapbox/driving
    pub profile: String,
    /// Map provider access token
    pub access_token: String,
    /// Whole-request timeout.
    /// Default: 30000 ms
    pub timeout_ms: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            access_token: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl MatchingConfig {
    /// Build a config from the environment. The access token is required.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let access_token = lookup(ENV_ACCESS_TOKEN)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| TrackerError::Config(format!("{} is not set", ENV_ACCESS_TOKEN)))?;

        let mut config = Self {
            access_token,
            ..Self::default()
        };
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(profile) = lookup(ENV_PROFILE) {
            config.profile = profile;
        }
        Ok(config)
    }
}

/// Map-matching client backed by a pooled `reqwest` client.
pub struct MapboxMatcher {
    client: Client,
    config: MatchingConfig,
}

impl MapboxMatcher {
    /// Create a matcher; fails only if the HTTP client cannot be built.
    pub fn new(config: MatchingConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| TrackerError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Full request URL for a coordinate list.
    pub fn matching_url(&self, coordinates: &str) -> String {
        format!(
            "{}/matching/v5/{}/{}?geometries=geojson&access_token={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coordinates,
            self.config.access_token
        )
    }

    /// Match and return the trip result; any failure gives the zeroed result.
    pub async fn trip_distance(&self, coordinates: &str) -> TripResult {
        get_trip_distance(self, coordinates).await
    }
}

#[async_trait]
impl RouteMatcher for MapboxMatcher {
    async fn match_route(&self, coordinates: &str) -> Result<TripResult> {
        let req_start = Instant::now();
        let response = self
            .client
            .get(self.matching_url(coordinates))
            .send()
            .await
            .map_err(|e| TrackerError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect::<String>();
            warn!(
                "[MapMatcher] HTTP {} after {:?} for {} pairs",
                status,
                req_start.elapsed(),
                count_pairs(coordinates)
            );
            return Err(TrackerError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TrackerError::Request(format!("Body download error: {}", e)))?;
        let result = parse_matching_response(&bytes)?;

        info!(
            "[MapMatcher] {} pairs -> {:.0}m in {:?} ({:.1}KB)",
            count_pairs(coordinates),
            result.distance_meters,
            req_start.elapsed(),
            bytes.len() as f64 / 1024.0
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_matching_url_layout() {
        let matcher = MapboxMatcher::new(MatchingConfig {
            access_token: "pk.test".to_string(),
            ..MatchingConfig::default()
        })
        .unwrap();

        assert_eq!(
            matcher.matching_url("-0.1278,51.5074;-0.129,51.508"),
            "https://api.mapbox.com/matching/v5/mapbox/driving/-0.1278,51.5074;-0.129,51.508?geometries=geojson&access_token=pk.test"
        );
    }

    #[test]
    fn test_from_env_requires_token() {
        let err = MatchingConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));

        let err = MatchingConfig::from_lookup(lookup(&[(ENV_ACCESS_TOKEN, "  ")])).unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
    }

    #[test]
    fn test_from_env_overrides() {
        let config = MatchingConfig::from_lookup(lookup(&[
            (ENV_ACCESS_TOKEN, "pk.abc"),
            (ENV_BASE_URL, "http://localhost:8080/"),
            (ENV_PROFILE, "mapbox/cycling"),
        ]))
        .unwrap();

        assert_eq!(config.access_token, "pk.abc");
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.profile, "mapbox/cycling");
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }
}
