//! Map-matching seam and response handling.
//!
//! A [`RouteMatcher`] snaps the collected coordinates onto the road network and
//! reports the matched distance and geometry. [`get_trip_distance`] is the
//! never-failing entry point the tracker uses.

use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;

use crate::buffer::count_pairs;
use crate::{Result, TripResult};

/// Service that turns a `lon,lat;lon,lat` coordinate list into a matched route.
#[async_trait]
pub trait RouteMatcher: Send + Sync + 'static {
    async fn match_route(&self, coordinates: &str) -> Result<TripResult>;
}

/// Matching API response (only the fields we read)
#[derive(Debug, Deserialize)]
struct MatchingResponse {
    matchings: Option<Vec<Matching>>,
}

#[derive(Debug, Deserialize)]
struct Matching {
    #[serde(default)]
    distance: f64,
    geometry: Option<serde_json::Value>,
}

/// Parse a matching response body.
///
/// The first matching supplies distance and geometry. A response without
/// matchings yields the zeroed result.
///
/// # Example
/// ```
/// use trip_tracker::parse_matching_response;
///
/// let body = br#"{"code":"Ok","matchings":[{"distance":1609.0,"geometry":{"type":"LineString","coordinates":[]}}]}"#;
/// let result = parse_matching_response(body).unwrap();
/// assert_eq!(result.distance_meters, 1609.0);
/// ```
pub fn parse_matching_response(body: &[u8]) -> Result<TripResult> {
    let response: MatchingResponse = serde_json::from_slice(body)?;

    let first = response.matchings.and_then(|m| m.into_iter().next());
    Ok(match first {
        Some(matching) => TripResult::new(matching.distance, matching.geometry),
        None => {
            debug!("[MapMatcher] Response contained no matchings");
            TripResult::default()
        }
    })
}

/// Match `coordinates` and return the trip result, never failing.
///
/// Empty input short-circuits without calling the matcher. Any error is
/// logged and turned into the zeroed result.
pub async fn get_trip_distance<M>(matcher: &M, coordinates: &str) -> TripResult
where
    M: RouteMatcher + ?Sized,
{
    if coordinates.trim().is_empty() {
        return TripResult::default();
    }

    match matcher.match_route(coordinates).await {
        Ok(result) => {
            debug!(
                "[MapMatcher] Matched {} pairs -> {:.0}m",
                count_pairs(coordinates),
                result.distance_meters
            );
            result
        }
        Err(e) => {
            warn!("[MapMatcher] Matching failed: {}", e);
            TripResult::default()
        }
    }
}
