//! # Trip Tracker
//!
//! Live trip tracking for mileage and expense logging.
//!
//! This library provides:
//! - A tracking session fed by platform location batches
//! - Stationary detection with automatic trip stop
//! - Trip distance and route geometry from a map-matching API
//!
//! ## Features
//!
//! - **`http`** (default) - Enable the Mapbox-compatible map-matching client
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trip_tracker::{Sample, Session, TrackerConfig};
//! use tokio::time::{Duration, Instant};
//!
//! let config = TrackerConfig::default();
//! let start = Instant::now();
//! let mut session = Session::new(&config, start);
//!
//! session.ingest(&[Sample::new(51.5074, -0.1278).with_speed(12.0)], start, &config);
//! session.ingest(
//!     &[Sample::new(51.5174, -0.1278).with_speed(11.0)],
//!     start + Duration::from_secs(60),
//!     &config,
//! );
//!
//! assert_eq!(session.buffer().pair_count(), 2);
//! assert!(session.live_distance_m() > 1000.0);
//! assert!(!session.auto_stop_requested());
//! ```
//!
//! The [`TripTracker`] ties a [`LocationProvider`] (the platform) and a
//! [`RouteMatcher`] (the map-matching service) to a session, runs the
//! auto-stop monitor, and turns every failure into a safe default.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod error;
pub use error::{PermissionScope, Result, TrackerError};

pub mod geo_utils;

pub mod stationary;
pub use stationary::{is_stationary, StationaryState};

pub mod buffer;
pub use buffer::{encode_coordinates, CoordinateBuffer};

pub mod session;
pub use session::Session;

pub mod location;
pub use location::{Accuracy, LocationOptions, LocationProvider, LocationSink, PermissionStatus};

pub mod matching;
pub use matching::{get_trip_distance, parse_matching_response, RouteMatcher};

pub mod tracker;
pub use tracker::{SessionSnapshot, TripTracker};

// HTTP module for map matching
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{MapboxMatcher, MatchingConfig};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("TripTrackerRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// One location fix reported by the platform.
///
/// # Example
/// ```
/// use trip_tracker::Sample;
/// let fix = Sample::new(51.5074, -0.1278).with_speed(13.4).at(1_700_000_000_000);
/// assert!(fix.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Sample {
    pub latitude: f64,
    pub longitude: f64,
    /// Instantaneous speed in m/s, if the platform reported one
    pub speed: Option<f64>,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl Sample {
    /// Create a sample with no speed and a zero timestamp.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            speed: None,
            timestamp: 0,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Check if the sample has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

const METERS_PER_MILE: f64 = 1609.344;

/// Outcome of a finished trip: matched distance and route geometry.
///
/// `TripResult::default()` (zero distance, no geometry) is what every failed or
/// empty trip resolves to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripResult {
    /// Matched route length in meters
    pub distance_meters: f64,
    /// GeoJSON geometry exactly as returned by the matching service
    pub geometry: Option<serde_json::Value>,
}

impl TripResult {
    pub fn new(distance_meters: f64, geometry: Option<serde_json::Value>) -> Self {
        Self { distance_meters, geometry }
    }

    /// True for the zeroed result.
    pub fn is_empty(&self) -> bool {
        self.distance_meters == 0.0 && self.geometry.is_none()
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }

    pub fn distance_miles(&self) -> f64 {
        self.distance_meters / METERS_PER_MILE
    }

    /// Convert a GeoJSON `LineString` geometry into a [`geo::LineString`].
    ///
    /// Returns `None` when there is no geometry, it is not a LineString,
    /// or a position is malformed.
    pub fn line_string(&self) -> Option<geo::LineString<f64>> {
        let geometry = self.geometry.as_ref()?;
        if geometry.get("type")?.as_str()? != "LineString" {
            return None;
        }

        let coords = geometry
            .get("coordinates")?
            .as_array()?
            .iter()
            .map(|position| {
                let pair = position.as_array()?;
                Some(geo::Coord {
                    x: pair.first()?.as_f64()?,
                    y: pair.get(1)?.as_f64()?,
                })
            })
            .collect::<Option<Vec<_>>>()?;

        Some(geo::LineString::new(coords))
    }
}

/// Configuration for a tracking session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TrackerConfig {
    /// Accuracy requested from the platform location service.
    /// Default: Balanced
    pub accuracy: Accuracy,

    /// Minimum time between platform location updates.
    /// Default: 5000 ms
    pub time_interval_ms: u64,

    /// Minimum distance between platform location updates.
    /// Default: 1000.0 meters (coarse; keeps battery use low on long drives)
    pub distance_interval_m: f64,

    /// Maximum length of the serialized coordinate buffer, in characters.
    /// Bounded by the matching API's URL length. Default: 500
    pub coordinate_buffer_cap: u32,

    /// Number of most recent samples averaged for stationary detection.
    /// Default: 5
    pub stationary_window: u32,

    /// Mean speed (m/s) below which the window counts as stationary.
    /// Default: 1.0
    pub speed_threshold: f64,

    /// Interval between stationary checks.
    /// Default: 10000 ms
    pub check_interval_ms: u64,

    /// Consecutive stationary checks before auto-stop is requested.
    /// Default: 3
    pub stationary_checks_to_stop: u32,

    /// Polling interval of the auto-stop monitor.
    /// Default: 10000 ms
    pub monitor_interval_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            accuracy: Accuracy::Balanced,
            time_interval_ms: 5_000,
            distance_interval_m: 1_000.0,
            coordinate_buffer_cap: 500,
            stationary_window: 5,
            speed_threshold: 1.0,
            check_interval_ms: 10_000,
            stationary_checks_to_stop: 3,
            monitor_interval_ms: 10_000,
        }
    }
}

impl TrackerConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        // A zero period would make tokio's interval panic
        Duration::from_millis(self.monitor_interval_ms.max(1))
    }

    /// Subscription options handed to the platform.
    pub fn location_options(&self) -> LocationOptions {
        LocationOptions {
            accuracy: self.accuracy,
            time_interval_ms: self.time_interval_ms,
            distance_interval_m: self.distance_interval_m,
        }
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{debug, info};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Trip result flattened for Kotlin/Swift (geometry as a JSON string).
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiTripResult {
        pub distance_meters: f64,
        pub geometry_json: Option<String>,
    }

    impl From<TripResult> for FfiTripResult {
        fn from(result: TripResult) -> Self {
            Self {
                distance_meters: result.distance_meters,
                geometry_json: result.geometry.map(|g| g.to_string()),
            }
        }
    }

    /// Get default tracker configuration.
    #[uniffi::export]
    pub fn default_tracker_config() -> TrackerConfig {
        init_logging();
        TrackerConfig::default()
    }

    /// Stationary check over a sample list, using the window and threshold from config.
    #[uniffi::export]
    pub fn ffi_is_stationary(samples: Vec<Sample>, config: TrackerConfig) -> bool {
        init_logging();
        is_stationary(
            &samples,
            config.stationary_window as usize,
            config.speed_threshold,
        )
    }

    /// Session driven from the mobile side, for shells that own the location
    /// subscription and timers themselves.
    #[derive(uniffi::Object)]
    pub struct TrackingSession {
        config: TrackerConfig,
        session: Mutex<Session>,
    }

    #[uniffi::export]
    impl TrackingSession {
        #[uniffi::constructor]
        pub fn new(config: TrackerConfig) -> Arc<Self> {
            init_logging();
            info!("[TripTrackerRust] TrackingSession created");
            let session = Session::new(&config, Instant::now());
            Arc::new(Self {
                config,
                session: Mutex::new(session),
            })
        }

        /// Feed one platform location batch.
        pub fn ingest(&self, samples: Vec<Sample>) {
            let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            session.ingest(&samples, Instant::now(), &self.config);
            debug!(
                "[TripTrackerRust] Ingested {} samples (total {})",
                samples.len(),
                session.samples().len()
            );
        }

        pub fn auto_stop_requested(&self) -> bool {
            let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            session.auto_stop_requested()
        }

        pub fn live_distance_m(&self) -> f64 {
            let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            session.live_distance_m()
        }

        /// Coordinates to submit for matching (`lon,lat;...`, no trailing delimiter).
        pub fn route_coordinates(&self) -> String {
            let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            session.route_coordinates(self.config.coordinate_buffer_cap as usize)
        }
    }

    /// Synchronous map matching for FFI - runs the request on a private tokio runtime.
    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn ffi_trip_distance(coordinates: String, access_token: String) -> FfiTripResult {
        use tokio::runtime::Builder;

        init_logging();
        info!("[TripTrackerRust] ffi_trip_distance called ({} chars)", coordinates.len());

        let rt = match Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                log::warn!("Failed to create tokio runtime: {}", e);
                return TripResult::default().into();
            }
        };

        let config = MatchingConfig {
            access_token,
            ..MatchingConfig::default()
        };
        let matcher = match MapboxMatcher::new(config) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Failed to create matcher: {}", e);
                return TripResult::default().into();
            }
        };

        rt.block_on(matcher.trip_distance(&coordinates)).into()
    }
}

// ============================================================================
// Tests
// ============================================================================
