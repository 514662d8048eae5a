//! # Geographic Utilities
//!
//! Distance helpers used for the live trip distance shown while tracking.
//! The matched distance returned at stop time comes from the map-matching
//! service; these functions only measure the raw samples.
//!
//! ## Example
//!
//! ```rust
//! use trip_tracker::{Sample, geo_utils};
//!
//! let track = vec![
//!     Sample::new(51.5074, -0.1278),  // London
//!     Sample::new(51.5080, -0.1290),
//!     Sample::new(51.5090, -0.1300),
//! ];
//!
//! let length = geo_utils::polyline_length(&track);
//! println!("Track length: {:.0}m", length);
//! ```
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees).

use geo::{Distance, Haversine, Point};

use crate::Sample;

/// Great-circle distance between two samples in meters.
///
/// ```rust
/// use trip_tracker::{Sample, geo_utils};
///
/// let london = Sample::new(51.5074, -0.1278);
/// let paris = Sample::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &Sample, p2: &Sample) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Total length of a sample track in meters.
///
/// Invalid samples (NaN or out-of-range coordinates) are skipped rather than
/// poisoning the sum. Empty or single-point tracks return 0.0.
pub fn polyline_length(points: &[Sample]) -> f64 {
    let mut valid = points.iter().filter(|p| p.is_valid());
    let Some(mut prev) = valid.next() else {
        return 0.0;
    };

    let mut total = 0.0;
    for curr in valid {
        total += haversine_distance(prev, curr);
        prev = curr;
    }
    total
}
