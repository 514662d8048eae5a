//! Match a coordinate list against the live API and print the trip.
//! Run with: MAPBOX_ACCESS_TOKEN=pk... cargo run --example match_coordinates -- "-0.1278,51.5074;-0.13,51.509"

use trip_tracker::{MapboxMatcher, MatchingConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let coordinates = std::env::args()
        .nth(1)
        .ok_or("usage: match_coordinates <lon,lat;lon,lat;...>")?;

    let matcher = MapboxMatcher::new(MatchingConfig::from_env()?)?;
    let result = matcher.trip_distance(&coordinates).await;

    println!("Distance: {:.0}m ({:.2} mi)", result.distance_meters, result.distance_miles());
    match result.line_string() {
        Some(line) => println!("Geometry: {} points", line.0.len()),
        None => println!("Geometry: none"),
    }
    Ok(())
}
