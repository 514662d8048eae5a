//! Serialized coordinate buffer for the map-matching request.
//!
//! The matching API takes coordinates in the URL path as `lon,lat;lon,lat;...`,
//! so the buffer is built incrementally as a string and capped to keep the
//! request URL within the provider's practical length limit.

use std::fmt::Write;

use crate::Sample;

/// Separator between coordinate pairs.
pub const PAIR_DELIMITER: char = ';';

/// Incrementally built `lon,lat;` string with a length cap.
#[derive(Debug, Clone)]
pub struct CoordinateBuffer {
    encoded: String,
    cap: usize,
    saturated: bool,
}

impl CoordinateBuffer {
    /// Create an empty buffer that stops growing once it reaches `cap` characters.
    pub fn with_cap(cap: usize) -> Self {
        Self {
            encoded: String::with_capacity(cap + 48),
            cap,
            saturated: false,
        }
    }

    /// Append a sample as `"{lon},{lat};"` if the buffer is still below the cap.
    ///
    /// The last accepted pair may push the length past the cap; the check is made
    /// before appending. Returns false if the sample was not appended.
    pub fn push(&mut self, sample: &Sample) -> bool {
        if !sample.is_valid() {
            return false;
        }
        if self.encoded.len() >= self.cap {
            self.saturated = true;
            return false;
        }
        write_pair(&mut self.encoded, sample);
        self.encoded.push(PAIR_DELIMITER);
        true
    }

    /// Raw buffer contents, including the trailing delimiter.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Buffer contents with the trailing delimiter removed.
    pub fn trimmed(&self) -> &str {
        self.encoded
            .strip_suffix(PAIR_DELIMITER)
            .unwrap_or(&self.encoded)
    }

    pub fn pair_count(&self) -> usize {
        count_pairs(&self.encoded)
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    /// True once a sample has been refused because the cap was reached.
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn clear(&mut self) {
        self.encoded.clear();
        self.saturated = false;
    }
}

/// Count `lon,lat` pairs in an encoded coordinate string.
pub fn count_pairs(encoded: &str) -> usize {
    encoded
        .split(PAIR_DELIMITER)
        .filter(|pair| !pair.trim().is_empty())
        .count()
}

/// Encode a whole sample sequence as `lon,lat;...;lon,lat` within `cap` characters.
///
/// Invalid samples are skipped. If the full sequence does not fit, it is
/// down-sampled uniformly; the first and last samples are always kept, so the
/// matched route still spans the whole trip. With a cap too small for two pairs
/// the first and last pair are returned anyway.
///
/// # Example
/// ```
/// use trip_tracker::{Sample, encode_coordinates};
///
/// let trip: Vec<Sample> = (0..200)
///     .map(|i| Sample::new(51.5 + i as f64 * 0.001, -0.1278))
///     .collect();
///
/// let encoded = encode_coordinates(&trip, 500);
/// assert!(encoded.len() <= 500);
/// assert!(encoded.starts_with("-0.1278,51.5;"));
/// ```
pub fn encode_coordinates(samples: &[Sample], cap: usize) -> String {
    let valid: Vec<&Sample> = samples.iter().filter(|s| s.is_valid()).collect();
    if valid.is_empty() {
        return String::new();
    }

    let full = join_pairs(&valid);
    if full.len() <= cap || valid.len() <= 2 {
        return full;
    }

    // Start from an estimate based on the mean pair length, then shrink until it fits
    let mean_pair_len = (full.len() + 1) as f64 / valid.len() as f64;
    let mut target = ((cap + 1) as f64 / mean_pair_len).floor() as usize;
    target = target.clamp(2, valid.len());

    loop {
        let picked = uniform_pick(&valid, target);
        let encoded = join_pairs(&picked);
        if encoded.len() <= cap || target <= 2 {
            return encoded;
        }
        target -= 1;
    }
}

/// Pick `count` items spread evenly over `items`, always including both ends.
fn uniform_pick<'a>(items: &[&'a Sample], count: usize) -> Vec<&'a Sample> {
    let n = items.len();
    if count >= n {
        return items.to_vec();
    }
    if count <= 1 {
        return items.first().copied().into_iter().collect();
    }

    let step = (n - 1) as f64 / (count - 1) as f64;
    (0..count)
        .map(|i| items[((i as f64 * step).round() as usize).min(n - 1)])
        .collect()
}

fn join_pairs(samples: &[&Sample]) -> String {
    let mut out = String::new();
    for (i, sample) in samples.iter().enumerate() {
        if i > 0 {
            out.push(PAIR_DELIMITER);
        }
        write_pair(&mut out, sample);
    }
    out
}

fn write_pair(out: &mut String, sample: &Sample) {
    // Writing into a String cannot fail
    let _ = write!(out, "{},{}", sample.longitude, sample.latitude);
}
