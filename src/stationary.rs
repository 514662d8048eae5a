//! Stationary detection.
//!
//! A trip is considered stationary when the mean speed over the most recent
//! window of samples falls below a threshold. Consecutive stationary checks are
//! counted; once enough accumulate the auto-stop flag is raised.

use crate::Sample;

/// Returns true if the last `window` samples average below `speed_threshold`.
///
/// Fewer than `window` samples is treated as insufficient evidence (not stationary).
/// Missing speed readings count as 0.
///
/// # Example
/// ```
/// use trip_tracker::{Sample, is_stationary};
///
/// let parked: Vec<Sample> = (0..5)
///     .map(|i| Sample::new(51.5074, -0.1278).with_speed(0.2).at(i * 1000))
///     .collect();
/// assert!(is_stationary(&parked, 5, 1.0));
/// assert!(!is_stationary(&parked[..4], 5, 1.0));
/// ```
pub fn is_stationary(samples: &[Sample], window: usize, speed_threshold: f64) -> bool {
    if window == 0 || samples.len() < window {
        return false;
    }

    let recent = &samples[samples.len() - window..];
    let mean_speed = recent
        .iter()
        .map(|s| s.speed.unwrap_or(0.0))
        .sum::<f64>()
        / window as f64;

    mean_speed < speed_threshold
}

/// Consecutive-stationary counter plus the auto-stop flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StationaryState {
    /// Number of consecutive checks that found the trip stationary
    pub consecutive: u32,
    /// Set once `consecutive` reaches the configured limit
    pub auto_stop: bool,
}

impl StationaryState {
    /// Record the outcome of one stationarity check.
    ///
    /// A stationary check increments the counter and raises `auto_stop` when
    /// the counter reaches `limit`. A moving check resets both.
    pub fn record_check(&mut self, stationary: bool, limit: u32) {
        if stationary {
            self.consecutive = self.consecutive.saturating_add(1);
            if self.consecutive >= limit {
                self.auto_stop = true;
            }
        } else {
            self.clear();
        }
    }

    pub fn clear(&mut self) {
        self.consecutive = 0;
        self.auto_stop = false;
    }
}
