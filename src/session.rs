//! Tracking session state.
//!
//! A [`Session`] owns everything one trip accumulates: the raw samples, the
//! serialized coordinate buffer and the stationary counters. It has no clock of
//! its own; callers pass `now` so the cadence logic can be driven from tests.

use log::debug;
use tokio::time::Instant;

use crate::buffer::{encode_coordinates, CoordinateBuffer};
use crate::stationary::{is_stationary, StationaryState};
use crate::{geo_utils, Sample, TrackerConfig};

#[derive(Debug, Clone)]
pub struct Session {
    samples: Vec<Sample>,
    buffer: CoordinateBuffer,
    stationary: StationaryState,
    last_check: Instant,
}

impl Session {
    /// Start an empty session; the first stationary check is due one
    /// `check_interval` after `now`.
    pub fn new(config: &TrackerConfig, now: Instant) -> Self {
        Self {
            samples: Vec::new(),
            buffer: CoordinateBuffer::with_cap(config.coordinate_buffer_cap as usize),
            stationary: StationaryState::default(),
            last_check: now,
        }
    }

    /// Handle one batch of platform location updates.
    ///
    /// Every sample is kept, but only the first sample of the batch goes into
    /// the coordinate buffer. Stationarity is evaluated only when a full check
    /// interval has passed since the previous check; a batch arriving earlier
    /// clears the counter and the auto-stop flag.
    pub fn ingest(&mut self, batch: &[Sample], now: Instant, config: &TrackerConfig) {
        if batch.is_empty() {
            return;
        }

        self.samples.extend_from_slice(batch);
        self.buffer.push(&batch[0]);

        if now.saturating_duration_since(self.last_check) >= config.check_interval() {
            let stationary = is_stationary(
                &self.samples,
                config.stationary_window as usize,
                config.speed_threshold,
            );
            self.stationary
                .record_check(stationary, config.stationary_checks_to_stop);
            self.last_check = now;

            debug!(
                "[Session] Check: stationary={} consecutive={} auto_stop={} samples={}",
                stationary,
                self.stationary.consecutive,
                self.stationary.auto_stop,
                self.samples.len()
            );
        } else {
            self.stationary.clear();
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn buffer(&self) -> &CoordinateBuffer {
        &self.buffer
    }

    pub fn stationary(&self) -> StationaryState {
        self.stationary
    }

    pub fn auto_stop_requested(&self) -> bool {
        self.stationary.auto_stop
    }

    /// Haversine length of the raw samples, for live display.
    pub fn live_distance_m(&self) -> f64 {
        geo_utils::polyline_length(&self.samples)
    }

    /// Coordinates to submit for matching, without a trailing delimiter.
    ///
    /// If the buffer hit its cap, the whole sample sequence is re-encoded
    /// (down-sampled to fit `cap`) so the tail of a long trip is not dropped.
    pub fn route_coordinates(&self, cap: usize) -> String {
        if self.buffer.is_saturated() {
            debug!(
                "[Session] Buffer saturated, re-encoding {} samples",
                self.samples.len()
            );
            encode_coordinates(&self.samples, cap)
        } else {
            self.buffer.trimmed().to_string()
        }
    }
}
