//! Platform location service seam.
//!
//! The mobile shell implements [`LocationProvider`] on top of the OS location
//! APIs. The tracker hands it a [`LocationSink`] when subscribing; the platform
//! calls [`LocationSink::on_location_batch`] from whatever thread its updates
//! arrive on.

use async_trait::async_trait;
use log::debug;
use std::sync::Weak;

use crate::tracker::Shared;
use crate::{Result, Sample};

/// Accuracy level requested from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Accuracy {
    Lowest,
    Low,
    #[default]
    Balanced,
    High,
    Highest,
    BestForNavigation,
}

/// Options for a recurring location subscription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationOptions {
    pub accuracy: Accuracy,
    /// Minimum time between updates in milliseconds
    pub time_interval_ms: u64,
    /// Minimum distance between updates in meters
    pub distance_interval_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }
}

/// Capabilities the tracker needs from the platform location service.
#[async_trait]
pub trait LocationProvider: Send + Sync + 'static {
    /// Current while-in-use access, without prompting the user.
    async fn foreground_permission(&self) -> Result<PermissionStatus>;

    /// Ask for while-in-use location access.
    async fn request_foreground_permission(&self) -> Result<PermissionStatus>;

    /// Ask for background location access. Only called after foreground was granted.
    async fn request_background_permission(&self) -> Result<PermissionStatus>;

    /// Register a recurring background location subscription delivering to `sink`.
    async fn subscribe(&self, options: LocationOptions, sink: LocationSink) -> Result<()>;

    /// Remove the subscription registered by [`subscribe`](Self::subscribe).
    ///
    /// The tracker never overlaps this with a `subscribe` call.
    async fn unsubscribe(&self) -> Result<()>;

    /// Most recent fix known to the platform, if any.
    async fn last_known_position(&self) -> Result<Option<Sample>> {
        Ok(None)
    }
}

/// Handle the platform calls with each batch of new samples.
///
/// A sink is bound to the session it was created for. Batches delivered after
/// that session stopped (late callbacks racing the unsubscribe) are dropped.
#[derive(Clone)]
pub struct LocationSink {
    shared: Weak<Shared>,
    generation: u64,
}

impl LocationSink {
    pub(crate) fn new(shared: Weak<Shared>, generation: u64) -> Self {
        Self { shared, generation }
    }

    /// Deliver one batch of location samples.
    pub fn on_location_batch(&self, samples: Vec<Sample>) {
        match self.shared.upgrade() {
            Some(shared) => shared.ingest(self.generation, &samples),
            None => debug!("[LocationSink] Tracker dropped, discarding {} samples", samples.len()),
        }
    }

    /// Session generation this sink delivers to.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for LocationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationSink")
            .field("generation", &self.generation)
            .finish()
    }
}
