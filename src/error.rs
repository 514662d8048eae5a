//! Unified error handling for the trip tracker.
//!
//! Internal steps return [`Result`] and propagate with `?`. The public tracker
//! operations never surface these errors directly: they degrade to a safe default
//! and keep the message for the UI (see `TripTracker::error_message`).

use std::fmt;
use thiserror::Error;

/// Which location permission was being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionScope {
    Foreground,
    Background,
}

impl fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionScope::Foreground => write!(f, "foreground"),
            PermissionScope::Background => write!(f, "background"),
        }
    }
}

/// Error type for tracker operations.
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// The user (or the platform) refused a location permission
    #[error("Permission to access {scope} location was denied")]
    PermissionDenied { scope: PermissionScope },

    /// The platform location subscription could not be registered or removed
    #[error("Location subscription failed: {0}")]
    Subscription(String),

    /// The map-matching endpoint answered with a non-2xx status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport-level failure (connect, timeout, body download)
    #[error("Request error: {0}")]
    Request(String),

    /// The response body was not the expected JSON
    #[error("JSON parse error: {0}")]
    Decode(String),

    /// Too few coordinate pairs to ask for a matching
    #[error("{pairs} coordinate pair(s) collected, at least 2 required")]
    InsufficientCoordinates { pairs: usize },

    /// The tracker was torn down while a request was in flight
    #[error("Operation cancelled")]
    Cancelled,

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TrackerError {
    /// True for errors caused by a permission refusal.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, TrackerError::PermissionDenied { .. })
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        TrackerError::Decode(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TrackerError>;
