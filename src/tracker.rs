//! Trip tracker: one live tracking session end to end.
//!
//! [`TripTracker`] is a cheap, cloneable handle. Platform callbacks (through
//! [`LocationSink`]), the auto-stop monitor task and explicit calls from the UI
//! all mutate the same session through a single mutex. The lock is never held
//! across an `.await`.
//!
//! Every public operation degrades to a safe value (`false`, the zeroed
//! [`TripResult`]) instead of returning an error. The last failure is kept for
//! the UI in [`TripTracker::error_message`].

use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::{Instant, MissedTickBehavior};

use crate::buffer::count_pairs;
use crate::error::PermissionScope;
use crate::location::{LocationProvider, LocationSink, PermissionStatus};
use crate::matching::{get_trip_distance, RouteMatcher};
use crate::{Sample, Session, TrackerConfig, TrackerError, TripResult};

/// Point-in-time view of the tracker state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub active: bool,
    /// Increments every time a session starts
    pub generation: u64,
    pub sample_count: usize,
    /// Serialized coordinate buffer, including the trailing delimiter
    pub buffered_coordinates: String,
    pub stationary_count: u32,
    pub auto_stop: bool,
}

struct TrackingState {
    active: bool,
    generation: u64,
    session: Session,
    error_message: Option<String>,
    last_result: Option<TripResult>,
}

/// State reachable from platform callbacks. Not generic, so sinks can hold it.
pub(crate) struct Shared {
    config: TrackerConfig,
    state: Mutex<TrackingState>,
}

enum MonitorPoll {
    Continue,
    AutoStop,
    SessionEnded,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TrackingState> {
        // Session state stays consistent even if a holder panicked mid-batch
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a platform batch to the session it was delivered for.
    pub(crate) fn ingest(&self, generation: u64, samples: &[Sample]) {
        let mut state = self.lock();
        if !state.active || state.generation != generation {
            debug!(
                "[TripTracker] Dropping {} samples for stale session {} (current {})",
                samples.len(),
                generation,
                state.generation
            );
            return;
        }

        state.session.ingest(samples, Instant::now(), &self.config);
        debug!(
            "[TripTracker] Batch of {}: {} samples, {} buffered pairs",
            samples.len(),
            state.session.samples().len(),
            state.session.buffer().pair_count()
        );
    }

    fn monitor_poll(&self, generation: u64) -> MonitorPoll {
        let state = self.lock();
        if !state.active || state.generation != generation {
            MonitorPoll::SessionEnded
        } else if state.session.auto_stop_requested() {
            MonitorPoll::AutoStop
        } else {
            MonitorPoll::Continue
        }
    }

    fn set_error(&self, message: String) {
        self.lock().error_message = Some(message);
    }
}

struct Inner<P, M> {
    provider: Arc<P>,
    matcher: Arc<M>,
    shared: Arc<Shared>,
    /// Held across subscribe and unsubscribe so the two never interleave
    subscription: AsyncMutex<()>,
    shutdown: watch::Sender<bool>,
}

/// Live trip tracker over a platform location provider and a route matcher.
pub struct TripTracker<P, M> {
    inner: Arc<Inner<P, M>>,
}

impl<P, M> Clone for TripTracker<P, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, M> TripTracker<P, M>
where
    P: LocationProvider,
    M: RouteMatcher,
{
    pub fn new(provider: Arc<P>, matcher: Arc<M>, config: TrackerConfig) -> Self {
        let session = Session::new(&config, Instant::now());
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                provider,
                matcher,
                shared: Arc::new(Shared {
                    config,
                    state: Mutex::new(TrackingState {
                        active: false,
                        generation: 0,
                        session,
                        error_message: None,
                        last_result: None,
                    }),
                }),
                subscription: AsyncMutex::new(()),
                shutdown,
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.shared.config
    }

    /// Request foreground, then background location permission.
    ///
    /// Background is only requested once foreground is granted. A denial, or
    /// an error from the platform, sets the error message and returns false.
    pub async fn request_tracking_permissions(&self) -> bool {
        let provider = &self.inner.provider;

        let foreground = provider
            .request_foreground_permission()
            .await
            .unwrap_or_else(|e| {
                warn!("[TripTracker] Foreground permission request failed: {}", e);
                PermissionStatus::Denied
            });
        if !foreground.is_granted() {
            return self.permission_denied(PermissionScope::Foreground);
        }

        let background = provider
            .request_background_permission()
            .await
            .unwrap_or_else(|e| {
                warn!("[TripTracker] Background permission request failed: {}", e);
                PermissionStatus::Denied
            });
        if !background.is_granted() {
            return self.permission_denied(PermissionScope::Background);
        }

        true
    }

    fn permission_denied(&self, scope: PermissionScope) -> bool {
        let err = TrackerError::PermissionDenied { scope };
        warn!("[TripTracker] {}", err);
        self.inner.shared.set_error(err.to_string());
        false
    }

    /// Start a tracking session.
    ///
    /// Prompts for permissions unless foreground access is already granted,
    /// subscribes to background location updates and starts the auto-stop
    /// monitor. Returns true once tracking is active. Calling this while a
    /// session is already active changes nothing. A start racing a stop waits
    /// until the old subscription has been removed.
    pub async fn start_tracking(&self) -> bool {
        if *self.inner.shutdown.borrow() {
            self.inner
                .shared
                .set_error("Tracker has been shut down".to_string());
            return false;
        }
        if self.is_tracking() {
            warn!("[TripTracker] start_tracking called while already tracking");
            return true;
        }
        if !self.has_foreground_permission().await && !self.request_tracking_permissions().await {
            return false;
        }

        let _subscription = self.inner.subscription.lock().await;
        let shared = &self.inner.shared;
        let generation = {
            let mut state = shared.lock();
            if state.active {
                None
            } else {
                state.generation += 1;
                state.active = true;
                state.session = Session::new(&shared.config, Instant::now());
                state.error_message = None;
                Some(state.generation)
            }
        };
        let Some(generation) = generation else {
            warn!("[TripTracker] Another start won the race, keeping that session");
            return true;
        };

        let options = shared.config.location_options();
        let sink = LocationSink::new(Arc::downgrade(shared), generation);

        if let Err(e) = self.inner.provider.subscribe(options, sink).await {
            warn!("[TripTracker] Failed to start location updates: {}", e);
            let mut state = shared.lock();
            if state.generation == generation {
                state.active = false;
                state.session = Session::new(&shared.config, Instant::now());
            }
            state.error_message = Some(e.to_string());
            return false;
        }

        info!(
            "[TripTracker] Tracking started (session {}, accuracy {:?}, every {}ms / {:.0}m)",
            generation, options.accuracy, options.time_interval_ms, options.distance_interval_m
        );
        self.spawn_monitor(generation);
        true
    }

    async fn has_foreground_permission(&self) -> bool {
        match self.inner.provider.foreground_permission().await {
            Ok(status) => status.is_granted(),
            Err(e) => {
                debug!("[TripTracker] Could not read foreground permission: {}", e);
                false
            }
        }
    }

    /// Poll the auto-stop flag until the session ends or the tracker shuts down.
    fn spawn_monitor(&self, generation: u64) {
        let weak: Weak<Inner<P, M>> = Arc::downgrade(&self.inner);
        let mut shutdown = self.inner.shutdown.subscribe();
        let period = self.inner.shared.config.monitor_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => {
                        debug!("[TripTracker] Monitor {} exiting on shutdown", generation);
                        break;
                    }
                }

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                match inner.shared.monitor_poll(generation) {
                    MonitorPoll::Continue => {}
                    MonitorPoll::SessionEnded => break,
                    MonitorPoll::AutoStop => {
                        info!("[TripTracker] Stationary, auto-stopping session {}", generation);
                        let result = TripTracker { inner }.stop_session(Some(generation)).await;
                        debug!(
                            "[TripTracker] Auto-stop finished with {:.0}m",
                            result.distance_meters
                        );
                        break;
                    }
                }
            }
        });
    }

    /// Stop tracking and compute the matched trip.
    ///
    /// Returns the zeroed result if no session is active, if fewer than two
    /// coordinate pairs were collected, or if matching fails or is cancelled.
    /// Session state is reset before the network call, so a concurrent second
    /// stop sees no active session and never submits the route twice.
    pub async fn stop_tracking(&self) -> TripResult {
        self.stop_session(None).await
    }

    /// Stop the active session, or only session `expected` when given.
    async fn stop_session(&self, expected: Option<u64>) -> TripResult {
        let shared = &self.inner.shared;
        let subscription = self.inner.subscription.lock().await;
        let finished = {
            let mut state = shared.lock();
            let matches = expected.map_or(true, |generation| generation == state.generation);
            if state.active && matches {
                state.active = false;
                let fresh = Session::new(&shared.config, Instant::now());
                Some((state.generation, std::mem::replace(&mut state.session, fresh)))
            } else {
                None
            }
        };
        let Some((generation, session)) = finished else {
            debug!("[TripTracker] stop_tracking with no active session");
            return TripResult::default();
        };

        if let Err(e) = self.inner.provider.unsubscribe().await {
            warn!("[TripTracker] Failed to stop location updates: {}", e);
        }
        drop(subscription);

        let coordinates = session.route_coordinates(shared.config.coordinate_buffer_cap as usize);
        let pairs = count_pairs(&coordinates);
        info!(
            "[TripTracker] Session {} stopped: {} samples, {} pairs, {:.0}m raw",
            generation,
            session.samples().len(),
            pairs,
            session.live_distance_m()
        );

        if pairs < 2 {
            debug!("[TripTracker] {}", TrackerError::InsufficientCoordinates { pairs });
            let result = TripResult::default();
            shared.lock().last_result = Some(result.clone());
            return result;
        }

        let mut shutdown = self.inner.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            warn!("[TripTracker] Tracker shut down, not matching session {}", generation);
            return TripResult::default();
        }

        let matched = tokio::select! {
            result = get_trip_distance(&*self.inner.matcher, &coordinates) => Some(result),
            _ = shutdown.changed() => None,
        };

        match matched {
            Some(result) => {
                info!(
                    "[TripTracker] Session {} matched: {:.0}m",
                    generation, result.distance_meters
                );
                shared.lock().last_result = Some(result.clone());
                result
            }
            None => {
                warn!("[TripTracker] {} while matching session {}", TrackerError::Cancelled, generation);
                TripResult::default()
            }
        }
    }

    /// Tear the tracker down.
    ///
    /// Cancels an in-flight map-matching request and stops the monitor. A
    /// cancelled stop does not record a result. After shutdown,
    /// `start_tracking` returns false.
    pub fn shutdown(&self) {
        info!("[TripTracker] Shutdown requested");
        self.inner.shutdown.send_replace(true);
    }

    pub fn is_tracking(&self) -> bool {
        self.inner.shared.lock().active
    }

    /// User-facing message for the last failure, if any.
    pub fn error_message(&self) -> Option<String> {
        self.inner.shared.lock().error_message.clone()
    }

    /// Result of the most recent completed stop.
    pub fn last_result(&self) -> Option<TripResult> {
        self.inner.shared.lock().last_result.clone()
    }

    /// Raw distance covered so far in the active session, in meters.
    pub fn live_distance_m(&self) -> f64 {
        self.inner.shared.lock().session.live_distance_m()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.shared.lock();
        let stationary = state.session.stationary();
        SessionSnapshot {
            active: state.active,
            generation: state.generation,
            sample_count: state.session.samples().len(),
            buffered_coordinates: state.session.buffer().as_str().to_string(),
            stationary_count: stationary.consecutive,
            auto_stop: stationary.auto_stop,
        }
    }

    /// Last known device position, or `None` if the platform has none or fails.
    pub async fn current_position(&self) -> Option<Sample> {
        match self.inner.provider.last_known_position().await {
            Ok(position) => position,
            Err(e) => {
                warn!("[TripTracker] Could not read last known position: {}", e);
                None
            }
        }
    }
}
