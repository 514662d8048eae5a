//! Test doubles for the platform location service and the route matcher.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use trip_tracker::{
    LocationOptions, LocationProvider, LocationSink, PermissionStatus, Result, RouteMatcher,
    Sample, TrackerError, TripResult,
};

/// Platform stand-in: records subscriptions and exposes the sink to the test.
pub struct FakePlatform {
    pub foreground: Mutex<Result<PermissionStatus>>,
    pub background: Mutex<Result<PermissionStatus>>,
    pub fail_subscribe: Mutex<bool>,
    pub subscribes: AtomicU32,
    pub unsubscribes: AtomicU32,
    pub foreground_requests: AtomicU32,
    pub background_requests: AtomicU32,
    /// Whether a subscription is currently registered
    pub subscribed: AtomicBool,
    /// When set, `unsubscribe` waits for a notification before completing
    pub unsubscribe_gate: Option<Arc<Notify>>,
    pub unsubscribes_started: AtomicU32,
    pub options: Mutex<Option<LocationOptions>>,
    pub sink: Mutex<Option<LocationSink>>,
    pub last_known: Mutex<Option<Sample>>,
}

impl FakePlatform {
    pub fn granted() -> Self {
        Self {
            foreground: Mutex::new(Ok(PermissionStatus::Granted)),
            background: Mutex::new(Ok(PermissionStatus::Granted)),
            fail_subscribe: Mutex::new(false),
            subscribes: AtomicU32::new(0),
            unsubscribes: AtomicU32::new(0),
            foreground_requests: AtomicU32::new(0),
            background_requests: AtomicU32::new(0),
            subscribed: AtomicBool::new(false),
            unsubscribe_gate: None,
            unsubscribes_started: AtomicU32::new(0),
            options: Mutex::new(None),
            sink: Mutex::new(None),
            last_known: Mutex::new(None),
        }
    }

    pub fn with_foreground(self, status: Result<PermissionStatus>) -> Self {
        *self.foreground.lock().unwrap() = status;
        self
    }

    pub fn with_background(self, status: Result<PermissionStatus>) -> Self {
        *self.background.lock().unwrap() = status;
        self
    }

    pub fn failing_subscribe(self) -> Self {
        *self.fail_subscribe.lock().unwrap() = true;
        self
    }

    /// Platform whose `unsubscribe` blocks until `gate` is notified.
    pub fn slow_unsubscribe(mut self, gate: Arc<Notify>) -> Self {
        self.unsubscribe_gate = Some(gate);
        self
    }

    pub fn sink(&self) -> LocationSink {
        self.sink.lock().unwrap().clone().expect("not subscribed")
    }

    /// Deliver one batch through the currently registered sink.
    pub fn deliver(&self, batch: Vec<Sample>) {
        self.sink().on_location_batch(batch);
    }

    pub fn subscribe_count(&self) -> u32 {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_count(&self) -> u32 {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn prompt_count(&self) -> u32 {
        self.foreground_requests.load(Ordering::SeqCst)
            + self.background_requests.load(Ordering::SeqCst)
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationProvider for FakePlatform {
    async fn foreground_permission(&self) -> Result<PermissionStatus> {
        self.foreground.lock().unwrap().clone()
    }

    async fn request_foreground_permission(&self) -> Result<PermissionStatus> {
        self.foreground_requests.fetch_add(1, Ordering::SeqCst);
        self.foreground.lock().unwrap().clone()
    }

    async fn request_background_permission(&self) -> Result<PermissionStatus> {
        self.background_requests.fetch_add(1, Ordering::SeqCst);
        self.background.lock().unwrap().clone()
    }

    async fn subscribe(&self, options: LocationOptions, sink: LocationSink) -> Result<()> {
        if *self.fail_subscribe.lock().unwrap() {
            return Err(TrackerError::Subscription("location services disabled".to_string()));
        }
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        *self.options.lock().unwrap() = Some(options);
        *self.sink.lock().unwrap() = Some(sink);
        self.subscribed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.unsubscribes_started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.unsubscribe_gate {
            gate.notified().await;
        }
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.subscribed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn last_known_position(&self) -> Result<Option<Sample>> {
        Ok(*self.last_known.lock().unwrap())
    }
}

/// How the fake matcher answers.
#[derive(Clone)]
pub enum Reply {
    Result(TripResult),
    Error(TrackerError),
    /// Never completes; used to exercise cancellation
    Hang,
}

pub struct FakeMatcher {
    pub reply: Mutex<Reply>,
    pub calls: AtomicU32,
    pub requests: Mutex<Vec<String>>,
}

impl FakeMatcher {
    pub fn replying(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<String> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl RouteMatcher for FakeMatcher {
    async fn match_route(&self, coordinates: &str) -> Result<TripResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(coordinates.to_string());
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Result(result) => Ok(result),
            Reply::Error(e) => Err(e),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Single fix at the given position.
pub fn fix(latitude: f64, longitude: f64, speed: f64) -> Sample {
    Sample::new(latitude, longitude).with_speed(speed)
}

/// `n` slow fixes at one spot.
pub fn parked(n: usize) -> Vec<Sample> {
    (0..n).map(|_| fix(51.5200, -0.1000, 0.2)).collect()
}
