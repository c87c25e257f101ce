use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use waypost_lib::location_fix::LocationFix;

/// Options handed to the sensor when a subscription is opened.
#[derive(Debug, Clone, Copy)]
pub struct SubscribeOptions {
    pub high_accuracy: bool,
    /// How long the sensor may take to acquire a single fix.
    pub timeout: Duration,
    /// Maximum age of a cached fix the sensor may serve. Zero forces fresh fixes.
    pub max_fix_age: Duration,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(15),
            max_fix_age: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorErrorKind {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    Unknown,
}

/// A classified sensor failure delivered through an active subscription.
#[derive(Debug, Clone)]
pub struct SensorError {
    pub kind: SensorErrorKind,
    pub detail: Option<String>,
}

impl SensorError {
    pub fn new(kind: SensorErrorKind) -> Self {
        Self { kind, detail: None }
    }

    /// Map a platform error code: 1 = permission denied, 2 = position
    /// unavailable, 3 = timeout, anything else unknown.
    pub fn from_code(code: u16) -> Self {
        let kind = match code {
            1 => SensorErrorKind::PermissionDenied,
            2 => SensorErrorKind::PositionUnavailable,
            3 => SensorErrorKind::Timeout,
            _ => SensorErrorKind::Unknown,
        };
        Self::new(kind)
    }

    pub fn user_message(&self) -> &'static str {
        match self.kind {
            SensorErrorKind::PermissionDenied => "Location permission denied",
            SensorErrorKind::PositionUnavailable => "Position unavailable",
            SensorErrorKind::Timeout => "Position request timed out",
            SensorErrorKind::Unknown => "Unknown positioning error",
        }
    }

    /// Permission denial is fatal for the session: further callbacks will
    /// uniformly fail and re-prompting is outside the controller's control.
    pub fn is_session_fatal(&self) -> bool {
        self.kind == SensorErrorKind::PermissionDenied
    }
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({detail})", self.user_message()),
            None => f.write_str(self.user_message()),
        }
    }
}

impl std::error::Error for SensorError {}

#[derive(Debug, Error)]
pub enum PositionError {
    /// The platform has no positioning capability at all.
    #[error("positioning is not supported on this device")]
    Unsupported,
    #[error("positioning sensor failed to start: {0}")]
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum PositionUpdate {
    Fix(LocationFix),
    Error(SensorError),
}

/// A live sensor registration delivering updates until cancelled.
///
/// The handle is the one resource requiring disposal discipline: `cancel`
/// (or drop) releases the sensor on every exit path.
pub struct PositionSubscription {
    updates: mpsc::Receiver<PositionUpdate>,
    active: Arc<AtomicBool>,
}

impl PositionSubscription {
    pub fn new(updates: mpsc::Receiver<PositionUpdate>, active: Arc<AtomicBool>) -> Self {
        Self { updates, active }
    }

    /// Next fix or sensor error. `None` once the sensor side shuts down.
    pub async fn next_update(&mut self) -> Option<PositionUpdate> {
        self.updates.recv().await
    }

    pub fn cancel(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.updates.close();
    }
}

impl Drop for PositionSubscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Open a continuous subscription delivering fixes and sensor errors.
    async fn subscribe(
        &self,
        options: SubscribeOptions,
    ) -> Result<PositionSubscription, PositionError>;

    /// One-shot position query.
    async fn current_position(&self, options: SubscribeOptions)
    -> Result<LocationFix, SensorError>;
}

/// Deterministic position source for demos: walks around a seed coordinate.
pub struct SimulatedPositionSource {
    latitude: f64,
    longitude: f64,
    interval: Duration,
    accuracy: f64,
}

impl SimulatedPositionSource {
    pub fn new(latitude: f64, longitude: f64, interval: Duration) -> Self {
        Self {
            latitude,
            longitude,
            interval,
            accuracy: 5.0,
        }
    }

    fn fix_at(&self, step: u64) -> LocationFix {
        let t = step as f64;
        LocationFix::new(
            self.latitude + 0.0001 * (t * 0.7).sin(),
            self.longitude + 0.0001 * (t * 0.4).cos(),
            Utc::now(),
        )
        .with_accuracy(self.accuracy)
    }
}

#[async_trait]
impl PositionSource for SimulatedPositionSource {
    async fn subscribe(
        &self,
        _options: SubscribeOptions,
    ) -> Result<PositionSubscription, PositionError> {
        let (tx, rx) = mpsc::channel(16);
        let active = Arc::new(AtomicBool::new(true));
        let flag = active.clone();
        let source = Self::new(self.latitude, self.longitude, self.interval);

        tokio::spawn(async move {
            let mut step = 0u64;
            while flag.load(Ordering::SeqCst) {
                tokio::time::sleep(source.interval).await;
                if tx.send(PositionUpdate::Fix(source.fix_at(step))).await.is_err() {
                    break;
                }
                step += 1;
            }
        });

        Ok(PositionSubscription::new(rx, active))
    }

    async fn current_position(
        &self,
        _options: SubscribeOptions,
    ) -> Result<LocationFix, SensorError> {
        Ok(self.fix_at(0))
    }
}
