use std::future;
use std::sync::Arc;

use chrono::Local;
use tokio::sync::{broadcast, mpsc, watch};
use waypost_lib::location_fix::LocationFix;
use waypost_lib::log_entry::{LogEntry, LogKind};
use waypost_lib::report::{ReportPayload, ReportReceipt};

use crate::DISPLAY_LOG_CAPACITY;
use crate::journal::{BoundedLog, DebugJournal};
use crate::permission::{PermissionSource, PermissionState};
use crate::position::{
    PositionError, PositionSource, PositionSubscription, PositionUpdate, SubscribeOptions,
};
use crate::prefs::{PreferenceStore, Preferences};
use crate::report::{ReportError, Reporter};

const EVENT_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Idle,
    Tracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

/// State-change notifications for a rendering layer to subscribe to.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    StateChanged(TrackingState),
    Fix(LocationFix),
    Status { message: String, kind: StatusKind },
    Permission(PermissionState),
    Log(LogEntry),
    SessionCount(u64),
    ConfigSaved { backend_url: String, poll_interval_secs: u64 },
    LocationsCleared,
    DebugLogCleared,
}

/// User-facing actions, fed into [`TrackingController::drive`].
#[derive(Debug)]
pub enum Command {
    StartTracking,
    StopTracking,
    ClearLocations,
    ClearDebugLog,
    /// An empty URL or a zero interval leaves that field untouched.
    SaveConfig { backend_url: String, poll_interval_secs: u64 },
}

/// Outcome of one dispatched report, folded back into the control task.
#[derive(Debug)]
pub struct ReportResult {
    pub coordinates: String,
    pub outcome: Result<ReportReceipt, ReportError>,
}

/// Formatted display fields for a rendering surface.
#[derive(Debug, Clone)]
pub struct DisplaySnapshot {
    pub state: TrackingState,
    pub latitude: String,
    pub longitude: String,
    pub accuracy: String,
    pub last_update: String,
    pub status: String,
    pub status_kind: StatusKind,
    pub permission: &'static str,
    pub session_count: u64,
    pub location_count: usize,
    pub device_info: String,
    pub debug_lines: Vec<String>,
    pub recent_locations: Vec<String>,
}

enum Input {
    Command(Option<Command>),
    Update(Option<PositionUpdate>),
    Outcome(ReportResult),
    Permission(Option<PermissionState>),
}

/// The tracking lifecycle core: owns idle/tracking state, routes sensor
/// fixes and errors, keeps the rolling logs, and drives the reporter.
///
/// All mutation happens on the single task running [`drive`], so exactly
/// one callback is processed at a time.
///
/// [`drive`]: TrackingController::drive
pub struct TrackingController {
    source: Arc<dyn PositionSource>,
    reporter: Arc<dyn Reporter>,
    prefs_store: Arc<dyn PreferenceStore>,
    prefs: Preferences,

    subscription: Option<PositionSubscription>,
    last_fix: Option<LocationFix>,
    history: Vec<LocationFix>,
    recent: BoundedLog<LocationFix>,
    journal: DebugJournal,
    permission: PermissionState,
    permission_watch: Option<watch::Receiver<PermissionState>>,
    status: (String, StatusKind),

    events: broadcast::Sender<TrackerEvent>,
    outcome_tx: mpsc::UnboundedSender<ReportResult>,
    outcome_rx: mpsc::UnboundedReceiver<ReportResult>,
}

impl TrackingController {
    pub fn new(
        source: Arc<dyn PositionSource>,
        reporter: Arc<dyn Reporter>,
        prefs_store: Arc<dyn PreferenceStore>,
    ) -> Self {
        let prefs = match prefs_store.load() {
            Ok(prefs) => prefs,
            Err(err) => {
                tracing::warn!("Failed to load preferences, using defaults: {err}");
                Preferences::default()
            }
        };

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let mut controller = Self {
            source,
            reporter,
            prefs_store,
            prefs,
            subscription: None,
            last_fix: None,
            history: Vec::new(),
            recent: BoundedLog::new(DISPLAY_LOG_CAPACITY),
            journal: DebugJournal::new(),
            permission: PermissionState::Unknown,
            permission_watch: None,
            status: ("Ready".to_string(), StatusKind::Info),
            events,
            outcome_tx,
            outcome_rx,
        };
        controller.log(LogKind::System, "Tracker initialized");
        controller
    }

    /// Subscription handle is held iff tracking, so state is derived.
    pub fn state(&self) -> TrackingState {
        if self.subscription.is_some() {
            TrackingState::Tracking
        } else {
            TrackingState::Idle
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    pub fn last_fix(&self) -> Option<&LocationFix> {
        self.last_fix.as_ref()
    }

    pub fn history(&self) -> &[LocationFix] {
        &self.history
    }

    pub fn recent(&self) -> &BoundedLog<LocationFix> {
        &self.recent
    }

    pub fn journal(&self) -> &DebugJournal {
        &self.journal
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    /// Query permission state once and follow future changes. A source
    /// without the capability degrades to `Unknown` with a single warning.
    pub fn observe_permissions(&mut self, source: &dyn PermissionSource) {
        match source.watch() {
            Some((initial, rx)) => {
                self.permission_watch = Some(rx);
                self.apply_permission(initial);
            }
            None => {
                self.permission = PermissionState::Unknown;
                self.log(
                    LogKind::Warning,
                    "Permission queries not supported on this device",
                );
                self.emit(TrackerEvent::Permission(PermissionState::Unknown));
            }
        }
    }

    /// Begin tracking. Idempotent: a second call while tracking logs a
    /// warning and leaves the existing subscription untouched.
    pub async fn start(&mut self) {
        if self.subscription.is_some() {
            self.log(LogKind::Warning, "Tracking already active");
            self.set_status("Tracking already active", StatusKind::Warning);
            return;
        }

        match self.source.subscribe(SubscribeOptions::default()).await {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.prefs.session_count += 1;
                if let Err(err) = self.prefs_store.store(&self.prefs) {
                    self.log(
                        LogKind::Warning,
                        format!("Failed to persist session count: {err}"),
                    );
                }
                let count = self.prefs.session_count;
                self.log(LogKind::System, format!("Tracking started (session {count})"));
                self.set_status("Acquiring position...", StatusKind::Info);
                self.emit(TrackerEvent::SessionCount(count));
                self.emit(TrackerEvent::StateChanged(TrackingState::Tracking));
            }
            Err(PositionError::Unsupported) => {
                self.log(LogKind::Error, "Positioning not supported on this device");
                self.set_status("Positioning unavailable", StatusKind::Error);
            }
            Err(err) => {
                self.log(LogKind::Error, format!("Failed to start tracking: {err}"));
                self.set_status("Failed to start tracking", StatusKind::Error);
            }
        }
    }

    /// Stop tracking and release the sensor. Safe no-op when idle.
    pub fn stop(&mut self) {
        match self.subscription.take() {
            Some(mut subscription) => {
                subscription.cancel();
                self.log(LogKind::System, "Tracking stopped");
                self.set_status("Tracking stopped", StatusKind::Info);
                self.emit(TrackerEvent::StateChanged(TrackingState::Idle));
            }
            None => {
                self.log(LogKind::Warning, "Tracking is not active");
                self.set_status("Tracking is not active", StatusKind::Warning);
            }
        }
    }

    /// Route one sensor callback. Ignored when idle: a stale callback can
    /// arrive after stop, it must not resurrect state.
    pub fn handle_update(&mut self, update: PositionUpdate) {
        if self.subscription.is_none() {
            return;
        }
        match update {
            PositionUpdate::Fix(fix) => self.handle_fix(fix),
            PositionUpdate::Error(err) => {
                self.log(LogKind::Error, err.to_string());
                self.set_status(err.user_message(), StatusKind::Error);
                if err.is_session_fatal() {
                    // Unrecoverable for this session, release the sensor now.
                    self.stop();
                }
            }
        }
    }

    fn handle_fix(&mut self, fix: LocationFix) {
        self.last_fix = Some(fix.clone());
        self.history.push(fix.clone());
        self.recent.push(fix.clone());
        self.log(LogKind::Success, fix.summary());
        self.set_status("Position updated", StatusKind::Success);
        self.emit(TrackerEvent::Fix(fix.clone()));
        self.dispatch_report(fix);
    }

    /// Fire-and-forget: the controller proceeds whether or not delivery
    /// succeeds, and stopping does not cancel reports already in flight.
    fn dispatch_report(&mut self, fix: LocationFix) {
        let url = self.prefs.backend_url.clone();
        let payload = ReportPayload::from_fix(&self.prefs.user_id, &fix);
        let coordinates = fix.coordinate_label();
        let reporter = self.reporter.clone();
        let outcome_tx = self.outcome_tx.clone();

        tokio::spawn(async move {
            let outcome = reporter.report(&url, &payload).await;
            let _ = outcome_tx.send(ReportResult {
                coordinates,
                outcome,
            });
        });
    }

    /// Fold a report outcome back in. The fix is already in local history
    /// either way; failures cost exactly one warning line.
    pub fn handle_report_outcome(&mut self, result: ReportResult) {
        match result.outcome {
            Ok(receipt) => self.log(
                LogKind::Info,
                format!("Report delivered for {} (id {})", result.coordinates, receipt.id),
            ),
            Err(err) => self.log(
                LogKind::Warning,
                format!("Report failed for {}: {err}", result.coordinates),
            ),
        };
    }

    pub fn handle_permission_change(&mut self, state: PermissionState) {
        self.apply_permission(state);
    }

    fn apply_permission(&mut self, state: PermissionState) {
        self.permission = state;
        self.log(LogKind::Info, format!("Location permission: {}", state.label()));
        self.emit(TrackerEvent::Permission(state));
    }

    pub fn clear_locations(&mut self) {
        self.history.clear();
        self.recent.clear();
        self.log(LogKind::System, "Location log cleared");
        self.emit(TrackerEvent::LocationsCleared);
    }

    pub fn clear_debug_log(&mut self) {
        self.journal.clear();
        self.log(LogKind::System, "Debug log cleared");
        self.emit(TrackerEvent::DebugLogCleared);
    }

    /// Persist configuration. Empty fields are silently skipped, not
    /// rejected; only populated fields are applied.
    pub fn save_config(&mut self, backend_url: String, poll_interval_secs: u64) {
        let url = backend_url.trim();
        let mut applied = Vec::new();
        if !url.is_empty() {
            self.prefs.backend_url = url.to_string();
            applied.push("backend URL");
        }
        if poll_interval_secs > 0 {
            self.prefs.poll_interval_secs = poll_interval_secs;
            applied.push("poll interval");
        }
        if applied.is_empty() {
            return;
        }

        if let Err(err) = self.prefs_store.store(&self.prefs) {
            self.log(LogKind::Warning, format!("Failed to save configuration: {err}"));
            return;
        }
        self.log(
            LogKind::System,
            format!("Configuration saved ({})", applied.join(", ")),
        );
        self.emit(TrackerEvent::ConfigSaved {
            backend_url: self.prefs.backend_url.clone(),
            poll_interval_secs: self.prefs.poll_interval_secs,
        });
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        let (latitude, longitude, accuracy, last_update) = match &self.last_fix {
            Some(fix) => (
                format!("{:.6}", fix.latitude()),
                format!("{:.6}", fix.longitude()),
                match fix.accuracy {
                    Some(accuracy) => format!("±{:.0}m", accuracy),
                    None => "—".to_string(),
                },
                fix.timestamp
                    .with_timezone(&Local)
                    .format("%H:%M:%S")
                    .to_string(),
            ),
            None => ("—".into(), "—".into(), "—".into(), "—".into()),
        };

        DisplaySnapshot {
            state: self.state(),
            latitude,
            longitude,
            accuracy,
            last_update,
            status: self.status.0.clone(),
            status_kind: self.status.1,
            permission: self.permission.label(),
            session_count: self.prefs.session_count,
            location_count: self.history.len(),
            device_info: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
            debug_lines: self
                .journal
                .entries()
                .map(|e| e.message.clone())
                .collect(),
            recent_locations: self.recent.iter().map(|f| f.summary()).collect(),
        }
    }

    /// The single control loop: reacts to user commands, sensor updates,
    /// report outcomes, and permission changes until the command channel
    /// closes.
    pub async fn drive(&mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            let input = {
                let subscription = &mut self.subscription;
                let outcome_rx = &mut self.outcome_rx;
                let permission_watch = &mut self.permission_watch;

                tokio::select! {
                    command = commands.recv() => Input::Command(command),
                    update = async {
                        match subscription.as_mut() {
                            Some(sub) => sub.next_update().await,
                            None => future::pending().await,
                        }
                    } => Input::Update(update),
                    Some(result) = outcome_rx.recv() => Input::Outcome(result),
                    state = async {
                        match permission_watch.as_mut() {
                            Some(rx) => match rx.changed().await {
                                Ok(()) => Some(*rx.borrow_and_update()),
                                Err(_) => None,
                            },
                            None => future::pending().await,
                        }
                    } => Input::Permission(state),
                }
            };

            match input {
                Input::Command(Some(command)) => self.handle_command(command).await,
                Input::Command(None) => break,
                Input::Update(Some(update)) => self.handle_update(update),
                Input::Update(None) => {
                    self.log(LogKind::Warning, "Position stream ended");
                    self.stop();
                }
                Input::Outcome(result) => self.handle_report_outcome(result),
                Input::Permission(Some(state)) => self.handle_permission_change(state),
                Input::Permission(None) => self.permission_watch = None,
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartTracking => self.start().await,
            Command::StopTracking => self.stop(),
            Command::ClearLocations => self.clear_locations(),
            Command::ClearDebugLog => self.clear_debug_log(),
            Command::SaveConfig {
                backend_url,
                poll_interval_secs,
            } => self.save_config(backend_url, poll_interval_secs),
        }
    }

    fn log(&mut self, kind: LogKind, message: impl Into<String>) {
        let entry = self.journal.push(kind, message);
        self.emit(TrackerEvent::Log(entry));
    }

    fn set_status(&mut self, message: &str, kind: StatusKind) {
        self.status = (message.to_string(), kind);
        self.emit(TrackerEvent::Status {
            message: message.to_string(),
            kind,
        });
    }

    fn emit(&self, event: TrackerEvent) {
        // No subscribers is fine, rendering is optional.
        let _ = self.events.send(event);
    }
}
