use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
    Unknown,
}

impl PermissionState {
    pub fn label(&self) -> &'static str {
        match self {
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Prompt => "prompt",
            PermissionState::Unknown => "unknown",
        }
    }
}

/// Source of geolocation permission state.
///
/// `watch` returns `None` when the platform has no permission-query
/// capability; that is not an error, the caller degrades to `Unknown`.
pub trait PermissionSource: Send + Sync {
    fn watch(&self) -> Option<(PermissionState, watch::Receiver<PermissionState>)>;
}

/// Permission source backed by a watch channel, driven by whoever owns it.
pub struct WatchPermissionSource {
    tx: watch::Sender<PermissionState>,
}

impl WatchPermissionSource {
    pub fn new(initial: PermissionState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn set(&self, state: PermissionState) {
        let _ = self.tx.send(state);
    }
}

impl PermissionSource for WatchPermissionSource {
    fn watch(&self) -> Option<(PermissionState, watch::Receiver<PermissionState>)> {
        let rx = self.tx.subscribe();
        let initial = *rx.borrow();
        Some((initial, rx))
    }
}

/// Platform without a permission-query capability.
pub struct UnsupportedPermissionSource;

impl PermissionSource for UnsupportedPermissionSource {
    fn watch(&self) -> Option<(PermissionState, watch::Receiver<PermissionState>)> {
        None
    }
}
