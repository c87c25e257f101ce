pub mod controller;
pub mod journal;
pub mod permission;
pub mod position;
pub mod prefs;
pub mod report;

pub use controller::*;

/// Rolling debug journal capacity.
pub const DEBUG_LOG_CAPACITY: usize = 50;
/// On-screen location log capacity. The full per-session history is unbounded.
pub const DISPLAY_LOG_CAPACITY: usize = 20;
