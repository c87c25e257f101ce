use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location_fix::LocationFix;

/// Body of the location report POST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl ReportPayload {
    pub fn from_fix(user_id: &str, fix: &LocationFix) -> Self {
        Self {
            user_id: user_id.to_string(),
            latitude: fix.latitude(),
            longitude: fix.longitude(),
            accuracy: fix.accuracy.unwrap_or(0.0),
            timestamp: fix.timestamp,
        }
    }
}

/// Successful backend response. Only the id is used, for logging.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportReceipt {
    pub id: String,
}
