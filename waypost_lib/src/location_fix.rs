use chrono::{DateTime, Utc};
use geo_types::Point;
use serde::{Deserialize, Serialize};

/// A single position sample as delivered by a positioning sensor.
///
/// Immutable once constructed. `position` stores longitude as x and
/// latitude as y.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub position: Point,
    pub accuracy: Option<f64>,
    pub altitude: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            position: Point::new(longitude, latitude),
            accuracy: None,
            altitude: None,
            heading: None,
            speed: None,
            timestamp,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn latitude(&self) -> f64 {
        self.position.y()
    }

    pub fn longitude(&self) -> f64 {
        self.position.x()
    }

    /// Latitude within [-90, 90], longitude within [-180, 180],
    /// accuracy non-negative when present.
    pub fn is_plausible(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude())
            && (-180.0..=180.0).contains(&self.longitude())
            && self.accuracy.is_none_or(|a| a >= 0.0)
    }

    /// "37.422000, -122.084000"
    pub fn coordinate_label(&self) -> String {
        format!("{:.6}, {:.6}", self.latitude(), self.longitude())
    }

    /// "37.422000, -122.084000 (±5m)", with "?" when accuracy is unknown.
    pub fn summary(&self) -> String {
        match self.accuracy {
            Some(accuracy) => format!("{} (±{:.0}m)", self.coordinate_label(), accuracy),
            None => format!("{} (±?m)", self.coordinate_label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(lat: f64, lon: f64) -> LocationFix {
        LocationFix::new(lat, lon, Utc::now())
    }

    #[test]
    fn accessors_map_point_axes() {
        let fix = sample(37.422, -122.084);
        assert_eq!(fix.latitude(), 37.422);
        assert_eq!(fix.longitude(), -122.084);
    }

    #[test]
    fn summary_format() {
        let fix = sample(37.422, -122.084).with_accuracy(5.0);
        assert_eq!(fix.summary(), "37.422000, -122.084000 (±5m)");
        assert_eq!(sample(0.0, 0.0).summary(), "0.000000, 0.000000 (±?m)");
    }

    #[test]
    fn plausibility_bounds() {
        assert!(sample(90.0, 180.0).is_plausible());
        assert!(sample(-90.0, -180.0).is_plausible());
        assert!(!sample(90.1, 0.0).is_plausible());
        assert!(!sample(0.0, -180.5).is_plausible());
        assert!(!sample(0.0, 0.0).with_accuracy(-1.0).is_plausible());
    }
}
