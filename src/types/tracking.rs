use super::identifiers::MissionId;
use crate::error::{FreightError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A raw GPS sample from a carrier device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters per second.
    pub speed: Option<f64>,
    /// Degrees, 0-360.
    pub heading: Option<f64>,
    /// Estimated GPS accuracy in meters.
    pub accuracy: Option<f64>,
}

impl TrackingSample {
    /// # Errors
    /// Returns [`FreightError::ValidationFailed`] for out-of-range fields.
    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(FreightError::ValidationFailed(format!(
                "Latitude {} out of range",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(FreightError::ValidationFailed(format!(
                "Longitude {} out of range",
                self.longitude
            )));
        }
        if let Some(speed) = self.speed {
            if speed < 0.0 {
                return Err(FreightError::ValidationFailed(
                    "Speed cannot be negative".to_string(),
                ));
            }
        }
        if let Some(heading) = self.heading {
            if !(0.0..=360.0).contains(&heading) {
                return Err(FreightError::ValidationFailed(format!(
                    "Heading {heading} out of range"
                )));
            }
        }
        if let Some(accuracy) = self.accuracy {
            if accuracy < 0.0 {
                return Err(FreightError::ValidationFailed(
                    "Accuracy cannot be negative".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A stored GPS sample. Append-only; prior points are never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingPoint {
    pub id: i64,
    pub mission_id: MissionId,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl TrackingPoint {
    /// Display link for the stored position.
    #[must_use]
    pub fn maps_link(&self) -> String {
        let coordinates = format!("{},{}", self.latitude, self.longitude);
        Url::parse_with_params("https://www.google.com/maps", &[("q", coordinates.as_str())])
            .map_or_else(
                |_| format!("https://www.google.com/maps?q={coordinates}"),
                |link| link.to_string(),
            )
    }
}

/// Ingestion response: the stored point plus a derived map link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPosition {
    pub point: TrackingPoint,
    pub maps_link: String,
}
