#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

//! GPS tracking: append-only position samples per mission. Recording is
//! deliberately permissive about mission status; a late sample after
//! delivery is still useful audit data.

use super::mappers::TrackingRow;
use super::FreightDb;
use crate::error::{FreightError, Result};
use crate::types::{MissionId, TrackedPosition, TrackingPoint, TrackingSample};
use tracing::debug;

impl FreightDb {
    /// Append a validated position sample for the mission and return it
    /// with a shareable map link.
    ///
    /// # Errors
    /// `ValidationFailed` for out-of-range coordinates, `NotFound` when the
    /// mission does not exist.
    pub async fn record_tracking_point(
        &self,
        mission_id: MissionId,
        sample: &TrackingSample,
    ) -> Result<TrackedPosition> {
        sample.validate()?;

        // Existence check only: tracking stays open across the lifecycle.
        self.get_mission(mission_id).await?;

        let row = sqlx::query_as::<_, TrackingRow>(
            "INSERT INTO tracking_points (mission_id, latitude, longitude, speed, heading, accuracy)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, mission_id, latitude, longitude, speed, heading, accuracy, created_at",
        )
        .bind(mission_id.value())
        .bind(sample.latitude)
        .bind(sample.longitude)
        .bind(sample.speed)
        .bind(sample.heading)
        .bind(sample.accuracy)
        .fetch_one(self.pool())
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to record position: {e}")))?;

        let point = row.into_point();
        let maps_link = point.maps_link();
        debug!(mission = %mission_id, lat = point.latitude, lon = point.longitude, "position recorded");
        Ok(TrackedPosition { point, maps_link })
    }

    /// Full position history for a mission, oldest first.
    pub async fn get_tracking_points(&self, mission_id: MissionId) -> Result<Vec<TrackingPoint>> {
        self.get_mission(mission_id).await?;

        let rows = sqlx::query_as::<_, TrackingRow>(
            "SELECT id, mission_id, latitude, longitude, speed, heading, accuracy, created_at
             FROM tracking_points
             WHERE mission_id = $1
             ORDER BY created_at ASC, id ASC",
        )
        .bind(mission_id.value())
        .fetch_all(self.pool())
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to load positions: {e}")))?;

        Ok(rows.into_iter().map(TrackingRow::into_point).collect())
    }

    /// Latest known position, if any sample was recorded.
    pub async fn latest_position(&self, mission_id: MissionId) -> Result<Option<TrackedPosition>> {
        self.get_mission(mission_id).await?;

        let row = sqlx::query_as::<_, TrackingRow>(
            "SELECT id, mission_id, latitude, longitude, speed, heading, accuracy, created_at
             FROM tracking_points
             WHERE mission_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .bind(mission_id.value())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to load position: {e}")))?;

        Ok(row.map(|r| {
            let point = r.into_point();
            let maps_link = point.maps_link();
            TrackedPosition { point, maps_link }
        }))
    }
}
