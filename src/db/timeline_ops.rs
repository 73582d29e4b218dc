#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use super::mappers::TimelineRow;
use super::FreightDb;
use crate::error::{FreightError, Result};
use crate::types::{MissionId, MissionStatus, TimelineEntry, UserId};

/// Append one audit-trail row on the caller's executor. Every state-changing
/// operation passes its own transaction here; there is no ambient-connection
/// fallback.
pub(super) async fn log_timeline<'e, E>(
    executor: E,
    mission_id: MissionId,
    event: MissionStatus,
    user_id: Option<UserId>,
    description: &str,
) -> Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO mission_timeline (mission_id, event, user_id, description)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(mission_id.value())
    .bind(event.as_str())
    .bind(user_id.map(|id| id.value()))
    .bind(description)
    .execute(executor)
    .await
    .map(|_| ())
    .map_err(|e| FreightError::DatabaseError(format!("Failed to append timeline entry: {e}")))
}

impl FreightDb {
    /// # Errors
    /// Returns [`FreightError::DatabaseError`] when persistence or mapping fails.
    pub async fn get_timeline(&self, mission_id: MissionId) -> Result<Vec<TimelineEntry>> {
        let rows = sqlx::query_as::<_, TimelineRow>(
            "SELECT id, mission_id, event, user_id, description, created_at
             FROM mission_timeline
             WHERE mission_id = $1
             ORDER BY created_at ASC, id ASC",
        )
        .bind(mission_id.value())
        .fetch_all(self.pool())
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to load timeline: {e}")))?;

        rows.into_iter().map(TimelineRow::into_entry).collect()
    }
}
