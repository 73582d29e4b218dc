use super::identifiers::{MissionId, UserId};
use super::mission::MissionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the append-only per-mission audit trail. Never updated or
/// deleted. `user_id` is null for system-driven events such as payment
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: i64,
    pub mission_id: MissionId,
    pub event: MissionStatus,
    pub user_id: Option<UserId>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
