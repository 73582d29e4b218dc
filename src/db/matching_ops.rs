#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

//! Carrier bidding and selection: the two-phase matching protocol. Every
//! multi-row effect here runs inside a single transaction, with the mission
//! row locked first so precondition checks and writes share one snapshot.

use super::mappers::{AcceptanceRow, UserRow};
use super::mission_ops::lock_mission;
use super::timeline_ops::log_timeline;
use super::FreightDb;
use crate::error::{FreightError, Result};
use crate::external::{artifact_path, DocumentGenerator, Notifier, ObjectStorage, Party, Upload};
use crate::types::{
    AcceptanceStatus, Mission, MissionAcceptance, MissionId, MissionStatus, Role, UserId,
};
use itertools::Itertools;
use tracing::{info, warn};

/// Artifacts and notes supplied by the carrier at pickup.
#[derive(Debug, Clone)]
pub struct PickupConfirmation {
    pub photo: Upload,
    pub signature: Upload,
    pub loading_notes: Option<String>,
    pub special_instructions: Option<String>,
}

impl PickupConfirmation {
    fn validate(&self) -> Result<()> {
        for (label, upload) in [("photo", &self.photo), ("signature", &self.signature)] {
            if upload.bytes.is_empty() || upload.file_name.trim().is_empty() {
                return Err(FreightError::ValidationFailed(format!(
                    "Pickup {label} upload is required"
                )));
            }
        }
        Ok(())
    }
}

impl FreightDb {
    /// Phase 1 of matching: a carrier bids on a searching mission. The
    /// mission status is unchanged; multiple carriers may hold concurrent
    /// PENDING bids.
    ///
    /// # Errors
    /// `Forbidden` for non-carriers or inactive accounts, `InvalidState`
    /// when the mission is not open for bids, `AlreadyDecided` when this
    /// carrier already holds a bid row for the mission.
    pub async fn accept_mission(
        &self,
        mission_id: MissionId,
        carrier_id: UserId,
        message: Option<&str>,
        notifier: &dyn Notifier,
    ) -> Result<MissionAcceptance> {
        let carrier = self.get_user(carrier_id).await?;
        if carrier.role != Role::Carrier {
            return Err(FreightError::Forbidden(
                "Only carriers can accept missions".to_string(),
            ));
        }
        if !carrier.active {
            return Err(FreightError::Forbidden(
                "Carrier account is not active".to_string(),
            ));
        }

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to begin tx: {e}")))?;

        let mission = lock_mission(&mut tx, mission_id).await?;
        if mission.status != MissionStatus::SearchingCarrier {
            return Err(FreightError::InvalidState(
                "Mission is not available for acceptance at this time".to_string(),
            ));
        }
        if mission.carrier_id.is_some() {
            return Err(FreightError::InvalidState(
                "Mission has already been assigned to a carrier".to_string(),
            ));
        }

        let existing = sqlx::query_scalar::<_, String>(
            "SELECT status FROM mission_acceptances
             WHERE mission_id = $1 AND carrier_id = $2
             FOR UPDATE",
        )
        .bind(mission_id.value())
        .bind(carrier_id.value())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to inspect prior bid: {e}")))?;

        if let Some(status) = existing {
            let prior =
                AcceptanceStatus::try_from(status.as_str()).map_err(FreightError::DatabaseError)?;
            let reason = match prior {
                AcceptanceStatus::Rejected => "You have already rejected this mission",
                AcceptanceStatus::Accepted => "You have already accepted this mission",
                AcceptanceStatus::Pending => "You already have a pending bid for this mission",
            };
            return Err(FreightError::AlreadyDecided(reason.to_string()));
        }

        let row = sqlx::query_as::<_, AcceptanceRow>(
            "INSERT INTO mission_acceptances (id, mission_id, carrier_id, status, message)
             VALUES (gen_random_uuid(), $1, $2, 'PENDING', $3)
             RETURNING id, mission_id, carrier_id, status, message, created_at, updated_at",
        )
        .bind(mission_id.value())
        .bind(carrier_id.value())
        .bind(message)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            // A concurrent bid from the same carrier hits the
            // (mission_id, carrier_id) unique constraint.
            sqlx::Error::Database(db) if db.is_unique_violation() => FreightError::AlreadyDecided(
                "You already have a pending bid for this mission".to_string(),
            ),
            _ => FreightError::DatabaseError(format!("Failed to record bid: {e}")),
        })?;

        tx.commit()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to commit tx: {e}")))?;

        info!(mission = %mission_id, carrier = %carrier_id, "bid recorded");
        self.notify_best_effort(
            notifier,
            mission.shipper_id,
            &format!("Carrier {} bid on your mission {mission_id}", carrier.name),
        )
        .await;

        row.into_acceptance()
    }

    /// Phase 2 of matching: the shipper picks exactly one PENDING bid.
    /// Atomically assigns the carrier, flips the chosen bid to ACCEPTED,
    /// rejects every other PENDING bid, stores the rendered confirmation
    /// document and appends a timeline entry. A failed document render
    /// aborts the whole unit.
    pub async fn select_carrier(
        &self,
        mission_id: MissionId,
        carrier_id: UserId,
        shipper_id: UserId,
        documents: &dyn DocumentGenerator,
        notifier: &dyn Notifier,
    ) -> Result<Mission> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to begin tx: {e}")))?;

        let mission = lock_mission(&mut tx, mission_id).await?;
        if mission.shipper_id != shipper_id {
            return Err(FreightError::Forbidden(
                "Only the mission creator can select a carrier".to_string(),
            ));
        }
        if mission.status != MissionStatus::SearchingCarrier {
            return Err(FreightError::InvalidState(format!(
                "Carrier can only be selected while the mission is searching, status is {}",
                mission.status
            )));
        }
        if mission.carrier_id.is_some() {
            return Err(FreightError::InvalidState(
                "Mission already has an assigned carrier".to_string(),
            ));
        }

        let bid_status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM mission_acceptances
             WHERE mission_id = $1 AND carrier_id = $2
             FOR UPDATE",
        )
        .bind(mission_id.value())
        .bind(carrier_id.value())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to load bid: {e}")))?;

        match bid_status.as_deref() {
            None => {
                return Err(FreightError::NotFound(
                    "Carrier has not bid on this mission".to_string(),
                ));
            }
            Some("PENDING") => {}
            Some(_) => {
                return Err(FreightError::AlreadyDecided(
                    "Carrier's bid is no longer pending".to_string(),
                ));
            }
        }

        // The exclusivity guarantee: once this conditional write commits, the
        // "no carrier assigned" precondition is permanently false for every
        // other in-flight selection.
        let assigned = sqlx::query(
            "UPDATE missions
             SET carrier_id = $2, status = $3, updated_at = NOW()
             WHERE id = $1 AND status = $4 AND carrier_id IS NULL",
        )
        .bind(mission_id.value())
        .bind(carrier_id.value())
        .bind(MissionStatus::Accepted.as_str())
        .bind(MissionStatus::SearchingCarrier.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to assign carrier: {e}")))?;

        if assigned.rows_affected() != 1 {
            return Err(FreightError::InvalidState(
                "Mission was assigned concurrently".to_string(),
            ));
        }

        let chosen = sqlx::query(
            "UPDATE mission_acceptances
             SET status = 'ACCEPTED', updated_at = NOW()
             WHERE mission_id = $1 AND carrier_id = $2 AND status = 'PENDING'",
        )
        .bind(mission_id.value())
        .bind(carrier_id.value())
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to accept bid: {e}")))?;

        if chosen.rows_affected() != 1 {
            return Err(FreightError::AlreadyDecided(
                "Carrier's bid is no longer pending".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE mission_acceptances
             SET status = 'REJECTED', updated_at = NOW()
             WHERE mission_id = $1 AND status = 'PENDING' AND carrier_id <> $2",
        )
        .bind(mission_id.value())
        .bind(carrier_id.value())
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to reject other bids: {e}")))?;

        let shipper = load_party(&mut tx, shipper_id).await?;
        let carrier = load_party(&mut tx, carrier_id).await?;

        // Render failure aborts the selection: the document URL is persisted
        // on the mission record in the same transaction.
        let document_url = documents
            .render_confirmation(&mission, &shipper, &carrier)
            .await?;

        sqlx::query(
            "UPDATE missions SET confirmation_document_url = $2, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(mission_id.value())
        .bind(&document_url)
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to store document URL: {e}")))?;

        log_timeline(
            &mut *tx,
            mission_id,
            MissionStatus::Accepted,
            Some(shipper_id),
            &format!(
                "Shipper selected carrier {} for this mission. Confirmation document generated: {document_url}",
                carrier.name
            ),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to commit tx: {e}")))?;

        info!(mission = %mission_id, carrier = %carrier_id, "carrier selected");
        self.notify_best_effort(
            notifier,
            carrier_id,
            &format!("You were selected for mission {mission_id}"),
        )
        .await;

        self.get_mission(mission_id).await
    }

    /// Cancellation, branching by actor role. A shipper cancel is a global
    /// abort: mission CANCELLED, carrier unlinked, every live bid rejected.
    /// A carrier self-cancel rejects only that carrier's accepted bid and
    /// reopens the mission for bidding.
    pub async fn cancel_mission(&self, mission_id: MissionId, actor: UserId) -> Result<Mission> {
        let user = self.get_user(actor).await?;

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to begin tx: {e}")))?;

        let mission = lock_mission(&mut tx, mission_id).await?;
        if mission.status == MissionStatus::Cancelled {
            return Err(FreightError::InvalidState(
                "Mission is already cancelled".to_string(),
            ));
        }

        match user.role {
            Role::Shipper => {
                if mission.shipper_id != actor {
                    return Err(FreightError::Forbidden(
                        "Only the mission creator can cancel the mission".to_string(),
                    ));
                }
                if !mission.status.shipper_cancellable() {
                    return Err(FreightError::InvalidState(format!(
                        "Mission cannot be cancelled by the shipper while {}",
                        mission.status
                    )));
                }

                sqlx::query(
                    "UPDATE missions
                     SET status = $2, carrier_id = NULL, updated_at = NOW()
                     WHERE id = $1",
                )
                .bind(mission_id.value())
                .bind(MissionStatus::Cancelled.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    FreightError::DatabaseError(format!("Failed to cancel mission: {e}"))
                })?;

                sqlx::query(
                    "UPDATE mission_acceptances
                     SET status = 'REJECTED', message = 'Mission was cancelled by shipper',
                         updated_at = NOW()
                     WHERE mission_id = $1 AND status IN ('PENDING', 'ACCEPTED')",
                )
                .bind(mission_id.value())
                .execute(&mut *tx)
                .await
                .map_err(|e| FreightError::DatabaseError(format!("Failed to sweep bids: {e}")))?;

                log_timeline(
                    &mut *tx,
                    mission_id,
                    MissionStatus::Cancelled,
                    Some(actor),
                    "Shipper cancelled the mission. All pending or accepted carriers were rejected.",
                )
                .await?;
            }
            Role::Carrier => {
                let flipped = sqlx::query(
                    "UPDATE mission_acceptances
                     SET status = 'REJECTED', message = 'Cancelled by carrier', updated_at = NOW()
                     WHERE mission_id = $1 AND carrier_id = $2 AND status = 'ACCEPTED'",
                )
                .bind(mission_id.value())
                .bind(actor.value())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    FreightError::DatabaseError(format!("Failed to withdraw bid: {e}"))
                })?;

                if flipped.rows_affected() != 1 {
                    return Err(FreightError::InvalidState(
                        "You do not hold an accepted bid for this mission".to_string(),
                    ));
                }

                if mission.carrier_id == Some(actor) {
                    // The one backward edge: reopen the mission for bidding
                    // instead of cancelling it outright.
                    let reopened = sqlx::query(
                        "UPDATE missions
                         SET carrier_id = NULL, status = $2, updated_at = NOW()
                         WHERE id = $1 AND status = $3 AND carrier_id = $4",
                    )
                    .bind(mission_id.value())
                    .bind(MissionStatus::SearchingCarrier.as_str())
                    .bind(MissionStatus::Accepted.as_str())
                    .bind(actor.value())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        FreightError::DatabaseError(format!("Failed to reopen mission: {e}"))
                    })?;

                    if reopened.rows_affected() != 1 {
                        return Err(FreightError::InvalidState(format!(
                            "Assigned carrier can only cancel while the mission is {}",
                            MissionStatus::Accepted
                        )));
                    }

                    log_timeline(
                        &mut *tx,
                        mission_id,
                        MissionStatus::SearchingCarrier,
                        Some(actor),
                        "Carrier cancelled; mission reopened for bidding.",
                    )
                    .await?;
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to commit tx: {e}")))?;

        info!(mission = %mission_id, actor = %actor, role = %user.role, "mission cancelled");
        self.get_mission(mission_id).await
    }

    /// Pickup confirmation by the assigned carrier: stores the photo and
    /// signature artifacts, advances the mission to PICKUP_CONFIRMED and
    /// renders the CMR document, all in one transaction. A failed CMR render
    /// is non-fatal; the document URL stays null.
    pub async fn confirm_pickup(
        &self,
        mission_id: MissionId,
        carrier_id: UserId,
        confirmation: &PickupConfirmation,
        storage: &dyn ObjectStorage,
        documents: &dyn DocumentGenerator,
    ) -> Result<Mission> {
        confirmation.validate()?;

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to begin tx: {e}")))?;

        let mission = lock_mission(&mut tx, mission_id).await?;
        if mission.status == MissionStatus::PickupConfirmed {
            return Err(FreightError::InvalidState(
                "Pickup is already confirmed for this mission".to_string(),
            ));
        }
        if mission.status != MissionStatus::Accepted {
            return Err(FreightError::InvalidState(format!(
                "Pickup can only be confirmed while the mission is {}, status is {}",
                MissionStatus::Accepted,
                mission.status
            )));
        }
        if mission.carrier_id != Some(carrier_id) {
            return Err(FreightError::Forbidden(
                "Only the assigned carrier can confirm pickup".to_string(),
            ));
        }

        // Artifact uploads and the status transition commit as one unit: a
        // failed upload aborts before the mission is marked PICKUP_CONFIRMED.
        let photo_path = artifact_path(self.storage_prefix(), "pickup_photo", &confirmation.photo);
        storage.put(&photo_path, &confirmation.photo.bytes).await?;
        let photo_url = storage.url(&photo_path);

        let signature_path = artifact_path(
            self.storage_prefix(),
            "pickup_signature",
            &confirmation.signature,
        );
        storage
            .put(&signature_path, &confirmation.signature.bytes)
            .await?;
        let signature_url = storage.url(&signature_path);

        let advanced = sqlx::query(
            "UPDATE missions SET status = $2, updated_at = NOW()
             WHERE id = $1 AND status = $3 AND carrier_id = $4",
        )
        .bind(mission_id.value())
        .bind(MissionStatus::PickupConfirmed.as_str())
        .bind(MissionStatus::Accepted.as_str())
        .bind(carrier_id.value())
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to confirm pickup: {e}")))?;

        if advanced.rows_affected() != 1 {
            return Err(FreightError::InvalidState(
                "Mission changed concurrently while confirming pickup".to_string(),
            ));
        }

        let shipper = load_party(&mut tx, mission.shipper_id).await?;
        let carrier = load_party(&mut tx, carrier_id).await?;

        let cmr_url = match documents
            .render_cmr(&mission, &shipper, &carrier, Some(&signature_url))
            .await
        {
            Ok(url) => Some(url),
            Err(error) => {
                warn!(mission = %mission_id, %error, "CMR render failed, continuing without document");
                None
            }
        };

        sqlx::query(
            "UPDATE missions
             SET cmr_document_url = $2, pickup_photo_url = $3, pickup_signature_url = $4,
                 loading_notes = $5, special_instructions = $6, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(mission_id.value())
        .bind(cmr_url.as_deref())
        .bind(&photo_url)
        .bind(&signature_url)
        .bind(confirmation.loading_notes.as_deref())
        .bind(confirmation.special_instructions.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to store pickup artifacts: {e}")))?;

        let artifacts = [("photo", &photo_url), ("signature", &signature_url)]
            .iter()
            .map(|(label, url)| format!("{label}: {url}"))
            .join(", ");
        log_timeline(
            &mut *tx,
            mission_id,
            MissionStatus::PickupConfirmed,
            Some(carrier_id),
            &format!(
                "Carrier {} confirmed pickup. Uploaded files: {artifacts}. Loading notes: {}. Special instructions: {}.",
                carrier.name,
                confirmation.loading_notes.as_deref().unwrap_or("N/A"),
                confirmation.special_instructions.as_deref().unwrap_or("N/A"),
            ),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to commit tx: {e}")))?;

        info!(mission = %mission_id, carrier = %carrier_id, "pickup confirmed");
        self.get_mission(mission_id).await
    }

    /// Live PENDING bids for the shipper's selection screen.
    pub async fn pending_bids(
        &self,
        mission_id: MissionId,
        shipper_id: UserId,
    ) -> Result<Vec<MissionAcceptance>> {
        let mission = self.get_mission(mission_id).await?;
        if mission.shipper_id != shipper_id {
            return Err(FreightError::Forbidden(
                "Only the mission creator can view bids".to_string(),
            ));
        }

        let rows = sqlx::query_as::<_, AcceptanceRow>(
            "SELECT id, mission_id, carrier_id, status, message, created_at, updated_at
             FROM mission_acceptances
             WHERE mission_id = $1 AND status = 'PENDING'
             ORDER BY created_at ASC",
        )
        .bind(mission_id.value())
        .fetch_all(self.pool())
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to list bids: {e}")))?;

        rows.into_iter().map(AcceptanceRow::into_acceptance).collect()
    }

    /// All bid rows for a mission, any status. Used by audits and tests.
    pub async fn bids_for_mission(&self, mission_id: MissionId) -> Result<Vec<MissionAcceptance>> {
        let rows = sqlx::query_as::<_, AcceptanceRow>(
            "SELECT id, mission_id, carrier_id, status, message, created_at, updated_at
             FROM mission_acceptances
             WHERE mission_id = $1
             ORDER BY created_at ASC",
        )
        .bind(mission_id.value())
        .fetch_all(self.pool())
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to list bids: {e}")))?;

        rows.into_iter().map(AcceptanceRow::into_acceptance).collect()
    }

    async fn notify_best_effort(&self, notifier: &dyn Notifier, user: UserId, message: &str) {
        if let Err(error) = notifier.notify(user, message).await {
            warn!(%user, %error, "notification failed");
        }
    }
}

async fn load_party(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: UserId,
) -> Result<Party> {
    let row =
        sqlx::query_as::<_, UserRow>("SELECT id, name, role, active FROM users WHERE id = $1")
            .bind(user_id.value())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to load user: {e}")))?;

    let user = row
        .ok_or_else(|| FreightError::NotFound(format!("User {user_id} not found")))?
        .into_user()?;
    Ok(Party {
        id: user.id,
        name: user.name,
    })
}
