#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use super::mappers::MissionRow;
use super::timeline_ops::log_timeline;
use super::FreightDb;
use crate::error::{FreightError, Result};
use crate::pricing;
use crate::types::{
    Mission, MissionFilter, MissionId, MissionStatus, NewMission, Paged, Pagination, Role, UserId,
};
use tracing::info;

impl FreightDb {
    /// Create a mission for the given shipper. Pricing is computed from the
    /// distance and shipment class and fixed at creation; the insert and the
    /// opening timeline entry commit together.
    ///
    /// # Errors
    /// `NotFound` for an unknown shipper, `Forbidden` for a non-shipper
    /// actor, `ValidationFailed` for a bad distance.
    pub async fn create_mission(&self, input: &NewMission, shipper_id: UserId) -> Result<Mission> {
        let shipper = self.get_user(shipper_id).await?;
        if shipper.role != Role::Shipper {
            return Err(FreightError::Forbidden(
                "Only shippers can create missions".to_string(),
            ));
        }

        let quote = pricing::quote(input.distance_km, input.shipment_class)?;
        let mission_id = MissionId::generate();
        let volume_m3 = input.effective_volume_m3();

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to begin tx: {e}")))?;

        sqlx::query(
            "INSERT INTO missions (
                 id, shipper_id, status, shipment_class,
                 pickup_address, pickup_city, pickup_contact_name, pickup_contact_phone,
                 pickup_instructions,
                 delivery_address, delivery_city, delivery_contact_name, delivery_contact_phone,
                 delivery_instructions,
                 pickup_date, delivery_date,
                 goods_type, weight_kg, volume_m3, length_m, width_m, height_m,
                 fragile, temp_min, temp_max,
                 distance_km, base_price, commission_rate, commission_amount,
                 vat_rate, vat_amount, final_price
             ) VALUES (
                 $1, $2, $3, $4,
                 $5, $6, $7, $8, $9,
                 $10, $11, $12, $13, $14,
                 $15, $16,
                 $17, $18, $19, $20, $21, $22,
                 $23, $24, $25,
                 $26, $27, $28, $29,
                 $30, $31, $32
             )",
        )
        .bind(mission_id.value())
        .bind(shipper_id.value())
        .bind(MissionStatus::Created.as_str())
        .bind(input.shipment_class.as_str())
        .bind(&input.pickup.address)
        .bind(&input.pickup.city)
        .bind(&input.pickup.contact_name)
        .bind(&input.pickup.contact_phone)
        .bind(input.pickup.instructions.as_deref())
        .bind(&input.delivery.address)
        .bind(&input.delivery.city)
        .bind(&input.delivery.contact_name)
        .bind(&input.delivery.contact_phone)
        .bind(input.delivery.instructions.as_deref())
        .bind(input.pickup_date)
        .bind(input.delivery_date)
        .bind(&input.cargo.goods_type)
        .bind(input.cargo.weight_kg)
        .bind(volume_m3)
        .bind(input.cargo.length_m)
        .bind(input.cargo.width_m)
        .bind(input.cargo.height_m)
        .bind(input.cargo.fragile)
        .bind(input.cargo.temp_min)
        .bind(input.cargo.temp_max)
        .bind(input.distance_km)
        .bind(quote.base_price)
        .bind(quote.commission_rate)
        .bind(quote.commission_amount)
        .bind(quote.vat_rate)
        .bind(quote.vat_amount)
        .bind(quote.final_price)
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to create mission: {e}")))?;

        log_timeline(
            &mut *tx,
            mission_id,
            MissionStatus::Created,
            Some(shipper_id),
            "Mission created",
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to commit tx: {e}")))?;

        info!(mission = %mission_id, shipper = %shipper_id, "mission created");
        self.get_mission(mission_id).await
    }

    /// # Errors
    /// Returns [`FreightError::NotFound`] when the mission does not exist.
    pub async fn get_mission(&self, mission_id: MissionId) -> Result<Mission> {
        let row = sqlx::query_as::<_, MissionRow>("SELECT * FROM missions WHERE id = $1")
            .bind(mission_id.value())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to load mission: {e}")))?;

        row.map_or_else(
            || {
                Err(FreightError::NotFound(format!(
                    "Mission {mission_id} not found"
                )))
            },
            MissionRow::into_mission,
        )
    }

    /// Manual price override, legal only pre-confirmation. The new price may
    /// not undercut the computed final price. The override redistributes base
    /// and commission; VAT fields keep their creation-time values.
    ///
    /// # Errors
    /// `Forbidden` for a non-owner, `InvalidState` past CREATED,
    /// `ValidationFailed` below the floor.
    pub async fn set_price(
        &self,
        mission_id: MissionId,
        new_price: f64,
        actor: UserId,
    ) -> Result<Mission> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to begin tx: {e}")))?;

        let mission = lock_mission(&mut tx, mission_id).await?;

        if mission.shipper_id != actor {
            return Err(FreightError::Forbidden(
                "Only the mission creator can set the price".to_string(),
            ));
        }
        if mission.status != MissionStatus::Created {
            return Err(FreightError::InvalidState(format!(
                "Price can only be set before confirmation, status is {}",
                mission.status
            )));
        }
        if new_price < mission.pricing.final_price {
            return Err(FreightError::ValidationFailed(format!(
                "New price {new_price} cannot be lower than the calculated price {}",
                mission.pricing.final_price
            )));
        }

        let split = pricing::split_override(new_price);
        sqlx::query(
            "UPDATE missions
             SET base_price = $2, commission_amount = $3, final_price = $4, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(mission_id.value())
        .bind(split.base_price)
        .bind(split.commission_amount)
        .bind(split.final_price)
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to update price: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to commit tx: {e}")))?;

        self.get_mission(mission_id).await
    }

    /// Advance a mission through the post-pickup progression (transit,
    /// delivery, completion) or into dispute. Updates outside the declared
    /// transition table fail with `InvalidTransition`, as do targets owned
    /// by a richer operation: cancellation, carrier assignment, reopening
    /// and payment advances all carry coupled writes (carrier clearing, bid
    /// sweeps, ledger rows) and only their dedicated operations take them.
    pub async fn update_status(
        &self,
        mission_id: MissionId,
        next: MissionStatus,
        actor: Option<UserId>,
    ) -> Result<Mission> {
        if !next.directly_settable() {
            return Err(FreightError::InvalidTransition(format!(
                "{next} cannot be set directly; use the cancellation, matching or payment operation that owns it"
            )));
        }

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to begin tx: {e}")))?;

        let mission = lock_mission(&mut tx, mission_id).await?;

        if !mission.status.can_transition_to(next) {
            return Err(FreightError::InvalidTransition(format!(
                "{} -> {next} is not a legal mission transition",
                mission.status
            )));
        }
        if next.requires_carrier() && mission.carrier_id.is_none() {
            return Err(FreightError::InvalidTransition(format!(
                "Cannot enter {next} without an assigned carrier"
            )));
        }

        // CAS on the previously observed status; a concurrent transition
        // loses the race instead of double-applying.
        let updated = sqlx::query(
            "UPDATE missions SET status = $3, updated_at = NOW()
             WHERE id = $1 AND status = $2",
        )
        .bind(mission_id.value())
        .bind(mission.status.as_str())
        .bind(next.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to update status: {e}")))?;

        if updated.rows_affected() != 1 {
            return Err(FreightError::InvalidTransition(format!(
                "Mission {mission_id} changed concurrently while moving to {next}"
            )));
        }

        log_timeline(
            &mut *tx,
            mission_id,
            next,
            actor,
            &format!("Status changed from {} to {next}", mission.status),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to commit tx: {e}")))?;

        self.get_mission(mission_id).await
    }

    /// Unassigned missions visible to carriers, newest first.
    pub async fn list_available_missions(&self, filter: &MissionFilter) -> Result<Paged<Mission>> {
        let status = filter.status.map(|s| s.as_str().to_string());
        let query = filter.query.clone();
        let page = filter.page();
        let limit = filter.limit();

        let rows = sqlx::query_as::<_, MissionRow>(
            "SELECT m.* FROM missions m
             JOIN users s ON s.id = m.shipper_id
             WHERE m.carrier_id IS NULL
               AND ($1::text IS NULL OR m.status = $1)
               AND ($2::text IS NULL
                    OR m.pickup_city ILIKE '%' || $2 || '%'
                    OR m.delivery_city ILIKE '%' || $2 || '%'
                    OR s.name ILIKE '%' || $2 || '%')
             ORDER BY m.created_at DESC
             LIMIT $3 OFFSET $4",
        )
        .bind(status.as_deref())
        .bind(query.as_deref())
        .bind(i64::from(limit))
        .bind(filter.offset())
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            FreightError::DatabaseError(format!("Failed to list available missions: {e}"))
        })?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM missions m
             JOIN users s ON s.id = m.shipper_id
             WHERE m.carrier_id IS NULL
               AND ($1::text IS NULL OR m.status = $1)
               AND ($2::text IS NULL
                    OR m.pickup_city ILIKE '%' || $2 || '%'
                    OR m.delivery_city ILIKE '%' || $2 || '%'
                    OR s.name ILIKE '%' || $2 || '%')",
        )
        .bind(status.as_deref())
        .bind(query.as_deref())
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            FreightError::DatabaseError(format!("Failed to count available missions: {e}"))
        })?;

        let items = rows
            .into_iter()
            .map(MissionRow::into_mission)
            .collect::<Result<Vec<_>>>()?;

        Ok(Paged {
            items,
            pagination: Pagination::compute(total.max(0).cast_unsigned(), page, limit),
        })
    }

    /// All missions where the user is the shipper or the assigned carrier.
    pub async fn list_missions_for(&self, user_id: UserId, role: Role) -> Result<Vec<Mission>> {
        let sql = match role {
            Role::Shipper => {
                "SELECT * FROM missions WHERE shipper_id = $1 ORDER BY created_at DESC"
            }
            Role::Carrier => {
                "SELECT * FROM missions WHERE carrier_id = $1 ORDER BY created_at DESC"
            }
        };

        let rows = sqlx::query_as::<_, MissionRow>(sql)
            .bind(user_id.value())
            .fetch_all(self.pool())
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to list missions: {e}")))?;

        rows.into_iter().map(MissionRow::into_mission).collect()
    }
}

/// Read a mission inside the caller's transaction with a row lock, so that
/// precondition checks and the writes that follow observe the same snapshot.
pub(super) async fn lock_mission(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    mission_id: MissionId,
) -> Result<Mission> {
    let row = sqlx::query_as::<_, MissionRow>("SELECT * FROM missions WHERE id = $1 FOR UPDATE")
        .bind(mission_id.value())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to lock mission: {e}")))?;

    row.map_or_else(
        || {
            Err(FreightError::NotFound(format!(
                "Mission {mission_id} not found"
            )))
        },
        MissionRow::into_mission,
    )
}
