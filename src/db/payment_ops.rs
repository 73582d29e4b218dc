#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

//! Payment escrow: checkout session bootstrap and asynchronous provider
//! event reconciliation. The payments table holds at most one row per
//! mission; settlement is deduplicated with a conditional status flip.

use super::mappers::PaymentRow;
use super::mission_ops::lock_mission;
use super::timeline_ops::log_timeline;
use super::FreightDb;
use crate::error::{FreightError, Result};
use crate::external::PaymentProvider;
use crate::types::{
    CheckoutSession, MissionId, MissionStatus, Payment, PaymentStatus, ProviderPaymentEvent,
    ReconcileOutcome, UserId,
};
use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

impl FreightDb {
    /// Shipper confirms the mission and gets a checkout session to pay
    /// into escrow. Moves a freshly created mission to `PAYMENT_PENDING`;
    /// re-confirming while a session is still live returns that same
    /// session with `reused` set instead of minting a new one.
    ///
    /// # Errors
    /// `Forbidden` for non-owners, `InvalidState` when the mission is
    /// cancelled, already paid, or past the payment stage.
    pub async fn confirm_mission(
        &self,
        mission_id: MissionId,
        shipper_id: UserId,
        provider: &dyn PaymentProvider,
    ) -> Result<CheckoutSession> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to begin tx: {e}")))?;

        let mission = lock_mission(&mut tx, mission_id).await?;
        if mission.shipper_id != shipper_id {
            return Err(FreightError::Forbidden(
                "Only the mission creator can confirm the mission".to_string(),
            ));
        }
        if mission.status == MissionStatus::Cancelled {
            return Err(FreightError::InvalidState(
                "A cancelled mission cannot be paid".to_string(),
            ));
        }

        let existing = sqlx::query_as::<_, PaymentRow>(
            "SELECT id, mission_id, shipper_id, amount, currency, status, provider,
                    checkout_session_id, checkout_url, provider_reference,
                    session_expires_at, commission_rate, commission_amount,
                    created_at, updated_at
             FROM payments WHERE mission_id = $1
             FOR UPDATE",
        )
        .bind(mission_id.value())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to load payment: {e}")))?
        .map(PaymentRow::into_payment)
        .transpose()?;

        if let Some(payment) = &existing {
            if payment.status == PaymentStatus::Completed {
                return Err(FreightError::InvalidState(
                    "Mission has already been paid".to_string(),
                ));
            }
            if payment.has_live_session(Utc::now()) {
                if let (Some(session_id), Some(checkout_url)) = (
                    payment.checkout_session_id.clone(),
                    payment.checkout_url.clone(),
                ) {
                    info!(mission = %mission_id, session = %session_id, "reusing live checkout session");
                    return Ok(CheckoutSession {
                        session_id,
                        checkout_url,
                        reused: true,
                    });
                }
            }
        }

        match mission.status {
            MissionStatus::Created => {
                let moved = sqlx::query(
                    "UPDATE missions SET status = $2, updated_at = NOW()
                     WHERE id = $1 AND status = $3",
                )
                .bind(mission_id.value())
                .bind(MissionStatus::PaymentPending.as_str())
                .bind(MissionStatus::Created.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    FreightError::DatabaseError(format!("Failed to start payment: {e}"))
                })?;

                if moved.rows_affected() != 1 {
                    return Err(FreightError::InvalidState(
                        "Mission changed concurrently while confirming".to_string(),
                    ));
                }

                log_timeline(
                    &mut *tx,
                    mission_id,
                    MissionStatus::PaymentPending,
                    Some(shipper_id),
                    "Shipper confirmed the mission, awaiting payment.",
                )
                .await?;
            }
            // Expired or never-opened session on an unpaid mission: mint a
            // fresh one without touching the status.
            MissionStatus::PaymentPending => {}
            _ => {
                return Err(FreightError::InvalidState(format!(
                    "Payment can only be initiated while the mission is {} or {}, status is {}",
                    MissionStatus::Created,
                    MissionStatus::PaymentPending,
                    mission.status
                )));
            }
        }

        let session = provider.create_checkout_session(&mission, shipper_id).await?;
        let expires_at = Utc::now() + Duration::hours(self.session_ttl_hours());

        // The metadata mirrors what the provider echoes back in its events
        // and is what reconciliation matches against.
        let metadata = serde_json::json!({
            "mission_id": mission_id.value(),
            "shipper_id": shipper_id.value(),
        });

        sqlx::query(
            "INSERT INTO payments (id, mission_id, shipper_id, amount, currency, status,
                                   provider, checkout_session_id, checkout_url,
                                   session_expires_at, commission_rate, commission_amount,
                                   metadata)
             VALUES ($1, $2, $3, $4, $5, 'PENDING', $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (mission_id) DO UPDATE
             SET status = 'PENDING', checkout_session_id = EXCLUDED.checkout_session_id,
                 checkout_url = EXCLUDED.checkout_url,
                 session_expires_at = EXCLUDED.session_expires_at,
                 amount = EXCLUDED.amount, currency = EXCLUDED.currency,
                 provider = EXCLUDED.provider,
                 commission_rate = EXCLUDED.commission_rate,
                 commission_amount = EXCLUDED.commission_amount,
                 metadata = EXCLUDED.metadata,
                 updated_at = NOW()",
        )
        .bind(Uuid::new_v4())
        .bind(mission_id.value())
        .bind(shipper_id.value())
        .bind(mission.pricing.final_price)
        .bind(self.currency())
        .bind(provider.name())
        .bind(&session.session_id)
        .bind(&session.checkout_url)
        .bind(expires_at)
        .bind(mission.pricing.commission_rate)
        .bind(mission.pricing.commission_amount)
        .bind(metadata)
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to store payment: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to commit tx: {e}")))?;

        info!(mission = %mission_id, session = %session.session_id, "checkout session created");
        Ok(CheckoutSession {
            session_id: session.session_id,
            checkout_url: session.checkout_url,
            reused: false,
        })
    }

    /// Attach the provider-side capture reference to a payment row, keyed
    /// by checkout session. Called when the provider first reports which
    /// internal object backs the session.
    pub async fn attach_provider_reference(
        &self,
        checkout_session_id: &str,
        provider_reference: &str,
    ) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE payments SET provider_reference = $2, updated_at = NOW()
             WHERE checkout_session_id = $1",
        )
        .bind(checkout_session_id)
        .bind(provider_reference)
        .execute(self.pool())
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to attach reference: {e}")))?;

        if updated.rows_affected() == 0 {
            return Err(FreightError::NotFound(format!(
                "No payment found for checkout session {checkout_session_id}"
            )));
        }
        Ok(())
    }

    /// Reconcile a successful provider event: flip the pending payment to
    /// COMPLETED, append a ledger row, record the timeline entry and open
    /// the mission for carrier search, as one transaction. Duplicate or
    /// unmatched events are logged no-ops, never errors.
    pub async fn record_payment_settled(
        &self,
        event: &ProviderPaymentEvent,
    ) -> Result<ReconcileOutcome> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to begin tx: {e}")))?;

        // Lock order matches confirm_mission: mission row, then payment row.
        let mission = match lock_mission(&mut tx, event.mission_id).await {
            Ok(mission) => mission,
            Err(FreightError::NotFound(_)) => {
                warn!(
                    mission = %event.mission_id,
                    "provider event references an unknown mission, ignoring"
                );
                return Ok(ReconcileOutcome::NoOp);
            }
            Err(other) => return Err(other),
        };
        if mission.status != MissionStatus::PaymentPending {
            warn!(
                mission = %event.mission_id,
                status = %mission.status,
                "mission is not awaiting payment, ignoring event"
            );
            return Ok(ReconcileOutcome::NoOp);
        }

        let payment = sqlx::query_as::<_, PaymentRow>(
            "SELECT id, mission_id, shipper_id, amount, currency, status, provider,
                    checkout_session_id, checkout_url, provider_reference,
                    session_expires_at, commission_rate, commission_amount,
                    created_at, updated_at
             FROM payments
             WHERE mission_id = $1 AND shipper_id = $2 AND provider = $3 AND status = 'PENDING'
             FOR UPDATE",
        )
        .bind(event.mission_id.value())
        .bind(event.shipper_id.value())
        .bind(&event.provider)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to match event: {e}")))?
        .map(PaymentRow::into_payment)
        .transpose()?;

        let Some(payment) = payment else {
            warn!(
                mission = %event.mission_id,
                shipper = %event.shipper_id,
                provider = %event.provider,
                "no pending payment matches provider event, ignoring"
            );
            return Ok(ReconcileOutcome::NoOp);
        };

        // The live-session fields are cleared on settlement; a settled
        // payment never resurfaces as a reusable checkout.
        let settled = sqlx::query(
            "UPDATE payments
             SET status = 'COMPLETED', provider_reference = $2,
                 checkout_url = NULL, session_expires_at = NULL, metadata = NULL,
                 updated_at = NOW()
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(payment.id.value())
        .bind(&event.provider_reference)
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to settle payment: {e}")))?;

        if settled.rows_affected() != 1 {
            warn!(payment = %payment.id, "payment settled concurrently, ignoring duplicate event");
            return Ok(ReconcileOutcome::NoOp);
        }

        sqlx::query(
            "INSERT INTO payment_transactions
                 (user_id, mission_id, type, provider, reference_number, status,
                  raw_status, amount, currency, paid_amount, paid_currency)
             VALUES ($1, $2, 'PAYMENT', $3, $4, 'COMPLETED', $5, $6, $7, $8, $9)",
        )
        .bind(event.shipper_id.value())
        .bind(event.mission_id.value())
        .bind(&event.provider)
        .bind(&event.provider_reference)
        .bind(&event.raw_status)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(event.paid_amount)
        .bind(&event.paid_currency)
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to write ledger row: {e}")))?;

        log_timeline(
            &mut *tx,
            event.mission_id,
            MissionStatus::PaymentConfirmed,
            Some(event.shipper_id),
            &format!(
                "Payment of {:.2} {} confirmed via {}. Mission opened for carrier search.",
                event.paid_amount, event.paid_currency, event.provider
            ),
        )
        .await?;

        let opened = sqlx::query(
            "UPDATE missions SET status = $2, updated_at = NOW()
             WHERE id = $1 AND status = $3",
        )
        .bind(event.mission_id.value())
        .bind(MissionStatus::SearchingCarrier.as_str())
        .bind(MissionStatus::PaymentPending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to open mission: {e}")))?;

        if opened.rows_affected() != 1 {
            warn!(mission = %event.mission_id, "mission left payment stage before settlement, ignoring event");
            return Ok(ReconcileOutcome::NoOp);
        }

        tx.commit()
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to commit tx: {e}")))?;

        info!(
            mission = %event.mission_id,
            reference = %event.provider_reference,
            "payment settled, mission searching for carrier"
        );
        Ok(ReconcileOutcome::Settled)
    }

    /// Failed or customer-cancelled provider events carry no state effect;
    /// the shipper simply re-confirms for a fresh session. Logged for audit.
    pub fn record_payment_unsettled(event: &ProviderPaymentEvent) {
        info!(
            mission = %event.mission_id,
            provider = %event.provider,
            raw_status = %event.raw_status,
            "provider reported unsettled payment, no state change"
        );
    }

    /// Payment row for a mission, if any.
    pub async fn get_payment(&self, mission_id: MissionId) -> Result<Option<Payment>> {
        sqlx::query_as::<_, PaymentRow>(
            "SELECT id, mission_id, shipper_id, amount, currency, status, provider,
                    checkout_session_id, checkout_url, provider_reference,
                    session_expires_at, commission_rate, commission_amount,
                    created_at, updated_at
             FROM payments WHERE mission_id = $1",
        )
        .bind(mission_id.value())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to load payment: {e}")))?
        .map(PaymentRow::into_payment)
        .transpose()
    }
}
