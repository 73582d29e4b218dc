#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use super::FreightDb;
use crate::error::{FreightError, Result};

/// Schema statements, applied in order. Idempotent so `init-db` and test
/// setup can run against an existing database.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
         id UUID PRIMARY KEY,
         name TEXT NOT NULL,
         role TEXT NOT NULL,
         active BOOLEAN NOT NULL DEFAULT TRUE,
         created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
     )",
    "CREATE TABLE IF NOT EXISTS missions (
         id UUID PRIMARY KEY,
         shipper_id UUID NOT NULL REFERENCES users(id),
         carrier_id UUID REFERENCES users(id),
         status TEXT NOT NULL,
         shipment_class TEXT NOT NULL,
         pickup_address TEXT NOT NULL,
         pickup_city TEXT NOT NULL,
         pickup_contact_name TEXT NOT NULL,
         pickup_contact_phone TEXT NOT NULL,
         pickup_instructions TEXT,
         delivery_address TEXT NOT NULL,
         delivery_city TEXT NOT NULL,
         delivery_contact_name TEXT NOT NULL,
         delivery_contact_phone TEXT NOT NULL,
         delivery_instructions TEXT,
         pickup_date TIMESTAMPTZ NOT NULL,
         delivery_date TIMESTAMPTZ,
         goods_type TEXT NOT NULL,
         weight_kg DOUBLE PRECISION NOT NULL,
         volume_m3 DOUBLE PRECISION NOT NULL,
         length_m DOUBLE PRECISION,
         width_m DOUBLE PRECISION,
         height_m DOUBLE PRECISION,
         fragile BOOLEAN NOT NULL DEFAULT FALSE,
         temp_min DOUBLE PRECISION,
         temp_max DOUBLE PRECISION,
         distance_km DOUBLE PRECISION NOT NULL,
         base_price DOUBLE PRECISION NOT NULL,
         commission_rate DOUBLE PRECISION NOT NULL,
         commission_amount DOUBLE PRECISION NOT NULL,
         vat_rate DOUBLE PRECISION NOT NULL,
         vat_amount DOUBLE PRECISION NOT NULL,
         final_price DOUBLE PRECISION NOT NULL,
         confirmation_document_url TEXT,
         cmr_document_url TEXT,
         pickup_photo_url TEXT,
         pickup_signature_url TEXT,
         loading_notes TEXT,
         special_instructions TEXT,
         created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
         updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
     )",
    "CREATE TABLE IF NOT EXISTS mission_acceptances (
         id UUID PRIMARY KEY,
         mission_id UUID NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
         carrier_id UUID NOT NULL REFERENCES users(id),
         status TEXT NOT NULL DEFAULT 'PENDING',
         message TEXT,
         created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
         updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
         UNIQUE (mission_id, carrier_id)
     )",
    "CREATE TABLE IF NOT EXISTS payments (
         id UUID PRIMARY KEY,
         mission_id UUID NOT NULL UNIQUE REFERENCES missions(id) ON DELETE CASCADE,
         shipper_id UUID NOT NULL REFERENCES users(id),
         amount DOUBLE PRECISION NOT NULL,
         currency TEXT NOT NULL,
         status TEXT NOT NULL DEFAULT 'PENDING',
         provider TEXT NOT NULL,
         checkout_session_id TEXT,
         checkout_url TEXT,
         provider_reference TEXT,
         session_expires_at TIMESTAMPTZ,
         commission_rate DOUBLE PRECISION NOT NULL,
         commission_amount DOUBLE PRECISION NOT NULL,
         metadata JSONB,
         created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
         updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
     )",
    "CREATE TABLE IF NOT EXISTS payment_transactions (
         id BIGSERIAL PRIMARY KEY,
         user_id UUID NOT NULL,
         mission_id UUID NOT NULL,
         type TEXT NOT NULL,
         provider TEXT NOT NULL,
         reference_number TEXT NOT NULL,
         status TEXT NOT NULL,
         raw_status TEXT,
         amount DOUBLE PRECISION NOT NULL,
         currency TEXT NOT NULL,
         paid_amount DOUBLE PRECISION NOT NULL,
         paid_currency TEXT NOT NULL,
         created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
     )",
    "CREATE TABLE IF NOT EXISTS mission_timeline (
         id BIGSERIAL PRIMARY KEY,
         mission_id UUID NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
         event TEXT NOT NULL,
         user_id UUID,
         description TEXT,
         created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
     )",
    "CREATE TABLE IF NOT EXISTS tracking_points (
         id BIGSERIAL PRIMARY KEY,
         mission_id UUID NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
         latitude DOUBLE PRECISION NOT NULL,
         longitude DOUBLE PRECISION NOT NULL,
         speed DOUBLE PRECISION,
         heading DOUBLE PRECISION,
         accuracy DOUBLE PRECISION,
         created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
     )",
    "CREATE INDEX IF NOT EXISTS idx_missions_status ON missions (status)",
    "CREATE INDEX IF NOT EXISTS idx_missions_shipper ON missions (shipper_id)",
    "CREATE INDEX IF NOT EXISTS idx_missions_carrier ON missions (carrier_id)",
    "CREATE INDEX IF NOT EXISTS idx_acceptances_mission ON mission_acceptances (mission_id)",
    "CREATE INDEX IF NOT EXISTS idx_timeline_mission ON mission_timeline (mission_id)",
    "CREATE INDEX IF NOT EXISTS idx_tracking_mission ON tracking_points (mission_id)",
];

impl FreightDb {
    /// # Errors
    /// Returns [`FreightError::DatabaseError`] when a statement fails.
    pub async fn setup_schema(&self) -> Result<()> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement)
                .execute(self.pool())
                .await
                .map_err(|e| {
                    FreightError::DatabaseError(format!("Failed to apply schema: {e}"))
                })?;
        }
        Ok(())
    }
}
