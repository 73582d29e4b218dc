#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use crate::error::{FreightError, Result};
use crate::types::{
    AcceptanceId, AcceptanceStatus, Cargo, Mission, MissionAcceptance, MissionId, MissionPricing,
    MissionStatus, Payment, PaymentId, PaymentStatus, Role, ShipmentClass, Stop, TimelineEntry,
    TrackingPoint, User, UserId,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub(super) struct MissionRow {
    pub id: Uuid,
    pub shipper_id: Uuid,
    pub carrier_id: Option<Uuid>,
    pub status: String,
    pub shipment_class: String,
    pub pickup_address: String,
    pub pickup_city: String,
    pub pickup_contact_name: String,
    pub pickup_contact_phone: String,
    pub pickup_instructions: Option<String>,
    pub delivery_address: String,
    pub delivery_city: String,
    pub delivery_contact_name: String,
    pub delivery_contact_phone: String,
    pub delivery_instructions: Option<String>,
    pub pickup_date: DateTime<Utc>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub goods_type: String,
    pub weight_kg: f64,
    pub volume_m3: f64,
    pub length_m: Option<f64>,
    pub width_m: Option<f64>,
    pub height_m: Option<f64>,
    pub fragile: bool,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub distance_km: f64,
    pub base_price: f64,
    pub commission_rate: f64,
    pub commission_amount: f64,
    pub vat_rate: f64,
    pub vat_amount: f64,
    pub final_price: f64,
    pub confirmation_document_url: Option<String>,
    pub cmr_document_url: Option<String>,
    pub pickup_photo_url: Option<String>,
    pub pickup_signature_url: Option<String>,
    pub loading_notes: Option<String>,
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MissionRow {
    pub fn into_mission(self) -> Result<Mission> {
        let status =
            MissionStatus::try_from(self.status.as_str()).map_err(FreightError::DatabaseError)?;
        let shipment_class = ShipmentClass::try_from(self.shipment_class.as_str())
            .map_err(FreightError::DatabaseError)?;
        Ok(Mission {
            id: MissionId::new(self.id),
            shipper_id: UserId::new(self.shipper_id),
            carrier_id: self.carrier_id.map(UserId::new),
            status,
            shipment_class,
            pickup: Stop {
                address: self.pickup_address,
                city: self.pickup_city,
                contact_name: self.pickup_contact_name,
                contact_phone: self.pickup_contact_phone,
                instructions: self.pickup_instructions,
            },
            delivery: Stop {
                address: self.delivery_address,
                city: self.delivery_city,
                contact_name: self.delivery_contact_name,
                contact_phone: self.delivery_contact_phone,
                instructions: self.delivery_instructions,
            },
            pickup_date: self.pickup_date,
            delivery_date: self.delivery_date,
            cargo: Cargo {
                goods_type: self.goods_type,
                weight_kg: self.weight_kg,
                volume_m3: self.volume_m3,
                length_m: self.length_m,
                width_m: self.width_m,
                height_m: self.height_m,
                fragile: self.fragile,
                temp_min: self.temp_min,
                temp_max: self.temp_max,
            },
            distance_km: self.distance_km,
            pricing: MissionPricing {
                base_price: self.base_price,
                commission_rate: self.commission_rate,
                commission_amount: self.commission_amount,
                vat_rate: self.vat_rate,
                vat_amount: self.vat_amount,
                final_price: self.final_price,
            },
            confirmation_document_url: self.confirmation_document_url,
            cmr_document_url: self.cmr_document_url,
            pickup_photo_url: self.pickup_photo_url,
            pickup_signature_url: self.pickup_signature_url,
            loading_notes: self.loading_notes,
            special_instructions: self.special_instructions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct AcceptanceRow {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub carrier_id: Uuid,
    pub status: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AcceptanceRow {
    pub fn into_acceptance(self) -> Result<MissionAcceptance> {
        let status =
            AcceptanceStatus::try_from(self.status.as_str()).map_err(FreightError::DatabaseError)?;
        Ok(MissionAcceptance {
            id: AcceptanceId::new(self.id),
            mission_id: MissionId::new(self.mission_id),
            carrier_id: UserId::new(self.carrier_id),
            status,
            message: self.message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct PaymentRow {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub shipper_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub provider: String,
    pub checkout_session_id: Option<String>,
    pub checkout_url: Option<String>,
    pub provider_reference: Option<String>,
    pub session_expires_at: Option<DateTime<Utc>>,
    pub commission_rate: f64,
    pub commission_amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRow {
    pub fn into_payment(self) -> Result<Payment> {
        let status =
            PaymentStatus::try_from(self.status.as_str()).map_err(FreightError::DatabaseError)?;
        Ok(Payment {
            id: PaymentId::new(self.id),
            mission_id: MissionId::new(self.mission_id),
            shipper_id: UserId::new(self.shipper_id),
            amount: self.amount,
            currency: self.currency,
            status,
            provider: self.provider,
            checkout_session_id: self.checkout_session_id,
            checkout_url: self.checkout_url,
            provider_reference: self.provider_reference,
            session_expires_at: self.session_expires_at,
            commission_rate: self.commission_rate,
            commission_amount: self.commission_amount,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct TimelineRow {
    pub id: i64,
    pub mission_id: Uuid,
    pub event: String,
    pub user_id: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TimelineRow {
    pub fn into_entry(self) -> Result<TimelineEntry> {
        let event =
            MissionStatus::try_from(self.event.as_str()).map_err(FreightError::DatabaseError)?;
        Ok(TimelineEntry {
            id: self.id,
            mission_id: MissionId::new(self.mission_id),
            event,
            user_id: self.user_id.map(UserId::new),
            description: self.description,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct TrackingRow {
    pub id: i64,
    pub mission_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl TrackingRow {
    pub fn into_point(self) -> TrackingPoint {
        TrackingPoint {
            id: self.id,
            mission_id: MissionId::new(self.mission_id),
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
            heading: self.heading,
            accuracy: self.accuracy,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub active: bool,
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        let role = Role::try_from(self.role.as_str()).map_err(FreightError::DatabaseError)?;
        Ok(User {
            id: UserId::new(self.id),
            name: self.name,
            role,
            active: self.active,
        })
    }
}
