use super::identifiers::{MissionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mission lifecycle status. Progression is one-way along the main chain;
/// the only backward edge is the assigned carrier's self-cancel, which
/// reopens an ACCEPTED mission for bidding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionStatus {
    Created,
    PaymentPending,
    PaymentConfirmed,
    SearchingCarrier,
    Accepted,
    PickupConfirmed,
    InTransit,
    Delivered,
    Completed,
    Cancelled,
    Disputed,
}

impl MissionStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::PaymentPending => "PAYMENT_PENDING",
            Self::PaymentConfirmed => "PAYMENT_CONFIRMED",
            Self::SearchingCarrier => "SEARCHING_CARRIER",
            Self::Accepted => "ACCEPTED",
            Self::PickupConfirmed => "PICKUP_CONFIRMED",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Disputed => "DISPUTED",
        }
    }

    /// The declared legal-transition table. Any status update outside these
    /// edges is rejected with `InvalidTransition`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::PaymentPending | Self::Cancelled)
                | (
                    Self::PaymentPending,
                    Self::PaymentConfirmed | Self::SearchingCarrier | Self::Cancelled
                )
                | (
                    Self::PaymentConfirmed,
                    Self::SearchingCarrier | Self::Cancelled
                )
                | (Self::SearchingCarrier, Self::Accepted | Self::Cancelled)
                // Accepted -> SearchingCarrier is the carrier self-cancel rollback.
                | (
                    Self::Accepted,
                    Self::PickupConfirmed | Self::SearchingCarrier | Self::Cancelled
                )
                | (Self::PickupConfirmed, Self::InTransit | Self::Disputed)
                | (Self::InTransit, Self::Delivered | Self::Disputed)
                | (Self::Delivered, Self::Completed | Self::Disputed)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses a caller may reach through the generic status update. The
    /// earlier edges carry coupled effects (carrier assignment, bid sweeps,
    /// payment reconciliation) and are owned by their dedicated operations.
    #[must_use]
    pub const fn directly_settable(self) -> bool {
        matches!(
            self,
            Self::InTransit | Self::Delivered | Self::Completed | Self::Disputed
        )
    }

    /// Statuses in which a carrier must be assigned (`carrier_id` non-null).
    #[must_use]
    pub const fn requires_carrier(self) -> bool {
        matches!(
            self,
            Self::Accepted
                | Self::PickupConfirmed
                | Self::InTransit
                | Self::Delivered
                | Self::Completed
        )
    }

    /// Statuses from which the shipper may cancel outright.
    #[must_use]
    pub const fn shipper_cancellable(self) -> bool {
        matches!(
            self,
            Self::Created
                | Self::PaymentPending
                | Self::PaymentConfirmed
                | Self::SearchingCarrier
                | Self::Accepted
        )
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for MissionStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "CREATED" => Ok(Self::Created),
            "PAYMENT_PENDING" => Ok(Self::PaymentPending),
            "PAYMENT_CONFIRMED" => Ok(Self::PaymentConfirmed),
            "SEARCHING_CARRIER" => Ok(Self::SearchingCarrier),
            "ACCEPTED" => Ok(Self::Accepted),
            "PICKUP_CONFIRMED" => Ok(Self::PickupConfirmed),
            "IN_TRANSIT" => Ok(Self::InTransit),
            "DELIVERED" => Ok(Self::Delivered),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            "DISPUTED" => Ok(Self::Disputed),
            _ => Err(format!("Unknown mission status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipmentClass {
    Standard,
    Express,
}

impl ShipmentClass {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Express => "EXPRESS",
        }
    }
}

impl fmt::Display for ShipmentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ShipmentClass {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "STANDARD" => Ok(Self::Standard),
            "EXPRESS" => Ok(Self::Express),
            _ => Err(format!("Unknown shipment class: {s}")),
        }
    }
}

/// One leg of the shipment: where, who to contact, when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub address: String,
    pub city: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cargo {
    pub goods_type: String,
    pub weight_kg: f64,
    pub volume_m3: f64,
    pub length_m: Option<f64>,
    pub width_m: Option<f64>,
    pub height_m: Option<f64>,
    pub fragile: bool,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
}

/// Pricing fields fixed at creation; mutable only through the explicit
/// price-override operation before confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MissionPricing {
    pub base_price: f64,
    pub commission_rate: f64,
    pub commission_amount: f64,
    pub vat_rate: f64,
    pub vat_amount: f64,
    pub final_price: f64,
}

/// The shipment order aggregate. `shipper_id` is immutable after creation;
/// `carrier_id` is set exactly once during matching and cleared only by
/// cancellation or the carrier self-cancel rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub shipper_id: UserId,
    pub carrier_id: Option<UserId>,
    pub status: MissionStatus,
    pub shipment_class: ShipmentClass,
    pub pickup: Stop,
    pub delivery: Stop,
    pub pickup_date: DateTime<Utc>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub cargo: Cargo,
    pub distance_km: f64,
    pub pricing: MissionPricing,
    pub confirmation_document_url: Option<String>,
    pub cmr_document_url: Option<String>,
    pub pickup_photo_url: Option<String>,
    pub pickup_signature_url: Option<String>,
    pub loading_notes: Option<String>,
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for mission creation. Distance comes from the
/// caller's distance backend; volume falls back to the box dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMission {
    pub shipment_class: ShipmentClass,
    pub pickup: Stop,
    pub delivery: Stop,
    pub pickup_date: DateTime<Utc>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub cargo: Cargo,
    pub distance_km: f64,
}

impl NewMission {
    /// Volume falls back to length * width * height when not supplied.
    #[must_use]
    pub fn effective_volume_m3(&self) -> f64 {
        if self.cargo.volume_m3 > 0.0 {
            return self.cargo.volume_m3;
        }
        match (self.cargo.length_m, self.cargo.width_m, self.cargo.height_m) {
            (Some(l), Some(w), Some(h)) => l * w * h,
            _ => 0.0,
        }
    }
}
