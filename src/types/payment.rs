use super::identifiers::{MissionId, PaymentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    /// Funds captured by the provider and held in escrow.
    Completed,
    Failed,
}

impl PaymentStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Unknown payment status: {s}")),
        }
    }
}

/// One escrow record per mission, created lazily on first confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub mission_id: MissionId,
    pub shipper_id: UserId,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub provider: String,
    pub checkout_session_id: Option<String>,
    pub checkout_url: Option<String>,
    /// Provider-side capture reference, set by reconciliation.
    pub provider_reference: Option<String>,
    pub session_expires_at: Option<DateTime<Utc>>,
    pub commission_rate: f64,
    pub commission_amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    #[must_use]
    pub fn has_live_session(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pending
            && self.session_expires_at.is_some_and(|expiry| now < expiry)
    }
}

/// Outcome of confirming a mission: the checkout session the shipper should
/// be sent to. A live unexpired session is returned unchanged on re-confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub checkout_url: String,
    pub reused: bool,
}

/// Asynchronous provider callback payload. `mission_id` and `shipper_id`
/// echo the metadata supplied at session creation and drive the
/// reconciliation lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPaymentEvent {
    pub provider: String,
    pub provider_reference: String,
    pub mission_id: MissionId,
    pub shipper_id: UserId,
    pub paid_amount: f64,
    pub paid_currency: String,
    pub raw_status: String,
}

/// Result of reconciling a provider event. Duplicates and stale events are
/// not errors; they are logged no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Payment captured; mission advanced to carrier search.
    Settled,
    /// No pending payment matched the event (already processed or stale).
    NoOp,
}
