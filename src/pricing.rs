#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

//! Pure pricing engine: distance + shipment class in, full price breakdown
//! out. Every figure is rounded to cents at its own stage so the stored
//! intermediates reproduce the computation exactly.

use crate::error::{FreightError, Result};
use crate::types::ShipmentClass;
use serde::{Deserialize, Serialize};

/// Base rate per kilometer for standard shipments.
pub const STANDARD_RATE_PER_KM: f64 = 0.70;
/// Base rate per kilometer for express shipments (fixed surcharge multiplier).
pub const EXPRESS_RATE_PER_KM: f64 = 1.20;
/// Platform commission, a fixed percentage of the base price.
pub const COMMISSION_RATE: f64 = 0.15;
/// VAT applied to (base + commission).
pub const VAT_RATE: f64 = 0.20;
/// Rate used when redistributing a manual price override between base and
/// commission.
pub const OVERRIDE_COMMISSION_RATE: f64 = 0.10;

/// Round to the currency's minor unit (cents).
#[must_use]
pub fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub base_price: f64,
    pub commission_rate: f64,
    pub commission_amount: f64,
    pub vat_rate: f64,
    pub vat_amount: f64,
    pub final_price: f64,
}

/// # Errors
/// Returns [`FreightError::ValidationFailed`] for a non-positive distance.
pub fn quote(distance_km: f64, class: ShipmentClass) -> Result<Quote> {
    if !distance_km.is_finite() || distance_km <= 0.0 {
        return Err(FreightError::ValidationFailed(format!(
            "Distance must be positive, got {distance_km}"
        )));
    }

    let rate = match class {
        ShipmentClass::Standard => STANDARD_RATE_PER_KM,
        ShipmentClass::Express => EXPRESS_RATE_PER_KM,
    };

    let base_price = round_to_cents(distance_km * rate);
    let commission_amount = round_to_cents(base_price * COMMISSION_RATE);
    let vat_amount = round_to_cents((base_price + commission_amount) * VAT_RATE);
    let final_price = round_to_cents(base_price + commission_amount + vat_amount);

    Ok(Quote {
        base_price,
        commission_rate: COMMISSION_RATE,
        commission_amount,
        vat_rate: VAT_RATE,
        vat_amount,
        final_price,
    })
}

/// Redistribution of a manual price override: the new final price is split
/// into base and commission at [`OVERRIDE_COMMISSION_RATE`]. VAT fields keep
/// their creation-time values and are not recomputed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceOverride {
    pub base_price: f64,
    pub commission_amount: f64,
    pub final_price: f64,
}

#[must_use]
pub fn split_override(new_price: f64) -> PriceOverride {
    let base_price = round_to_cents(new_price / (1.0 + OVERRIDE_COMMISSION_RATE));
    PriceOverride {
        base_price,
        commission_amount: round_to_cents(new_price - base_price),
        final_price: round_to_cents(new_price),
    }
}
