mod acceptance;
mod actor;
mod filters;
mod identifiers;
mod mission;
mod payment;
mod timeline;
mod tracking;

pub use acceptance::{AcceptanceStatus, MissionAcceptance};
pub use actor::{Role, User};
pub use filters::{MissionFilter, Paged, Pagination};
pub use identifiers::{AcceptanceId, MissionId, PaymentId, UserId};
pub use mission::{
    Cargo, Mission, MissionPricing, MissionStatus, NewMission, ShipmentClass, Stop,
};
pub use payment::{
    CheckoutSession, Payment, PaymentStatus, ProviderPaymentEvent, ReconcileOutcome,
};
pub use timeline::TimelineEntry;
pub use tracking::{TrackedPosition, TrackingPoint, TrackingSample};
