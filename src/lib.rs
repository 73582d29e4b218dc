pub mod config;
pub mod db;
pub mod error;
pub mod external;
pub mod pricing;
pub mod types;

pub use db::{FreightDb, PickupConfirmation};
pub use error::{FreightError, Result};
pub use external::{
    DocumentGenerator, FsObjectStorage, Notifier, ObjectStorage, Party, PaymentProvider,
    ProviderSession, Upload,
};
pub use types::*;
