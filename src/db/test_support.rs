#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::uninlined_format_args
)]

//! Shared harness for DB-backed tests: pool bootstrap from the environment,
//! schema reset, seed records and in-memory collaborator fakes.

use crate::db::FreightDb;
use crate::error::{FreightError, Result};
use crate::external::{
    DocumentGenerator, Notifier, ObjectStorage, Party, PaymentProvider, ProviderSession,
};
use crate::types::{
    Cargo, Mission, NewMission, Role, ShipmentClass, Stop, User, UserId,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

fn required_test_database_url() -> String {
    std::env::var("FREIGHT_TEST_DATABASE_URL")
        .ok()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| {
            unreachable!("Set FREIGHT_TEST_DATABASE_URL or DATABASE_URL for DB integration tests")
        })
}

pub(crate) async fn test_db() -> FreightDb {
    let url = required_test_database_url();
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(&url)
        .await
        .unwrap_or_else(|e| unreachable!("Failed to connect test database: {}", e));
    let db = FreightDb::new_with_pool(pool);
    db.setup_schema()
        .await
        .unwrap_or_else(|e| panic!("schema setup failed: {}", e));
    db
}

/// Wipe all runtime rows between tests. Users go too; every test reseeds
/// its own participants.
pub(crate) async fn reset_tables(db: &FreightDb) {
    sqlx::raw_sql(
        "TRUNCATE tracking_points, mission_timeline, payment_transactions,
                  payments, mission_acceptances, missions, users CASCADE",
    )
    .execute(db.pool())
    .await
    .unwrap_or_else(|e| panic!("reset failed: {}", e));
}

pub(crate) async fn seed_shipper(db: &FreightDb, name: &str) -> User {
    db.create_user(name, Role::Shipper)
        .await
        .unwrap_or_else(|e| panic!("seed shipper failed: {}", e))
}

pub(crate) async fn seed_carrier(db: &FreightDb, name: &str) -> User {
    db.create_user(name, Role::Carrier)
        .await
        .unwrap_or_else(|e| panic!("seed carrier failed: {}", e))
}

pub(crate) fn sample_mission_input(distance_km: f64) -> NewMission {
    NewMission {
        shipment_class: ShipmentClass::Standard,
        pickup: Stop {
            address: "12 Quai de la Loire".to_string(),
            city: "Paris".to_string(),
            contact_name: "Marie Petit".to_string(),
            contact_phone: "+33 1 40 00 00 01".to_string(),
            instructions: Some("Ring at the loading dock".to_string()),
        },
        delivery: Stop {
            address: "3 Rue de la Bourse".to_string(),
            city: "Lyon".to_string(),
            contact_name: "Jean Robert".to_string(),
            contact_phone: "+33 4 72 00 00 02".to_string(),
            instructions: None,
        },
        pickup_date: Utc::now() + Duration::days(2),
        delivery_date: Some(Utc::now() + Duration::days(3)),
        cargo: Cargo {
            goods_type: "PALLETS".to_string(),
            weight_kg: 450.0,
            volume_m3: 2.4,
            length_m: None,
            width_m: None,
            height_m: None,
            fragile: false,
            temp_min: None,
            temp_max: None,
        },
        distance_km,
    }
}

/// Drive a freshly created mission through payment into SEARCHING_CARRIER.
pub(crate) async fn open_for_bidding(db: &FreightDb, mission: &Mission) {
    let provider = FakePaymentProvider::default();
    let session = db
        .confirm_mission(mission.id, mission.shipper_id, &provider)
        .await
        .unwrap_or_else(|e| panic!("confirm failed: {}", e));
    let outcome = db
        .record_payment_settled(&provider.settled_event(mission, &session.session_id))
        .await
        .unwrap_or_else(|e| panic!("settle failed: {}", e));
    assert_eq!(outcome, crate::types::ReconcileOutcome::Settled);
}

#[derive(Default)]
pub(crate) struct FakePaymentProvider {
    counter: AtomicU64,
}

impl FakePaymentProvider {
    pub(crate) fn settled_event(
        &self,
        mission: &Mission,
        session_id: &str,
    ) -> crate::types::ProviderPaymentEvent {
        crate::types::ProviderPaymentEvent {
            provider: self.name().to_string(),
            provider_reference: format!("pi_{}", session_id),
            mission_id: mission.id,
            shipper_id: mission.shipper_id,
            paid_amount: mission.pricing.final_price,
            paid_currency: "EUR".to_string(),
            raw_status: "paid".to_string(),
        }
    }

    pub(crate) fn failed_event(
        &self,
        mission: &Mission,
        session_id: &str,
    ) -> crate::types::ProviderPaymentEvent {
        crate::types::ProviderPaymentEvent {
            provider: self.name().to_string(),
            provider_reference: format!("pi_{}", session_id),
            mission_id: mission.id,
            shipper_id: mission.shipper_id,
            paid_amount: 0.0,
            paid_currency: "EUR".to_string(),
            raw_status: "failed".to_string(),
        }
    }
}

#[async_trait]
impl PaymentProvider for FakePaymentProvider {
    fn name(&self) -> &'static str {
        "FAKE"
    }

    async fn create_checkout_session(
        &self,
        mission: &Mission,
        _payer: UserId,
    ) -> Result<ProviderSession> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderSession {
            session_id: format!("cs_test_{}_{}", mission.id, n),
            checkout_url: format!("https://pay.test/session/{}/{}", mission.id, n),
        })
    }
}

/// Document fake with independently failable confirmation and CMR renders.
#[derive(Default)]
pub(crate) struct FakeDocuments {
    pub fail_confirmation: AtomicBool,
    pub fail_cmr: AtomicBool,
}

#[async_trait]
impl DocumentGenerator for FakeDocuments {
    async fn render_confirmation(
        &self,
        mission: &Mission,
        _shipper: &Party,
        _carrier: &Party,
    ) -> Result<String> {
        if self.fail_confirmation.load(Ordering::SeqCst) {
            return Err(FreightError::CollaboratorError(
                "confirmation render unavailable".to_string(),
            ));
        }
        Ok(format!("https://docs.test/confirmation/{}.pdf", mission.id))
    }

    async fn render_cmr(
        &self,
        mission: &Mission,
        _shipper: &Party,
        _carrier: &Party,
        _signature_url: Option<&str>,
    ) -> Result<String> {
        if self.fail_cmr.load(Ordering::SeqCst) {
            return Err(FreightError::CollaboratorError(
                "CMR render unavailable".to_string(),
            ));
        }
        Ok(format!("https://docs.test/cmr/{}.pdf", mission.id))
    }
}

/// Storage fake keeping blobs in a mutex-guarded map.
#[derive(Default)]
pub(crate) struct MemoryStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub(crate) fn stored_count(&self) -> usize {
        self.blobs.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.blobs
            .lock()
            .map_err(|_| FreightError::Internal("storage mutex poisoned".to_string()))?
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("https://storage.test/{}", path)
    }
}

/// Notifier fake recording delivered messages.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub sent: Mutex<Vec<(UserId, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user: UserId, message: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FreightError::CollaboratorError(
                "push gateway unavailable".to_string(),
            ));
        }
        self.sent
            .lock()
            .map_err(|_| FreightError::Internal("notifier mutex poisoned".to_string()))?
            .push((user, message.to_string()));
        Ok(())
    }
}
