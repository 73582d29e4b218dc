#![allow(
    dead_code,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::uninlined_format_args
)]

//! Harness shared by the integration suites: database bootstrap from the
//! environment plus in-process collaborator fakes.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use freightline::{
    Cargo, DocumentGenerator, FreightDb, FreightError, Mission, NewMission, Notifier, ObjectStorage,
    Party, PaymentProvider, ProviderPaymentEvent, ProviderSession, Result, Role, ShipmentClass,
    Stop, User, UserId,
};
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub fn required_test_database_url() -> String {
    std::env::var("FREIGHT_TEST_DATABASE_URL")
        .ok()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| {
            unreachable!("Set FREIGHT_TEST_DATABASE_URL or DATABASE_URL for DB integration tests")
        })
}

pub async fn test_db() -> FreightDb {
    let url = required_test_database_url();
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .unwrap_or_else(|e| unreachable!("Failed to connect test database: {}", e));
    let db = FreightDb::new_with_pool(pool);
    db.setup_schema()
        .await
        .unwrap_or_else(|e| panic!("schema setup failed: {}", e));
    db
}

pub async fn reset_tables(db: &FreightDb) {
    sqlx::raw_sql(
        "TRUNCATE tracking_points, mission_timeline, payment_transactions,
                  payments, mission_acceptances, missions, users CASCADE",
    )
    .execute(db.pool())
    .await
    .unwrap_or_else(|e| panic!("reset failed: {}", e));
}

pub async fn seed_user(db: &FreightDb, name: &str, role: Role) -> User {
    db.create_user(name, role)
        .await
        .unwrap_or_else(|e| panic!("seed user failed: {}", e))
}

pub fn standard_mission(distance_km: f64) -> NewMission {
    NewMission {
        shipment_class: ShipmentClass::Standard,
        pickup: Stop {
            address: "18 Rue du Port".to_string(),
            city: "Nantes".to_string(),
            contact_name: "Claire Fabre".to_string(),
            contact_phone: "+33 2 40 00 00 03".to_string(),
            instructions: None,
        },
        delivery: Stop {
            address: "27 Avenue des Docks".to_string(),
            city: "Rennes".to_string(),
            contact_name: "Paul Noyer".to_string(),
            contact_phone: "+33 2 99 00 00 04".to_string(),
            instructions: Some("Call on arrival".to_string()),
        },
        pickup_date: Utc::now() + Duration::days(1),
        delivery_date: Some(Utc::now() + Duration::days(2)),
        cargo: Cargo {
            goods_type: "MACHINERY".to_string(),
            weight_kg: 800.0,
            volume_m3: 0.0,
            length_m: Some(2.0),
            width_m: Some(1.5),
            height_m: Some(1.0),
            fragile: true,
            temp_min: None,
            temp_max: None,
        },
        distance_km,
    }
}

#[derive(Default)]
pub struct FakePaymentProvider {
    counter: AtomicU64,
}

impl FakePaymentProvider {
    pub fn settled_event(&self, mission: &Mission, session_id: &str) -> ProviderPaymentEvent {
        ProviderPaymentEvent {
            provider: self.name().to_string(),
            provider_reference: format!("pi_{}", session_id),
            mission_id: mission.id,
            shipper_id: mission.shipper_id,
            paid_amount: mission.pricing.final_price,
            paid_currency: "EUR".to_string(),
            raw_status: "paid".to_string(),
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

#[derive(Default)]
pub struct FakeDocuments;

#[async_trait]
impl DocumentGenerator for FakeDocuments {
    async fn render_confirmation(
        &self,
        mission: &Mission,
        _shipper: &Party,
        _carrier: &Party,
    ) -> Result<String> {
        Ok(format!("https://docs.test/confirmation/{}.pdf", mission.id))
    }

    async fn render_cmr(
        &self,
        mission: &Mission,
        _shipper: &Party,
        _carrier: &Party,
        _signature_url: Option<&str>,
    ) -> Result<String> {
        Ok(format!("https://docs.test/cmr/{}.pdf", mission.id))
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
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

#[derive(Default)]
pub struct SilentNotifier;

#[async_trait]
impl Notifier for SilentNotifier {
    async fn notify(&self, _user: UserId, _message: &str) -> Result<()> {
        Ok(())
    }
}
