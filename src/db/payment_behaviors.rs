// BDD-style tests for payment escrow behaviors.
// Focus on session reuse, settlement idempotency and event matching.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::uninlined_format_args
)]

use super::test_support::{
    reset_tables, sample_mission_input, seed_shipper, test_db, FakePaymentProvider,
};
use crate::error::FreightError;
use crate::types::{MissionStatus, PaymentStatus, ReconcileOutcome};
use futures_util::future::join;

mod checkout_sessions {

    mod when_the_shipper_confirms_a_new_mission {
        use super::super::*;

        #[tokio::test]
        #[ignore = "requires DATABASE_URL or FREIGHT_TEST_DATABASE_URL"]
        async fn then_a_session_opens_and_the_mission_awaits_payment() {
            // Given
            let db = test_db().await;
            reset_tables(&db).await;
            let provider = FakePaymentProvider::default();

            let shipper = seed_shipper(&db, "Paying Shipper").await;
            let mission = db
                .create_mission(&sample_mission_input(100.0), shipper.id)
                .await
                .unwrap_or_else(|e| panic!("create failed: {}", e));
            assert_eq!(mission.status, MissionStatus::Created);

            // When
            let session = db
                .confirm_mission(mission.id, shipper.id, &provider)
                .await
                .unwrap_or_else(|e| panic!("confirm failed: {}", e));

            // Then
            assert!(!session.reused);

            let reloaded = db
                .get_mission(mission.id)
                .await
                .unwrap_or_else(|e| panic!("get failed: {}", e));
            assert_eq!(reloaded.status, MissionStatus::PaymentPending);

            let payment = db
                .get_payment(mission.id)
                .await
                .unwrap_or_else(|e| panic!("payment lookup failed: {}", e))
                .unwrap_or_else(|| panic!("payment row missing"));
            assert_eq!(payment.status, PaymentStatus::Pending);
            assert_eq!(payment.amount, mission.pricing.final_price);
            assert_eq!(payment.currency, "EUR");
            assert!(payment.session_expires_at.is_some());
        }
    }

    mod when_the_shipper_confirms_again_with_a_live_session {
        use super::super::*;

        #[tokio::test]
        #[ignore = "requires DATABASE_URL or FREIGHT_TEST_DATABASE_URL"]
        async fn then_the_existing_session_is_returned_unchanged() {
            let db = test_db().await;
            reset_tables(&db).await;
            let provider = FakePaymentProvider::default();

            let shipper = seed_shipper(&db, "Impatient Shipper").await;
            let mission = db
                .create_mission(&sample_mission_input(100.0), shipper.id)
                .await
                .unwrap_or_else(|e| panic!("create failed: {}", e));

            let first = db
                .confirm_mission(mission.id, shipper.id, &provider)
                .await
                .unwrap_or_else(|e| panic!("confirm failed: {}", e));
            let second = db
                .confirm_mission(mission.id, shipper.id, &provider)
                .await
                .unwrap_or_else(|e| panic!("re-confirm failed: {}", e));

            assert!(second.reused);
            assert_eq!(second.session_id, first.session_id);
            assert_eq!(second.checkout_url, first.checkout_url);
        }
    }

    mod when_the_session_has_expired {
        use super::super::*;

        #[tokio::test]
        #[ignore = "requires DATABASE_URL or FREIGHT_TEST_DATABASE_URL"]
        async fn then_a_fresh_session_replaces_it() {
            let db = test_db().await;
            reset_tables(&db).await;
            let provider = FakePaymentProvider::default();

            let shipper = seed_shipper(&db, "Slow Shipper").await;
            let mission = db
                .create_mission(&sample_mission_input(100.0), shipper.id)
                .await
                .unwrap_or_else(|e| panic!("create failed: {}", e));
            let first = db
                .confirm_mission(mission.id, shipper.id, &provider)
                .await
                .unwrap_or_else(|e| panic!("confirm failed: {}", e));

            // Force the session past its deadline
            sqlx::query(
                "UPDATE payments SET session_expires_at = NOW() - INTERVAL '1 hour'
                 WHERE mission_id = $1",
            )
            .bind(mission.id.value())
            .execute(db.pool())
            .await
            .unwrap_or_else(|e| panic!("expire failed: {}", e));

            let second = db
                .confirm_mission(mission.id, shipper.id, &provider)
                .await
                .unwrap_or_else(|e| panic!("re-confirm failed: {}", e));

            assert!(!second.reused);
            assert_ne!(second.session_id, first.session_id);

            // Still a single row per mission
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE mission_id = $1")
                    .bind(mission.id.value())
                    .fetch_one(db.pool())
                    .await
                    .unwrap_or_else(|e| panic!("count failed: {}", e));
            assert_eq!(count, 1);
        }
    }

    mod when_someone_else_confirms_the_mission {
        use super::super::*;

        #[tokio::test]
        #[ignore = "requires DATABASE_URL or FREIGHT_TEST_DATABASE_URL"]
        async fn then_confirmation_is_forbidden() {
            let db = test_db().await;
            reset_tables(&db).await;
            let provider = FakePaymentProvider::default();

            let shipper = seed_shipper(&db, "Owner").await;
            let other = seed_shipper(&db, "Someone Else").await;
            let mission = db
                .create_mission(&sample_mission_input(100.0), shipper.id)
                .await
                .unwrap_or_else(|e| panic!("create failed: {}", e));

            let result = db.confirm_mission(mission.id, other.id, &provider).await;
            assert!(matches!(result, Err(FreightError::Forbidden(_))));
        }
    }
}

mod settlement {

    mod when_the_provider_reports_a_successful_payment {
        use super::super::*;

        #[tokio::test]
        #[ignore = "requires DATABASE_URL or FREIGHT_TEST_DATABASE_URL"]
        async fn then_escrow_settles_and_the_mission_opens_for_bidding() {
            // Given
            let db = test_db().await;
            reset_tables(&db).await;
            let provider = FakePaymentProvider::default();

            let shipper = seed_shipper(&db, "Settled Shipper").await;
            let mission = db
                .create_mission(&sample_mission_input(50.0), shipper.id)
                .await
                .unwrap_or_else(|e| panic!("create failed: {}", e));
            let session = db
                .confirm_mission(mission.id, shipper.id, &provider)
                .await
                .unwrap_or_else(|e| panic!("confirm failed: {}", e));

            // When
            let event = provider.settled_event(&mission, &session.session_id);
            let outcome = db
                .record_payment_settled(&event)
                .await
                .unwrap_or_else(|e| panic!("settle failed: {}", e));

            // Then
            assert_eq!(outcome, ReconcileOutcome::Settled);

            let reloaded = db
                .get_mission(mission.id)
                .await
                .unwrap_or_else(|e| panic!("get failed: {}", e));
            assert_eq!(reloaded.status, MissionStatus::SearchingCarrier);

            let payment = db
                .get_payment(mission.id)
                .await
                .unwrap_or_else(|e| panic!("payment lookup failed: {}", e))
                .unwrap_or_else(|| panic!("payment row missing"));
            assert_eq!(payment.status, PaymentStatus::Completed);
            assert_eq!(payment.provider_reference, Some(event.provider_reference.clone()));

            let ledger_rows: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM payment_transactions WHERE mission_id = $1",
            )
            .bind(mission.id.value())
            .fetch_one(db.pool())
            .await
            .unwrap_or_else(|e| panic!("count failed: {}", e));
            assert_eq!(ledger_rows, 1);
        }
    }

    mod when_the_same_event_arrives_twice {
        use super::super::*;

        #[tokio::test]
        #[ignore = "requires DATABASE_URL or FREIGHT_TEST_DATABASE_URL"]
        async fn then_the_duplicate_is_a_noop_with_one_ledger_row() {
            let db = test_db().await;
            reset_tables(&db).await;
            let provider = FakePaymentProvider::default();

            let shipper = seed_shipper(&db, "Deduped Shipper").await;
            let mission = db
                .create_mission(&sample_mission_input(50.0), shipper.id)
                .await
                .unwrap_or_else(|e| panic!("create failed: {}", e));
            let session = db
                .confirm_mission(mission.id, shipper.id, &provider)
                .await
                .unwrap_or_else(|e| panic!("confirm failed: {}", e));

            let event = provider.settled_event(&mission, &session.session_id);
            let first = db
                .record_payment_settled(&event)
                .await
                .unwrap_or_else(|e| panic!("settle failed: {}", e));
            let second = db
                .record_payment_settled(&event)
                .await
                .unwrap_or_else(|e| panic!("re-settle failed: {}", e));

            assert_eq!(first, ReconcileOutcome::Settled);
            assert_eq!(second, ReconcileOutcome::NoOp);

            let ledger_rows: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM payment_transactions WHERE mission_id = $1",
            )
            .bind(mission.id.value())
            .fetch_one(db.pool())
            .await
            .unwrap_or_else(|e| panic!("count failed: {}", e));
            assert_eq!(ledger_rows, 1);
        }
    }

    mod when_a_reconfirm_races_the_settlement {
        use super::super::*;

        #[tokio::test]
        #[ignore = "requires DATABASE_URL or FREIGHT_TEST_DATABASE_URL"]
        async fn then_both_finish_cleanly_and_escrow_settles_once() {
            // Given
            let db = test_db().await;
            reset_tables(&db).await;
            let provider = FakePaymentProvider::default();

            let shipper = seed_shipper(&db, "Racing Shipper").await;
            let mission = db
                .create_mission(&sample_mission_input(50.0), shipper.id)
                .await
                .unwrap_or_else(|e| panic!("create failed: {}", e));
            let session = db
                .confirm_mission(mission.id, shipper.id, &provider)
                .await
                .unwrap_or_else(|e| panic!("confirm failed: {}", e));
            let event = provider.settled_event(&mission, &session.session_id);

            // When - the shipper re-confirms while the provider event lands
            let (reconfirm, settle) = join(
                db.confirm_mission(mission.id, shipper.id, &provider),
                db.record_payment_settled(&event),
            )
            .await;

            // Then - no transaction aborts; whichever side ran second saw
            // the other's outcome
            let outcome = settle.unwrap_or_else(|e| panic!("settle failed: {}", e));
            assert_eq!(outcome, ReconcileOutcome::Settled);
            match reconfirm {
                Ok(reused_session) => {
                    assert!(reused_session.reused);
                    assert_eq!(reused_session.session_id, session.session_id);
                }
                Err(FreightError::InvalidState(_)) => {}
                Err(other) => panic!("unexpected re-confirm failure: {}", other),
            }

            let reloaded = db
                .get_mission(mission.id)
                .await
                .unwrap_or_else(|e| panic!("get failed: {}", e));
            assert_eq!(reloaded.status, MissionStatus::SearchingCarrier);

            let payment = db
                .get_payment(mission.id)
                .await
                .unwrap_or_else(|e| panic!("payment lookup failed: {}", e))
                .unwrap_or_else(|| panic!("payment row missing"));
            assert_eq!(payment.status, PaymentStatus::Completed);

            let ledger_rows: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM payment_transactions WHERE mission_id = $1",
            )
            .bind(mission.id.value())
            .fetch_one(db.pool())
            .await
            .unwrap_or_else(|e| panic!("count failed: {}", e));
            assert_eq!(ledger_rows, 1);
        }
    }

    mod when_no_pending_payment_matches_the_event {
        use super::super::*;

        #[tokio::test]
        #[ignore = "requires DATABASE_URL or FREIGHT_TEST_DATABASE_URL"]
        async fn then_the_event_is_ignored() {
            let db = test_db().await;
            reset_tables(&db).await;
            let provider = FakePaymentProvider::default();

            let shipper = seed_shipper(&db, "Shipper").await;
            let mission = db
                .create_mission(&sample_mission_input(50.0), shipper.id)
                .await
                .unwrap_or_else(|e| panic!("create failed: {}", e));

            // No confirm, no payment row
            let event = provider.settled_event(&mission, "cs_unknown");
            let outcome = db
                .record_payment_settled(&event)
                .await
                .unwrap_or_else(|e| panic!("settle failed: {}", e));

            assert_eq!(outcome, ReconcileOutcome::NoOp);
            let reloaded = db
                .get_mission(mission.id)
                .await
                .unwrap_or_else(|e| panic!("get failed: {}", e));
            assert_eq!(reloaded.status, MissionStatus::Created);
        }
    }

    mod when_the_provider_reports_a_failed_payment {
        use super::super::*;
        use crate::db::FreightDb;

        #[tokio::test]
        #[ignore = "requires DATABASE_URL or FREIGHT_TEST_DATABASE_URL"]
        async fn then_the_session_stays_open_for_another_attempt() {
            let db = test_db().await;
            reset_tables(&db).await;
            let provider = FakePaymentProvider::default();

            let shipper = seed_shipper(&db, "Retrying Shipper").await;
            let mission = db
                .create_mission(&sample_mission_input(50.0), shipper.id)
                .await
                .unwrap_or_else(|e| panic!("create failed: {}", e));
            let session = db
                .confirm_mission(mission.id, shipper.id, &provider)
                .await
                .unwrap_or_else(|e| panic!("confirm failed: {}", e));

            FreightDb::record_payment_unsettled(&provider.failed_event(&mission, &session.session_id));

            // Nothing moved; the shipper can still pay through the same session
            let reloaded = db
                .get_mission(mission.id)
                .await
                .unwrap_or_else(|e| panic!("get failed: {}", e));
            assert_eq!(reloaded.status, MissionStatus::PaymentPending);

            let payment = db
                .get_payment(mission.id)
                .await
                .unwrap_or_else(|e| panic!("payment lookup failed: {}", e))
                .unwrap_or_else(|| panic!("payment row missing"));
            assert_eq!(payment.status, PaymentStatus::Pending);

            let retry = db
                .confirm_mission(mission.id, shipper.id, &provider)
                .await
                .unwrap_or_else(|e| panic!("re-confirm failed: {}", e));
            assert!(retry.reused);
        }
    }

    mod when_the_provider_reference_is_attached {
        use super::super::*;

        #[tokio::test]
        #[ignore = "requires DATABASE_URL or FREIGHT_TEST_DATABASE_URL"]
        async fn then_it_lands_on_the_payment_row() {
            let db = test_db().await;
            reset_tables(&db).await;
            let provider = FakePaymentProvider::default();

            let shipper = seed_shipper(&db, "Shipper").await;
            let mission = db
                .create_mission(&sample_mission_input(50.0), shipper.id)
                .await
                .unwrap_or_else(|e| panic!("create failed: {}", e));
            let session = db
                .confirm_mission(mission.id, shipper.id, &provider)
                .await
                .unwrap_or_else(|e| panic!("confirm failed: {}", e));

            db.attach_provider_reference(&session.session_id, "pi_attached")
                .await
                .unwrap_or_else(|e| panic!("attach failed: {}", e));

            let payment = db
                .get_payment(mission.id)
                .await
                .unwrap_or_else(|e| panic!("payment lookup failed: {}", e))
                .unwrap_or_else(|| panic!("payment row missing"));
            assert_eq!(payment.provider_reference.as_deref(), Some("pi_attached"));

            let missing = db.attach_provider_reference("cs_missing", "pi_x").await;
            assert!(matches!(missing, Err(FreightError::NotFound(_))));
        }
    }
}
