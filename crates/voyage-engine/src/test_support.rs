//! Shared fixtures for engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;
use voyage_core::{
    Booking, Customer, FirstPaymentRatio, Lead, Money, NewBooking, NewTranche, PaymentStatus,
    SalesUser, TrancheSlot, Trip,
};
use voyage_db::{Database, DbConfig};

use crate::lead_sync::{LeadStatusSync, LeadSyncError, StampLeadSync};
use crate::reconciliation::BookingService;

/// In-memory database with three customers, `trip-1` at 10,000.00,
/// `agent-1` earning 500.00 per head, `agent-0` earning nothing, and two
/// leads owned by `cust-1`.
pub(crate) async fn setup() -> Database {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let now = Utc::now();

    for (id, name) in [("cust-1", "Amal"), ("cust-2", "Badr"), ("cust-3", "Chen")] {
        db.customers()
            .insert(&Customer {
                id: id.to_string(),
                full_name: name.to_string(),
                created_at: now,
            })
            .await
            .unwrap();
    }

    db.trips()
        .insert(&Trip {
            id: "trip-1".to_string(),
            name: "Cappadocia Autumn".to_string(),
            base_price_cents: 1_000_000,
            created_at: now,
        })
        .await
        .unwrap();

    restore_sales_user(&db, "agent-1", Some(50_000)).await;
    restore_sales_user(&db, "agent-0", None).await;

    for id in ["lead-1", "lead-2"] {
        db.customers()
            .insert_lead(&Lead {
                id: id.to_string(),
                customer_id: "cust-1".to_string(),
                status: "contacted".to_string(),
                status_synced_at: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    db
}

/// Stores a booking on `trip-1` sold by `agent-1`, 50% ratio, first tranche
/// 5,000.00, in the given status.
pub(crate) async fn insert_booking(db: &Database, id: &str, customer_id: &str, status: PaymentStatus) {
    let now = Utc::now();
    let mut booking = Booking {
        id: id.to_string(),
        customer_id: customer_id.to_string(),
        trip_id: "trip-1".to_string(),
        sales_user_id: "agent-1".to_string(),
        referring_agent_id: None,
        lead_id: None,
        companion_customer_ids: Vec::new(),
        extra_single_cents: None,
        extra_bed_cents: None,
        extra_seat_cents: None,
        extra_bag_cents: None,
        discount_cents: None,
        first_payment_ratio: FirstPaymentRatio::Half,
        payment_status: status,
        first_payment: None,
        second_payment: None,
        third_payment: None,
        created_at: now,
        updated_at: now,
    };
    booking
        .add_tranche(TrancheSlot::First, NewTranche::new(Money::from_cents(500_000), now))
        .unwrap();
    db.bookings().insert(&booking).await.unwrap();
}

/// A 50% booking request on `trip-1` for `agent-1`.
pub(crate) fn new_booking(customer_id: &str, first_cents: i64) -> NewBooking {
    let mut request = NewBooking::new(
        customer_id,
        "trip-1",
        "agent-1",
        NewTranche::new(Money::from_cents(first_cents), Utc::now()).with_proof("s3://proofs/1.pdf"),
    );
    request.first_payment_ratio = FirstPaymentRatio::Half;
    request
}

pub(crate) fn service(db: &Arc<Database>) -> BookingService {
    BookingService::new(db.clone(), Arc::new(StampLeadSync))
}

/// Deletes a sales agent while bookings still point at it, so commission
/// reconciliation for those bookings fails.
pub(crate) async fn orphan_sales_user(db: &Database, id: &str) {
    let mut conn = db.pool().acquire().await.unwrap();
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&mut *conn)
        .await
        .unwrap();
    sqlx::query("DELETE FROM sales_users WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .unwrap();
}

pub(crate) async fn restore_sales_user(db: &Database, id: &str, rate_cents: Option<i64>) {
    db.sales_users()
        .insert(&SalesUser {
            id: id.to_string(),
            full_name: id.to_string(),
            commission_per_head_cents: rate_cents,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

/// Counts calls and always succeeds.
#[derive(Debug, Default)]
pub(crate) struct CountingLeadSync {
    calls: AtomicUsize,
}

impl CountingLeadSync {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeadStatusSync for CountingLeadSync {
    async fn sync_lead_status(
        &self,
        _conn: &mut SqliteConnection,
        _lead_id: &str,
    ) -> Result<(), LeadSyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails on the first lead.
#[derive(Debug, Default)]
pub(crate) struct FailingLeadSync;

#[async_trait]
impl LeadStatusSync for FailingLeadSync {
    async fn sync_lead_status(
        &self,
        _conn: &mut SqliteConnection,
        lead_id: &str,
    ) -> Result<(), LeadSyncError> {
        Err(LeadSyncError::new(lead_id, "crm unavailable"))
    }
}
