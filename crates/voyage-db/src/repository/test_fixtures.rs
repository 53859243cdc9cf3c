//! Shared rows for repository tests.

use chrono::Utc;
use voyage_core::{
    Booking, Customer, FirstPaymentRatio, Lead, Money, NewTranche, PaymentStatus, SalesUser,
    TrancheSlot, Trip,
};

use crate::Database;

/// Three customers, one trip priced 10,000.00, two agents and two leads for
/// `cust-1`.
pub(crate) async fn seed_reference_data(db: &Database) {
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
            name: "Umrah Spring".to_string(),
            base_price_cents: 1_000_000,
            created_at: now,
        })
        .await
        .unwrap();

    for (id, rate) in [("agent-1", Some(50_000)), ("agent-0", None)] {
        db.sales_users()
            .insert(&SalesUser {
                id: id.to_string(),
                full_name: id.to_string(),
                commission_per_head_cents: rate,
                created_at: now,
            })
            .await
            .unwrap();
    }

    for id in ["lead-1", "lead-2"] {
        db.customers()
            .insert_lead(&Lead {
                id: id.to_string(),
                customer_id: "cust-1".to_string(),
                status: "new".to_string(),
                status_synced_at: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }
}

/// A DEPOSIT_PENDING booking on `trip-1` sold by `agent-1`, with a 5,000.00
/// first tranche.
pub(crate) fn sample_booking(id: &str, customer_id: &str) -> Booking {
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
        payment_status: PaymentStatus::DepositPending,
        first_payment: None,
        second_payment: None,
        third_payment: None,
        created_at: now,
        updated_at: now,
    };
    booking
        .add_tranche(
            TrancheSlot::First,
            NewTranche::new(Money::from_cents(500_000), now),
        )
        .unwrap();
    booking
}
