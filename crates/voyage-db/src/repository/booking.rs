//! # Booking Repository
//!
//! Bookings, their tranche rows and companion links.
//!
//! ## Storage Layout
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────────────┐
//! │ bookings             │ 1  n │ payments                     │
//! │  id                  │──────│  booking_id, slot  (UNIQUE)  │
//! │  pricing inputs      │      │  amount_cents, paid_at, ...  │
//! │  payment_status      │      └──────────────────────────────┘
//! │                      │ 1  n ┌──────────────────────────────┐
//! │                      │──────│ booking_companions           │
//! └──────────────────────┘      │  booking_id, customer_id     │
//!                               └──────────────────────────────┘
//! ```
//!
//! Payments are insert-only. A second row for the same `(booking_id, slot)`
//! fails the UNIQUE constraint; callers map that back to a tranche error.
//!
//! Every query exists as a free function over `&mut SqliteConnection` so the
//! engine can run it inside a transaction; the repository methods are the
//! pooled shortcuts.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use voyage_core::{Booking, FirstPaymentRatio, Payment, PaymentStatus, TrancheSlot};

/// The scalar columns of a booking row.
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: String,
    customer_id: String,
    trip_id: String,
    sales_user_id: String,
    referring_agent_id: Option<String>,
    lead_id: Option<String>,
    extra_single_cents: Option<i64>,
    extra_bed_cents: Option<i64>,
    extra_seat_cents: Option<i64>,
    extra_bag_cents: Option<i64>,
    discount_cents: Option<i64>,
    first_payment_ratio: FirstPaymentRatio,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self, companions: Vec<String>, payments: Vec<Payment>) -> Booking {
        let mut booking = Booking {
            id: self.id,
            customer_id: self.customer_id,
            trip_id: self.trip_id,
            sales_user_id: self.sales_user_id,
            referring_agent_id: self.referring_agent_id,
            lead_id: self.lead_id,
            companion_customer_ids: companions,
            extra_single_cents: self.extra_single_cents,
            extra_bed_cents: self.extra_bed_cents,
            extra_seat_cents: self.extra_seat_cents,
            extra_bag_cents: self.extra_bag_cents,
            discount_cents: self.discount_cents,
            first_payment_ratio: self.first_payment_ratio,
            payment_status: self.payment_status,
            first_payment: None,
            second_payment: None,
            third_payment: None,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };

        for payment in payments {
            match payment.slot {
                TrancheSlot::First => booking.first_payment = Some(payment),
                TrancheSlot::Second => booking.second_payment = Some(payment),
                TrancheSlot::Third => booking.third_payment = Some(payment),
            }
        }
        booking
    }
}

// =============================================================================
// Connection-level queries
// =============================================================================

/// Loads a booking with its tranches and companions.
pub async fn get_booking(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Booking>> {
    let row: Option<BookingRow> = sqlx::query_as(
        r#"
        SELECT
            id, customer_id, trip_id, sales_user_id, referring_agent_id, lead_id,
            extra_single_cents, extra_bed_cents, extra_seat_cents, extra_bag_cents,
            discount_cents, first_payment_ratio, payment_status, created_at, updated_at
        FROM bookings
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let companions = get_companions(conn, id).await?;
    let payments = get_payments(conn, id).await?;

    Ok(Some(row.into_booking(companions, payments)))
}

/// Returns the recorded tranches of a booking in slot order.
pub async fn get_payments(conn: &mut SqliteConnection, booking_id: &str) -> DbResult<Vec<Payment>> {
    let mut payments: Vec<Payment> = sqlx::query_as(
        r#"
        SELECT id, booking_id, slot, amount_cents, paid_at, proof_uri, created_at
        FROM payments
        WHERE booking_id = ?1
        "#,
    )
    .bind(booking_id)
    .fetch_all(&mut *conn)
    .await?;

    payments.sort_by_key(|p| p.slot);
    Ok(payments)
}

async fn get_companions(conn: &mut SqliteConnection, booking_id: &str) -> DbResult<Vec<String>> {
    let companions: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT customer_id
        FROM booking_companions
        WHERE booking_id = ?1
        ORDER BY position ASC
        "#,
    )
    .bind(booking_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(companions)
}

/// Inserts a new booking along with its companions and any tranches it holds.
pub async fn insert_booking(conn: &mut SqliteConnection, booking: &Booking) -> DbResult<()> {
    debug!(booking_id = %booking.id, trip_id = %booking.trip_id, "Inserting booking");

    sqlx::query(
        r#"
        INSERT INTO bookings (
            id, customer_id, trip_id, sales_user_id, referring_agent_id, lead_id,
            extra_single_cents, extra_bed_cents, extra_seat_cents, extra_bag_cents,
            discount_cents, first_payment_ratio, payment_status, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14, ?15
        )
        "#,
    )
    .bind(&booking.id)
    .bind(&booking.customer_id)
    .bind(&booking.trip_id)
    .bind(&booking.sales_user_id)
    .bind(&booking.referring_agent_id)
    .bind(&booking.lead_id)
    .bind(booking.extra_single_cents)
    .bind(booking.extra_bed_cents)
    .bind(booking.extra_seat_cents)
    .bind(booking.extra_bag_cents)
    .bind(booking.discount_cents)
    .bind(booking.first_payment_ratio)
    .bind(booking.payment_status)
    .bind(booking.created_at)
    .bind(booking.updated_at)
    .execute(&mut *conn)
    .await?;

    replace_companions(conn, &booking.id, &booking.companion_customer_ids).await?;

    for payment in booking.tranches() {
        insert_payment(conn, payment).await?;
    }

    Ok(())
}

/// Writes every mutable booking column and replaces the companion list.
///
/// Tranches are not touched; new ones go through [`insert_payment`].
pub async fn update_booking(conn: &mut SqliteConnection, booking: &Booking) -> DbResult<()> {
    debug!(
        booking_id = %booking.id,
        payment_status = %booking.payment_status,
        "Updating booking"
    );

    let result = sqlx::query(
        r#"
        UPDATE bookings SET
            trip_id = ?2,
            sales_user_id = ?3,
            referring_agent_id = ?4,
            lead_id = ?5,
            extra_single_cents = ?6,
            extra_bed_cents = ?7,
            extra_seat_cents = ?8,
            extra_bag_cents = ?9,
            discount_cents = ?10,
            first_payment_ratio = ?11,
            payment_status = ?12,
            updated_at = ?13
        WHERE id = ?1
        "#,
    )
    .bind(&booking.id)
    .bind(&booking.trip_id)
    .bind(&booking.sales_user_id)
    .bind(&booking.referring_agent_id)
    .bind(&booking.lead_id)
    .bind(booking.extra_single_cents)
    .bind(booking.extra_bed_cents)
    .bind(booking.extra_seat_cents)
    .bind(booking.extra_bag_cents)
    .bind(booking.discount_cents)
    .bind(booking.first_payment_ratio)
    .bind(booking.payment_status)
    .bind(booking.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Booking", &booking.id));
    }

    replace_companions(conn, &booking.id, &booking.companion_customer_ids).await
}

async fn replace_companions(
    conn: &mut SqliteConnection,
    booking_id: &str,
    companions: &[String],
) -> DbResult<()> {
    sqlx::query("DELETE FROM booking_companions WHERE booking_id = ?1")
        .bind(booking_id)
        .execute(&mut *conn)
        .await?;

    for (position, customer_id) in companions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO booking_companions (booking_id, customer_id, position)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(booking_id)
        .bind(customer_id)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Inserts one tranche row.
///
/// ## Errors
/// `DbError::UniqueViolation` on `payments` if the slot is already filled.
pub async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    debug!(
        booking_id = %payment.booking_id,
        slot = %payment.slot,
        amount_cents = payment.amount_cents,
        "Inserting payment"
    );

    sqlx::query(
        r#"
        INSERT INTO payments (id, booking_id, slot, amount_cents, paid_at, proof_uri, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.booking_id)
    .bind(payment.slot)
    .bind(payment.amount_cents)
    .bind(payment.paid_at)
    .bind(&payment.proof_uri)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// True when `customer_id` holds a booking on `trip_id`.
pub async fn customer_has_booking_on_trip(
    conn: &mut SqliteConnection,
    customer_id: &str,
    trip_id: &str,
) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings WHERE customer_id = ?1 AND trip_id = ?2",
    )
    .bind(customer_id)
    .bind(trip_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count > 0)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for booking database operations.
#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: SqlitePool,
}

impl BookingRepository {
    /// Creates a new BookingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BookingRepository { pool }
    }

    /// Gets a booking by ID, tranches and companions included.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Booking>> {
        let mut conn = self.pool.acquire().await?;
        get_booking(&mut conn, id).await
    }

    /// Inserts a booking outside any caller transaction.
    pub async fn insert(&self, booking: &Booking) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_booking(&mut tx, booking).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Lists booking ids in a given payment status, oldest first.
    pub async fn ids_with_status(&self, status: PaymentStatus) -> DbResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM bookings WHERE payment_status = ?1 ORDER BY created_at ASC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
