//! # Commission Repository
//!
//! Persistence for the single commission a booking can carry.
//!
//! ## Guarantees Pushed Into SQL
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  commissions.booking_id UNIQUE                                          │
//! │    two concurrent "create" calls → one row, one UniqueViolation         │
//! │                                                                         │
//! │  mark_paid:                                                             │
//! │    UPDATE ... SET status = 'paid'                                       │
//! │    WHERE id = ? AND status = 'approved'                                 │
//! │    two concurrent payouts → one row affected, one no-op                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use voyage_core::{Commission, CommissionStatus, CommissionSummary, Money};

const SELECT_COMMISSION: &str = r#"
    SELECT id, booking_id, sales_user_id, amount_cents, status, created_at, updated_at, paid_at
    FROM commissions
"#;

// =============================================================================
// Connection-level queries
// =============================================================================

pub async fn get_by_booking(
    conn: &mut SqliteConnection,
    booking_id: &str,
) -> DbResult<Option<Commission>> {
    let sql = format!("{SELECT_COMMISSION} WHERE booking_id = ?1");
    let commission = sqlx::query_as::<_, Commission>(&sql)
        .bind(booking_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(commission)
}

pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Commission>> {
    let sql = format!("{SELECT_COMMISSION} WHERE id = ?1");
    let commission = sqlx::query_as::<_, Commission>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(commission)
}

/// Inserts a commission.
///
/// ## Errors
/// `DbError::UniqueViolation` on `commissions` if the booking already has one.
pub async fn insert(conn: &mut SqliteConnection, commission: &Commission) -> DbResult<()> {
    debug!(
        booking_id = %commission.booking_id,
        amount_cents = commission.amount_cents,
        status = %commission.status,
        "Inserting commission"
    );

    sqlx::query(
        r#"
        INSERT INTO commissions (
            id, booking_id, sales_user_id, amount_cents, status,
            created_at, updated_at, paid_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&commission.id)
    .bind(&commission.booking_id)
    .bind(&commission.sales_user_id)
    .bind(commission.amount_cents)
    .bind(commission.status)
    .bind(commission.created_at)
    .bind(commission.updated_at)
    .bind(commission.paid_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Persists a status change decided by the engine.
pub async fn update_status(conn: &mut SqliteConnection, commission: &Commission) -> DbResult<()> {
    debug!(
        commission_id = %commission.id,
        status = %commission.status,
        "Updating commission status"
    );

    sqlx::query("UPDATE commissions SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(&commission.id)
        .bind(commission.status)
        .bind(commission.updated_at)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Flips an APPROVED commission to PAID.
///
/// Returns `false` when the row was not APPROVED at write time.
pub async fn mark_paid(conn: &mut SqliteConnection, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE commissions SET
            status = ?2,
            paid_at = ?3,
            updated_at = ?3
        WHERE id = ?1 AND status = ?4
        "#,
    )
    .bind(id)
    .bind(CommissionStatus::Paid)
    .bind(now)
    .bind(CommissionStatus::Approved)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Sums an agent's commissions per status.
pub async fn summary_for_agent(
    conn: &mut SqliteConnection,
    sales_user_id: &str,
) -> DbResult<CommissionSummary> {
    let rows: Vec<(CommissionStatus, i64)> = sqlx::query_as(
        r#"
        SELECT status, COALESCE(SUM(amount_cents), 0)
        FROM commissions
        WHERE sales_user_id = ?1
        GROUP BY status
        "#,
    )
    .bind(sales_user_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut summary = CommissionSummary::default();
    for (status, cents) in rows {
        summary.add(status, Money::from_cents(cents));
    }
    Ok(summary)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for commission database operations.
#[derive(Debug, Clone)]
pub struct CommissionRepository {
    pool: SqlitePool,
}

impl CommissionRepository {
    /// Creates a new CommissionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CommissionRepository { pool }
    }

    pub async fn get_by_booking(&self, booking_id: &str) -> DbResult<Option<Commission>> {
        let mut conn = self.pool.acquire().await?;
        get_by_booking(&mut conn, booking_id).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Commission>> {
        let mut conn = self.pool.acquire().await?;
        get_by_id(&mut conn, id).await
    }

    pub async fn insert(&self, commission: &Commission) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, commission).await
    }

    pub async fn update_status(&self, commission: &Commission) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        update_status(&mut conn, commission).await
    }

    pub async fn mark_paid(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        mark_paid(&mut conn, id, now).await
    }

    pub async fn summary_for_agent(&self, sales_user_id: &str) -> DbResult<CommissionSummary> {
        let mut conn = self.pool.acquire().await?;
        summary_for_agent(&mut conn, sales_user_id).await
    }

    /// Counts commissions attached to a booking (0 or 1 by constraint).
    pub async fn count_for_booking(&self, booking_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM commissions WHERE booking_id = ?1")
            .bind(booking_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
