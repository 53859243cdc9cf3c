//! # Reconciliation Outbox Repository
//!
//! Durable "this booking needs commission reconciliation" markers.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  BOOKING UPDATE (payment_status changed)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. UPDATE bookings SET payment_status = ? WHERE id = ?         │   │
//! │  │  2. lead resync for every lead of the customer                  │   │
//! │  │  3. INSERT INTO reconciliation_outbox (booking_id, kind, ...)   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← booking change and marker land together                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Post-commit commission call                                            │
//! │    ├── ok     → mark_processed                                          │
//! │    └── failed → mark_failed (attempts += 1, last_error)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Sweep picks up anything still pending (crash, timeout, error)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use voyage_core::{ReconciliationMarker, StatusChange};

/// Queues a marker for the given status change.
///
/// Takes a connection so it can join the booking transaction.
pub async fn enqueue(
    conn: &mut SqliteConnection,
    booking_id: &str,
    change: &StatusChange,
) -> DbResult<ReconciliationMarker> {
    let marker = ReconciliationMarker {
        id: Uuid::new_v4().to_string(),
        booking_id: booking_id.to_string(),
        kind: change.reconcile_kind(),
        payload: serde_json::to_string(change)?,
        attempts: 0,
        last_error: None,
        created_at: Utc::now(),
        attempted_at: None,
        processed_at: None,
    };

    debug!(
        marker_id = %marker.id,
        booking_id = %booking_id,
        kind = %marker.kind,
        "Queuing reconciliation marker"
    );

    sqlx::query(
        r#"
        INSERT INTO reconciliation_outbox (
            id, booking_id, kind, payload,
            attempts, last_error, created_at, attempted_at, processed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&marker.id)
    .bind(&marker.booking_id)
    .bind(marker.kind)
    .bind(&marker.payload)
    .bind(marker.attempts)
    .bind(&marker.last_error)
    .bind(marker.created_at)
    .bind(marker.attempted_at)
    .bind(marker.processed_at)
    .execute(&mut *conn)
    .await?;

    Ok(marker)
}

/// Repository for reconciliation outbox operations.
#[derive(Debug, Clone)]
pub struct ReconciliationOutboxRepository {
    pool: SqlitePool,
}

impl ReconciliationOutboxRepository {
    /// Creates a new ReconciliationOutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReconciliationOutboxRepository { pool }
    }

    /// Queues a marker outside any transaction.
    pub async fn enqueue(&self, booking_id: &str, change: &StatusChange) -> DbResult<ReconciliationMarker> {
        let mut conn = self.pool.acquire().await?;
        enqueue(&mut conn, booking_id, change).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ReconciliationMarker>> {
        let marker = sqlx::query_as::<_, ReconciliationMarker>(
            r#"
            SELECT id, booking_id, kind, payload, attempts, last_error,
                   created_at, attempted_at, processed_at
            FROM reconciliation_outbox
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(marker)
    }

    /// Unprocessed markers with fewer than `max_attempts` attempts, oldest first.
    ///
    /// Exhausted markers are left out so they cannot fill the batch and
    /// starve newer ones.
    pub async fn get_pending(&self, limit: u32, max_attempts: i64) -> DbResult<Vec<ReconciliationMarker>> {
        let markers = sqlx::query_as::<_, ReconciliationMarker>(
            r#"
            SELECT id, booking_id, kind, payload, attempts, last_error,
                   created_at, attempted_at, processed_at
            FROM reconciliation_outbox
            WHERE processed_at IS NULL
            AND attempts < ?2
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(markers)
    }

    /// Unprocessed markers that used up their attempts, oldest first.
    pub async fn get_exhausted(&self, limit: u32, max_attempts: i64) -> DbResult<Vec<ReconciliationMarker>> {
        let markers = sqlx::query_as::<_, ReconciliationMarker>(
            r#"
            SELECT id, booking_id, kind, payload, attempts, last_error,
                   created_at, attempted_at, processed_at
            FROM reconciliation_outbox
            WHERE processed_at IS NULL
            AND attempts >= ?2
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(markers)
    }

    /// Counts unprocessed markers that used up their attempts.
    pub async fn count_exhausted(&self, max_attempts: i64) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reconciliation_outbox WHERE processed_at IS NULL AND attempts >= ?1",
        )
        .bind(max_attempts)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Marks a marker as done.
    pub async fn mark_processed(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE reconciliation_outbox SET
                processed_at = ?2,
                attempted_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a failed attempt.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE reconciliation_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts unprocessed markers.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reconciliation_outbox WHERE processed_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Deletes markers processed more than `days_old` days ago.
    ///
    /// ## Returns
    /// Number of deleted markers.
    pub async fn cleanup_processed(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_old));

        let result = sqlx::query(
            r#"
            DELETE FROM reconciliation_outbox
            WHERE processed_at IS NOT NULL
            AND processed_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_fixtures::{sample_booking, seed_reference_data};
    use crate::{Database, DbConfig};
    use voyage_core::{PaymentStatus, ReconcileKind};

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_reference_data(&db).await;
        db.bookings().insert(&sample_booking("booking-1", "cust-1")).await.unwrap();
        db
    }

    fn arrival() -> StatusChange {
        StatusChange {
            from: PaymentStatus::DepositPaid,
            to: PaymentStatus::FullyPaid,
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_pending() {
        let db = setup().await;
        let marker = db.outbox().enqueue("booking-1", &arrival()).await.unwrap();
        assert_eq!(marker.kind, ReconcileKind::FullyPaidArrival);

        let pending = db.outbox().get_pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, marker.id);

        let change: StatusChange = serde_json::from_str(&pending[0].payload).unwrap();
        assert_eq!(change, arrival());
    }

    #[tokio::test]
    async fn test_processed_leaves_queue() {
        let db = setup().await;
        let marker = db.outbox().enqueue("booking-1", &arrival()).await.unwrap();

        db.outbox().mark_processed(&marker.id).await.unwrap();
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);

        let stored = db.outbox().get_by_id(&marker.id).await.unwrap().unwrap();
        assert!(stored.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_stays_pending_with_error() {
        let db = setup().await;
        let marker = db.outbox().enqueue("booking-1", &arrival()).await.unwrap();

        db.outbox().mark_failed(&marker.id, "timed out").await.unwrap();
        db.outbox().mark_failed(&marker.id, "timed out again").await.unwrap();

        let pending = db.outbox().get_pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 2);
        assert_eq!(pending[0].last_error.as_deref(), Some("timed out again"));
        assert!(pending[0].attempted_at.is_some());
    }

    #[tokio::test]
    async fn test_exhausted_markers_do_not_fill_the_batch() {
        let db = setup().await;
        let first = db.outbox().enqueue("booking-1", &arrival()).await.unwrap();
        let second = db.outbox().enqueue("booking-1", &arrival()).await.unwrap();
        for id in [&first.id, &second.id] {
            db.outbox().mark_failed(id, "agent missing").await.unwrap();
            db.outbox().mark_failed(id, "agent missing").await.unwrap();
        }
        let fresh = db.outbox().enqueue("booking-1", &arrival()).await.unwrap();

        let pending = db.outbox().get_pending(1, 2).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, fresh.id);

        assert_eq!(db.outbox().count_exhausted(2).await.unwrap(), 2);
        let exhausted = db.outbox().get_exhausted(10, 2).await.unwrap();
        assert_eq!(exhausted.len(), 2);
        assert_eq!(exhausted[0].id, first.id);

        // a higher limit makes them pending again
        assert_eq!(db.outbox().get_pending(10, 3).await.unwrap().len(), 3);
        assert_eq!(db.outbox().count_exhausted(3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_and_pending() {
        let db = setup().await;
        let done = db.outbox().enqueue("booking-1", &arrival()).await.unwrap();
        db.outbox().enqueue("booking-1", &arrival()).await.unwrap();
        db.outbox().mark_processed(&done.id).await.unwrap();

        // processed just now: younger than a day
        assert_eq!(db.outbox().cleanup_processed(1).await.unwrap(), 0);
        // cutoff at "now" removes it
        assert_eq!(db.outbox().cleanup_processed(0).await.unwrap(), 1);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 1);
    }
}
