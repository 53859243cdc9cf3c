//! # Reconciliation Sweep
//!
//! Re-runs commission reconciliation for markers the post-commit call did not
//! finish: a crash between commit and the call, a timeout, or an error.
//!
//! ## Sweep Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    reconciliation_outbox                                │
//! │                                                                         │
//! │  id | booking_id | kind               | attempts | processed_at         │
//! │  ───┼────────────┼────────────────────┼──────────┼────────────          │
//! │  m1 │ b-17       │ fully_paid_arrival │ 1        │ NULL                 │
//! │  m2 │ b-23       │ status_change      │ 0        │ NULL                 │
//! │  m3 │ b-08       │ status_change      │ 10       │ NULL   ← exhausted   │
//! └────────────────────────────┬────────────────────────────────────────────┘
//!                              │ run_once(): oldest first, batch_size,
//!                              │ attempts < max_attempts only
//!                              ▼
//!   fully_paid_arrival → reconcile_booking   (current status decides)
//!   status_change      → reconcile_on_status_change
//!        ├── ok     → mark_processed
//!        └── failed → mark_failed (attempts += 1)
//! ```
//!
//! Arrival markers go through `reconcile_booking` so a booking that has left
//! FULLY_PAID since the marker was written is not granted a fresh APPROVED
//! commission.
//!
//! Exhausted markers are never fetched into a batch. They stay in the table
//! for an operator and are only counted in [`SweepReport::skipped`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use voyage_core::{Commission, ReconcileKind, ReconciliationMarker};
use voyage_db::Database;

use crate::commission::CommissionEngine;
use crate::config::SweepSettings;
use crate::error::EngineResult;

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub processed: usize,
    pub failed: usize,
    /// Unprocessed markers at or above `max_attempts`, queue-wide.
    pub skipped: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.processed == 0 && self.failed == 0 && self.skipped == 0
    }
}

/// Retries pending reconciliation markers.
pub struct ReconciliationSweep {
    db: Arc<Database>,
    commissions: CommissionEngine,
    settings: SweepSettings,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running sweep.
#[derive(Clone)]
pub struct ReconciliationSweepHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ReconciliationSweepHandle {
    /// Triggers graceful shutdown. A no-op once the sweep has stopped.
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("Reconciliation sweep already stopped");
        }
    }
}

impl ReconciliationSweep {
    /// Creates a sweep and returns its handle.
    pub fn new(db: Arc<Database>, settings: SweepSettings) -> (Self, ReconciliationSweepHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let sweep = ReconciliationSweep {
            commissions: CommissionEngine::new(db.clone()),
            db,
            settings,
            shutdown_rx,
        };

        (sweep, ReconciliationSweepHandle { shutdown_tx })
    }

    /// Runs the sweep loop until shutdown.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(
            poll_interval_secs = self.settings.poll_interval_secs,
            batch_size = self.settings.batch_size,
            "Reconciliation sweep starting"
        );

        let poll_interval = std::time::Duration::from_secs(self.settings.poll_interval_secs);
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_once().await {
                        Ok(report) if !report.is_empty() => {
                            info!(
                                processed = report.processed,
                                failed = report.failed,
                                skipped = report.skipped,
                                "Reconciliation sweep pass finished"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!(?e, "Reconciliation sweep pass failed"),
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Reconciliation sweep shutting down");
                    break;
                }
            }
        }

        info!("Reconciliation sweep stopped");
    }

    /// One pass over the oldest markers that still have attempts left.
    pub async fn run_once(&self) -> EngineResult<SweepReport> {
        let max_attempts = self.settings.max_attempts;
        let outbox = self.db.outbox();

        let exhausted = outbox.count_exhausted(max_attempts).await?;
        if exhausted > 0 {
            warn!(
                exhausted,
                max_attempts,
                "Reconciliation markers exceeded max attempts and need an operator"
            );
        }

        let mut report = SweepReport {
            skipped: usize::try_from(exhausted).unwrap_or_default(),
            ..Default::default()
        };

        let markers = outbox.get_pending(self.settings.batch_size, max_attempts).await?;
        if markers.is_empty() {
            debug!("No pending reconciliation markers");
            return Ok(report);
        }

        for marker in markers {
            match self.reconcile_marker(&marker).await {
                Ok(_) => {
                    outbox.mark_processed(&marker.id).await?;
                    report.processed += 1;
                }
                Err(e) => {
                    error!(
                        marker_id = %marker.id,
                        booking_id = %marker.booking_id,
                        error = %e,
                        "Reconciliation retry failed"
                    );
                    outbox.mark_failed(&marker.id, &e.to_string()).await?;
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn reconcile_marker(&self, marker: &ReconciliationMarker) -> EngineResult<Option<Commission>> {
        debug!(marker_id = %marker.id, kind = %marker.kind, "Retrying reconciliation");

        match marker.kind {
            ReconcileKind::FullyPaidArrival => self.commissions.reconcile_booking(&marker.booking_id).await,
            ReconcileKind::StatusChange => {
                self.commissions
                    .reconcile_on_status_change(&marker.booking_id)
                    .await
            }
        }
    }

    /// Deletes markers processed longer ago than the configured retention.
    pub async fn cleanup_processed(&self) -> EngineResult<u64> {
        let deleted = self
            .db
            .outbox()
            .cleanup_processed(self.settings.cleanup_after_days)
            .await?;

        if deleted > 0 {
            info!(deleted, "Removed processed reconciliation markers");
        }
        Ok(deleted)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::{BookingService, CommissionOutcome};
    use crate::test_support::{insert_booking, orphan_sales_user, restore_sales_user, service, setup};
    use voyage_core::{BookingPatch, CommissionStatus, PaymentStatus, StatusChange};

    fn settings() -> SweepSettings {
        SweepSettings {
            max_attempts: 2,
            ..Default::default()
        }
    }

    async fn deferred_arrival(db: &Arc<Database>) -> BookingService {
        let svc = service(db);
        insert_booking(db, "booking-1", "cust-1", PaymentStatus::DepositPaid).await;
        orphan_sales_user(db, "agent-1").await;

        let update = svc
            .update_booking("booking-1", BookingPatch::status(PaymentStatus::FullyPaid))
            .await
            .unwrap();
        assert!(matches!(update.commission, CommissionOutcome::Deferred { .. }));
        svc
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let db = Arc::new(setup().await);
        let (sweep, _handle) = ReconciliationSweep::new(db, settings());
        assert!(sweep.run_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_recovers_failed_post_commit_call() {
        let db = Arc::new(setup().await);
        deferred_arrival(&db).await;
        let (sweep, _handle) = ReconciliationSweep::new(db.clone(), settings());

        // still broken: attempt recorded again
        let report = sweep.run_once().await.unwrap();
        assert_eq!(report, SweepReport { processed: 0, failed: 1, skipped: 0 });

        restore_sales_user(&db, "agent-1", Some(50_000)).await;
        // attempts == 2 == max_attempts: left for an operator
        let report = sweep.run_once().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(db.commissions().count_for_booking("booking-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_creates_missing_commission() {
        let db = Arc::new(setup().await);
        deferred_arrival(&db).await;
        restore_sales_user(&db, "agent-1", Some(50_000)).await;

        let (sweep, _handle) = ReconciliationSweep::new(db.clone(), settings());
        let report = sweep.run_once().await.unwrap();
        assert_eq!(report, SweepReport { processed: 1, failed: 0, skipped: 0 });

        let commission = db.commissions().get_by_booking("booking-1").await.unwrap().unwrap();
        assert_eq!(commission.status, CommissionStatus::Approved);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);

        // a second pass has nothing left to do
        assert!(sweep.run_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_markers_do_not_starve_newer_ones() {
        let db = Arc::new(setup().await);
        deferred_arrival(&db).await;
        let (sweep, _handle) = ReconciliationSweep::new(
            db.clone(),
            SweepSettings {
                batch_size: 1,
                ..settings()
            },
        );

        // second failure exhausts booking-1's marker
        assert_eq!(sweep.run_once().await.unwrap().failed, 1);

        restore_sales_user(&db, "agent-1", Some(50_000)).await;
        insert_booking(&db, "booking-2", "cust-2", PaymentStatus::FullyPaid).await;
        let arrival = StatusChange {
            from: PaymentStatus::DepositPaid,
            to: PaymentStatus::FullyPaid,
        };
        db.outbox().enqueue("booking-2", &arrival).await.unwrap();

        let report = sweep.run_once().await.unwrap();
        assert_eq!(report, SweepReport { processed: 1, failed: 0, skipped: 1 });

        let commission = db.commissions().get_by_booking("booking-2").await.unwrap().unwrap();
        assert_eq!(commission.status, CommissionStatus::Approved);
        assert_eq!(commission.amount_cents, 50_000);
        assert_eq!(db.commissions().count_for_booking("booking-1").await.unwrap(), 0);

        // only the exhausted marker is left, and it is never fetched again
        let report = sweep.run_once().await.unwrap();
        assert_eq!(report, SweepReport { processed: 0, failed: 0, skipped: 1 });
        assert_eq!(db.outbox().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stale_arrival_marker_does_not_approve() {
        let db = Arc::new(setup().await);
        let svc = deferred_arrival(&db).await;
        restore_sales_user(&db, "agent-1", Some(50_000)).await;

        // the booking leaves FULLY_PAID before the sweep runs
        svc.update_booking("booking-1", BookingPatch::status(PaymentStatus::Cancelled))
            .await
            .unwrap();

        let (sweep, _handle) = ReconciliationSweep::new(db.clone(), settings());
        let report = sweep.run_once().await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(db.commissions().count_for_booking("booking-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_change_marker_is_replayed() {
        let db = Arc::new(setup().await);
        insert_booking(&db, "booking-1", "cust-1", PaymentStatus::FullyPaid).await;
        let engine = CommissionEngine::new(db.clone());
        engine.reconcile_on_fully_paid("booking-1").await.unwrap();

        // booking cancelled, but the process died before reconciling
        let mut booking = db.bookings().get_by_id("booking-1").await.unwrap().unwrap();
        booking.payment_status = PaymentStatus::Cancelled;
        {
            let mut conn = db.pool().acquire().await.unwrap();
            voyage_db::repository::booking::update_booking(&mut conn, &booking).await.unwrap();
        }
        let change = StatusChange {
            from: PaymentStatus::FullyPaid,
            to: PaymentStatus::Cancelled,
        };
        db.outbox().enqueue("booking-1", &change).await.unwrap();

        let (sweep, _handle) = ReconciliationSweep::new(db.clone(), settings());
        assert_eq!(sweep.run_once().await.unwrap().processed, 1);

        let commission = db.commissions().get_by_booking("booking-1").await.unwrap().unwrap();
        assert_eq!(commission.status, CommissionStatus::Pending);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let db = Arc::new(setup().await);
        let (sweep, handle) = ReconciliationSweep::new(db, settings());

        let task = tokio::spawn(sweep.run());
        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_processed() {
        let db = Arc::new(setup().await);
        insert_booking(&db, "booking-1", "cust-1", PaymentStatus::FullyPaid).await;
        let (sweep, _handle) = ReconciliationSweep::new(db.clone(), settings());
        assert_eq!(sweep.cleanup_processed().await.unwrap(), 0);

        let change = StatusChange {
            from: PaymentStatus::DepositPaid,
            to: PaymentStatus::FullyPaid,
        };
        let stale = db.outbox().enqueue("booking-1", &change).await.unwrap();
        let recent = db.outbox().enqueue("booking-1", &change).await.unwrap();
        let pending = db.outbox().enqueue("booking-1", &change).await.unwrap();
        db.outbox().mark_processed(&stale.id).await.unwrap();
        db.outbox().mark_processed(&recent.id).await.unwrap();

        let retention = i64::from(settings().cleanup_after_days);
        sqlx::query("UPDATE reconciliation_outbox SET processed_at = ?1 WHERE id = ?2")
            .bind(chrono::Utc::now() - chrono::Duration::days(retention + 1))
            .bind(&stale.id)
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(sweep.cleanup_processed().await.unwrap(), 1);
        assert!(db.outbox().get_by_id(&stale.id).await.unwrap().is_none());
        assert!(db.outbox().get_by_id(&recent.id).await.unwrap().is_some());
        assert!(db.outbox().get_by_id(&pending.id).await.unwrap().is_some());
    }
}
