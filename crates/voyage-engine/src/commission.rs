//! # Commission Engine
//!
//! Keeps the single commission of a booking in step with the booking's
//! payment status.
//!
//! ## Entry Points
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reconcile_on_fully_paid(booking)                                       │
//! │    commission exists?          → return it unchanged                    │
//! │    agent rate absent / zero?   → nothing due, None                      │
//! │    otherwise                   → INSERT APPROVED (UNIQUE booking_id)    │
//! │                                   lost the race? → return the winner    │
//! │                                                                         │
//! │  reconcile_on_status_change(booking)                                    │
//! │    no commission               → None                                   │
//! │    CANCELLED                   → PENDING (also from PAID)               │
//! │    FULLY_PAID  & PENDING       → APPROVED                               │
//! │    !FULLY_PAID & APPROVED      → PENDING                                │
//! │    persisted only when it moved                                         │
//! │                                                                         │
//! │  reconcile_booking(booking)    → dispatch on the CURRENT status         │
//! │  mark_paid(commission)         → APPROVED → PAID, conditional UPDATE    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entry point is idempotent: running it twice leaves the same rows as
//! running it once. That is what lets the sweep retry blindly.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use voyage_core::commission::commission_due;
use voyage_core::{Commission, CommissionSummary, CoreError, ReconcileKind};
use voyage_db::repository::{booking, commission, sales_user};
use voyage_db::Database;

use crate::error::{EngineError, EngineResult};

/// Creates and updates booking commissions.
#[derive(Debug, Clone)]
pub struct CommissionEngine {
    db: Arc<Database>,
}

impl CommissionEngine {
    pub fn new(db: Arc<Database>) -> Self {
        CommissionEngine { db }
    }

    /// Grants the commission for a booking that just became fully paid.
    ///
    /// ## Returns
    /// The booking's commission (new or pre-existing), or `None` when the
    /// agent has no per-head rate.
    pub async fn reconcile_on_fully_paid(&self, booking_id: &str) -> EngineResult<Option<Commission>> {
        let mut conn = self.db.pool().acquire().await?;

        let booking = booking::get_booking(&mut conn, booking_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Booking", booking_id))?;

        if let Some(existing) = commission::get_by_booking(&mut conn, booking_id).await? {
            debug!(
                booking_id = %booking_id,
                commission_id = %existing.id,
                status = %existing.status,
                "Commission already exists"
            );
            return Ok(Some(existing));
        }

        let agent = sales_user::get_sales_user(&mut conn, &booking.sales_user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("SalesUser", &booking.sales_user_id))?;

        let Some(amount) = commission_due(agent.commission_per_head_cents) else {
            info!(
                booking_id = %booking_id,
                sales_user_id = %agent.id,
                "Agent has no commission rate, nothing due"
            );
            return Ok(None);
        };

        let created = Commission::approved(&booking.id, &agent.id, amount, Utc::now());

        match commission::insert(&mut conn, &created).await {
            Ok(()) => {
                info!(
                    booking_id = %booking_id,
                    commission_id = %created.id,
                    amount = %amount,
                    "Commission approved"
                );
                Ok(Some(created))
            }
            Err(e) if e.is_unique_violation_on("commissions") => {
                debug!(booking_id = %booking_id, "Concurrent commission insert, using stored row");
                let stored = commission::get_by_booking(&mut conn, booking_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("Commission", booking_id))?;
                Ok(Some(stored))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Moves an existing commission to match the booking's status.
    pub async fn reconcile_on_status_change(
        &self,
        booking_id: &str,
    ) -> EngineResult<Option<Commission>> {
        let mut conn = self.db.pool().acquire().await?;

        let Some(mut current) = commission::get_by_booking(&mut conn, booking_id).await? else {
            debug!(booking_id = %booking_id, "No commission to reconcile");
            return Ok(None);
        };

        let booking = booking::get_booking(&mut conn, booking_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Booking", booking_id))?;

        let before = current.status;
        if current.reconcile_with(booking.payment_status, Utc::now()) {
            commission::update_status(&mut conn, &current).await?;
            info!(
                booking_id = %booking_id,
                commission_id = %current.id,
                from = %before,
                to = %current.status,
                "Commission status reconciled"
            );
        }

        Ok(Some(current))
    }

    /// Re-runs reconciliation from the booking's current status.
    pub async fn reconcile_booking(&self, booking_id: &str) -> EngineResult<Option<Commission>> {
        let status = self
            .db
            .bookings()
            .get_by_id(booking_id)
            .await?
            .map(|b| b.payment_status)
            .ok_or_else(|| EngineError::not_found("Booking", booking_id))?;

        if status.is_fully_paid() {
            self.reconcile_on_fully_paid(booking_id).await
        } else {
            self.reconcile_on_status_change(booking_id).await
        }
    }

    /// Runs the entry point a status change called for.
    pub async fn reconcile(
        &self,
        kind: ReconcileKind,
        booking_id: &str,
    ) -> EngineResult<Option<Commission>> {
        match kind {
            ReconcileKind::FullyPaidArrival => self.reconcile_on_fully_paid(booking_id).await,
            ReconcileKind::StatusChange => self.reconcile_on_status_change(booking_id).await,
        }
    }

    /// Pays out an APPROVED commission.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown id
    /// - `State` unless the commission is APPROVED when the row is written
    pub async fn mark_paid(&self, commission_id: &str) -> EngineResult<Commission> {
        let mut conn = self.db.pool().acquire().await?;

        let mut target = commission::get_by_id(&mut conn, commission_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Commission", commission_id))?;

        let now = Utc::now();
        target.mark_paid(now)?;

        if !commission::mark_paid(&mut conn, commission_id, now).await? {
            let current = commission::get_by_id(&mut conn, commission_id)
                .await?
                .map(|c| c.status)
                .ok_or_else(|| EngineError::not_found("Commission", commission_id))?;

            warn!(
                commission_id = %commission_id,
                status = %current,
                "Commission changed before payout"
            );
            return Err(CoreError::InvalidCommissionState {
                commission_id: commission_id.to_string(),
                current,
            }
            .into());
        }

        info!(
            commission_id = %commission_id,
            booking_id = %target.booking_id,
            amount = %target.amount(),
            "Commission paid"
        );
        Ok(target)
    }

    /// Per-status totals of an agent's commissions.
    pub async fn summary_for_agent(&self, sales_user_id: &str) -> EngineResult<CommissionSummary> {
        let mut conn = self.db.pool().acquire().await?;

        if sales_user::get_sales_user(&mut conn, sales_user_id).await?.is_none() {
            return Err(EngineError::not_found("SalesUser", sales_user_id));
        }

        Ok(commission::summary_for_agent(&mut conn, sales_user_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
