//! # Commission Rules
//!
//! Pure decisions behind the commission engine. The engine loads rows and
//! persists results; everything it decides comes from here.
//!
//! ```text
//!   booking status ──┐
//!                    ├──► next_commission_status ──► Some(new) | None
//!   commission  ─────┘
//!
//!   Priority (first match wins):
//!     1. CANCELLED                     → PENDING (unless already PENDING)
//!     2. FULLY_PAID and PENDING        → APPROVED
//!     3. not FULLY_PAID and APPROVED   → PENDING
//!     4. otherwise                     → no change
//! ```

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Commission, CommissionStatus, PaymentStatus};

/// Amount owed for a booking given the agent's per-head rate.
///
/// Absent and zero rates both mean no commission.
pub fn commission_due(commission_per_head_cents: Option<i64>) -> Option<Money> {
    commission_per_head_cents
        .map(Money::from_cents)
        .filter(Money::is_positive)
}

/// The single status transition a booking status change calls for.
///
/// Cancellation dominates and also pulls a PAID commission back to PENDING;
/// `paid_at` is kept as history.
pub fn next_commission_status(
    current: CommissionStatus,
    booking_status: PaymentStatus,
) -> Option<CommissionStatus> {
    if booking_status.is_cancelled() {
        return (current != CommissionStatus::Pending).then_some(CommissionStatus::Pending);
    }

    match (current, booking_status.is_fully_paid()) {
        (CommissionStatus::Pending, true) => Some(CommissionStatus::Approved),
        (CommissionStatus::Approved, false) => Some(CommissionStatus::Pending),
        _ => None,
    }
}

impl Commission {
    /// A freshly earned commission: APPROVED, stamped `now`.
    pub fn approved(
        booking_id: impl Into<String>,
        sales_user_id: impl Into<String>,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Commission {
            id: Uuid::new_v4().to_string(),
            booking_id: booking_id.into(),
            sales_user_id: sales_user_id.into(),
            amount_cents: amount.cents(),
            status: CommissionStatus::Approved,
            created_at: now,
            updated_at: now,
            paid_at: None,
        }
    }

    /// Applies the booking-driven transition, if any. Returns whether it changed.
    pub fn reconcile_with(&mut self, booking_status: PaymentStatus, now: DateTime<Utc>) -> bool {
        match next_commission_status(self.status, booking_status) {
            Some(next) => {
                self.status = next;
                self.updated_at = now;
                true
            }
            None => false,
        }
    }

    /// Pays out the commission.
    ///
    /// ## Errors
    /// [`CoreError::InvalidCommissionState`] unless the commission is APPROVED.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != CommissionStatus::Approved {
            return Err(CoreError::InvalidCommissionState {
                commission_id: self.id.clone(),
                current: self.status,
            });
        }
        self.status = CommissionStatus::Paid;
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use CommissionStatus::*;

    fn commission(status: CommissionStatus) -> Commission {
        let mut c = Commission::approved("booking-1", "agent-1", Money::from_cents(50_000), Utc::now());
        c.status = status;
        c
    }

    #[test]
    fn test_commission_due() {
        assert_eq!(commission_due(Some(50_000)), Some(Money::from_cents(50_000)));
        assert_eq!(commission_due(Some(0)), None);
        assert_eq!(commission_due(None), None);
    }

    #[test]
    fn test_cancellation_dominates() {
        for current in [Approved, Paid] {
            assert_eq!(next_commission_status(current, PaymentStatus::Cancelled), Some(Pending));
        }
        assert_eq!(next_commission_status(Pending, PaymentStatus::Cancelled), None);
    }

    #[test]
    fn test_fully_paid_approves_pending() {
        assert_eq!(next_commission_status(Pending, PaymentStatus::FullyPaid), Some(Approved));
        assert_eq!(next_commission_status(Approved, PaymentStatus::FullyPaid), None);
        assert_eq!(next_commission_status(Paid, PaymentStatus::FullyPaid), None);
    }

    #[test]
    fn test_leaving_fully_paid_demotes_approved() {
        assert_eq!(next_commission_status(Approved, PaymentStatus::DepositPaid), Some(Pending));
        assert_eq!(next_commission_status(Approved, PaymentStatus::DepositPending), Some(Pending));
        assert_eq!(next_commission_status(Pending, PaymentStatus::DepositPaid), None);
        // a paid-out commission only moves on cancellation
        assert_eq!(next_commission_status(Paid, PaymentStatus::DepositPaid), None);
    }

    #[test]
    fn test_reconcile_with_reports_change() {
        let mut c = commission(Approved);
        assert!(c.reconcile_with(PaymentStatus::Cancelled, Utc::now()));
        assert_eq!(c.status, Pending);
        assert!(!c.reconcile_with(PaymentStatus::Cancelled, Utc::now()));
    }

    #[test]
    fn test_mark_paid_requires_approved() {
        let mut c = commission(Approved);
        let now = Utc::now();
        c.mark_paid(now).unwrap();
        assert_eq!(c.status, Paid);
        assert_eq!(c.paid_at, Some(now));

        let err = c.mark_paid(Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCommissionState { current: Paid, .. }));
        assert_eq!(c.paid_at, Some(now));

        let mut pending = commission(Pending);
        assert!(pending.mark_paid(Utc::now()).is_err());
        assert!(pending.paid_at.is_none());
    }

    #[test]
    fn test_cancel_keeps_paid_at_history() {
        let mut c = commission(Approved);
        let paid_at = Utc::now();
        c.mark_paid(paid_at).unwrap();
        c.reconcile_with(PaymentStatus::Cancelled, Utc::now());
        assert_eq!(c.status, Pending);
        assert_eq!(c.paid_at, Some(paid_at));
    }
}
