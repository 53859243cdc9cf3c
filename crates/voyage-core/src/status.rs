//! # Payment State Machine
//!
//! Owns the rules around a booking's `payment_status`.
//!
//! ## Strict Transitions
//! ```text
//! ┌─────────────────┬───────────────────────────────────────────────┐
//! │ from            │ allowed to                                    │
//! ├─────────────────┼───────────────────────────────────────────────┤
//! │ DEPOSIT_PENDING │ DEPOSIT_PAID, FULLY_PAID, CANCELLED           │
//! │ DEPOSIT_PAID    │ DEPOSIT_PENDING, FULLY_PAID, CANCELLED        │
//! │ FULLY_PAID      │ DEPOSIT_PAID, CANCELLED                       │
//! │ CANCELLED       │ (terminal)                                    │
//! └─────────────────┴───────────────────────────────────────────────┘
//! ```
//! Permissive (the default) accepts any → any.
//!
//! ## Change Detection
//! Side effects (lead resync, commission reconciliation) fire only when the
//! stored value actually differs from the new one. Supplying the current
//! status again is a no-op.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{PaymentStatus, ReconcileKind};

// =============================================================================
// Status Change
// =============================================================================

/// An observed change of `payment_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
}

impl StatusChange {
    /// Compares by value: `None` or an equal status is not a change.
    pub fn detect(from: PaymentStatus, requested: Option<PaymentStatus>) -> Option<StatusChange> {
        match requested {
            Some(to) if to != from => Some(StatusChange { from, to }),
            _ => None,
        }
    }

    /// True when the booking just became fully paid.
    #[inline]
    pub fn is_fully_paid_arrival(&self) -> bool {
        self.to.is_fully_paid() && !self.from.is_fully_paid()
    }

    /// Which commission entry point this change calls for.
    pub fn reconcile_kind(&self) -> ReconcileKind {
        if self.is_fully_paid_arrival() {
            ReconcileKind::FullyPaidArrival
        } else {
            ReconcileKind::StatusChange
        }
    }
}

// =============================================================================
// Transition Policy
// =============================================================================

/// How strictly status transitions are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any status may follow any other.
    #[default]
    Permissive,
    /// Only the allow-listed transitions are accepted.
    Strict,
}

impl TransitionPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            TransitionPolicy::Strict
        } else {
            TransitionPolicy::Permissive
        }
    }

    /// Checks a requested move. Staying put is always allowed.
    pub fn check(&self, from: PaymentStatus, to: PaymentStatus) -> CoreResult<()> {
        if from == to || *self == TransitionPolicy::Permissive || strict_allows(from, to) {
            return Ok(());
        }
        Err(CoreError::InvalidStatusTransition { from, to })
    }
}

fn strict_allows(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;

    matches!(
        (from, to),
        (DepositPending, DepositPaid)
            | (DepositPending, FullyPaid)
            | (DepositPending, Cancelled)
            | (DepositPaid, DepositPending)
            | (DepositPaid, FullyPaid)
            | (DepositPaid, Cancelled)
            | (FullyPaid, DepositPaid)
            | (FullyPaid, Cancelled)
    )
}

// =============================================================================
// Status Source
// =============================================================================

/// Where a booking's new status comes from on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    /// The caller's value is taken as-is.
    #[default]
    Caller,
    /// Computed from paid vs. total after the update is applied.
    Derived,
}

impl StatusSource {
    pub fn from_derived(derived: bool) -> Self {
        if derived {
            StatusSource::Derived
        } else {
            StatusSource::Caller
        }
    }

    /// Picks the status the booking should end up with.
    ///
    /// In derived mode a requested CANCELLED always wins, and a cancelled
    /// booking stays cancelled unless the caller explicitly asks for another
    /// status (reinstatement), in which case the derived value is used.
    pub fn resolve(
        &self,
        current: PaymentStatus,
        requested: Option<PaymentStatus>,
        paid: Money,
        total: Money,
        expected_first: Money,
    ) -> PaymentStatus {
        match self {
            StatusSource::Caller => requested.unwrap_or(current),
            StatusSource::Derived => match requested {
                Some(PaymentStatus::Cancelled) => PaymentStatus::Cancelled,
                None if current.is_cancelled() => PaymentStatus::Cancelled,
                _ => derive_payment_status(paid, total, expected_first),
            },
        }
    }
}

/// Status implied by the money alone.
///
/// ```text
/// paid ≥ total          → FULLY_PAID
/// paid ≥ expected_first → DEPOSIT_PAID
/// otherwise             → DEPOSIT_PENDING
/// ```
pub fn derive_payment_status(paid: Money, total: Money, expected_first: Money) -> PaymentStatus {
    if paid >= total {
        PaymentStatus::FullyPaid
    } else if paid >= expected_first {
        PaymentStatus::DepositPaid
    } else {
        PaymentStatus::DepositPending
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
