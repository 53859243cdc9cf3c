//! # Pricing
//!
//! Pure money formulas for a booking.
//!
//! ```text
//! total_amount = trip.base_price
//!              + extra_single + extra_bed + extra_seat + extra_bag
//!              − discount
//!
//! paid_amount  = first + second + third      (present tranches only)
//!
//! expected_first = total_amount × ratio      (100% / 50% / 30%)
//! ```
//!
//! The two sums are independent: the total never looks at tranches and the
//! paid amount never looks at pricing fields. Nothing here is cached; callers
//! recompute from current values every time.
//!
//! Amounts are only bounded below by validation, so every sum is checked and
//! an overflow surfaces as [`ValidationError::AmountOverflow`].

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Booking, FirstPaymentRatio, Trip};
use crate::validation::ValidationResult;

fn overflow(field: &str) -> ValidationError {
    ValidationError::AmountOverflow {
        field: field.to_string(),
    }
}

/// Total price of a booking from the trip's base price and current extras.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use voyage_core::money::Money;
/// use voyage_core::pricing::compute_total_amount;
/// use voyage_core::types::{Booking, FirstPaymentRatio, PaymentStatus, Trip};
///
/// let trip = Trip {
///     id: "trip-1".into(),
///     name: "Cappadocia".into(),
///     base_price_cents: 1_000_000,
///     created_at: Utc::now(),
/// };
/// let booking = Booking {
///     id: "b-1".into(),
///     customer_id: "c-1".into(),
///     trip_id: "trip-1".into(),
///     sales_user_id: "a-1".into(),
///     referring_agent_id: None,
///     lead_id: None,
///     companion_customer_ids: vec![],
///     extra_single_cents: Some(50_000),
///     extra_bed_cents: None,
///     extra_seat_cents: None,
///     extra_bag_cents: Some(2_500),
///     discount_cents: Some(10_000),
///     first_payment_ratio: FirstPaymentRatio::Half,
///     payment_status: PaymentStatus::DepositPending,
///     first_payment: None,
///     second_payment: None,
///     third_payment: None,
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
/// assert_eq!(
///     compute_total_amount(&booking, &trip).unwrap(),
///     Money::from_cents(1_042_500)
/// );
/// ```
pub fn compute_total_amount(booking: &Booking, trip: &Trip) -> ValidationResult<Money> {
    booking
        .extras()
        .and_then(|extras| trip.base_price().checked_add(extras))
        .and_then(|gross| gross.checked_sub(booking.discount()))
        .ok_or_else(|| overflow("total_amount"))
}

/// Sum of the tranches recorded so far.
pub fn compute_paid_amount(booking: &Booking) -> ValidationResult<Money> {
    Money::checked_sum(booking.tranches().map(|payment| payment.amount()))
        .ok_or_else(|| overflow("paid_amount"))
}

/// Deposit suggested by the booking's first payment ratio.
///
/// Advisory: a first tranche of any other size is still accepted.
#[inline]
pub fn compute_expected_first_payment(total_amount: Money, ratio: FirstPaymentRatio) -> Money {
    total_amount.apply_bps(ratio.bps())
}

// =============================================================================
// Payment Summary
// =============================================================================

/// Read-only money view of one booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub total: Money,
    pub paid: Money,
    /// `total - paid`; negative when the customer overpaid.
    pub outstanding: Money,
    pub expected_first: Money,
}

impl PaymentSummary {
    pub fn for_booking(booking: &Booking, trip: &Trip) -> ValidationResult<Self> {
        let total = compute_total_amount(booking, trip)?;
        let paid = compute_paid_amount(booking)?;
        Ok(PaymentSummary {
            total,
            paid,
            outstanding: total.checked_sub(paid).ok_or_else(|| overflow("outstanding"))?,
            expected_first: compute_expected_first_payment(total, booking.first_payment_ratio),
        })
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        !self.outstanding.is_positive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
