//! # Domain Types
//!
//! Core domain types for the booking payment lifecycle.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Booking     │   │     Payment     │   │   Commission    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  customer/trip  │◄──│  booking_id     │   │  booking_id ◄───┼─ 1:1  │
//! │  │  extras/discount│   │  slot 1st/2nd/3rd   │  amount_cents   │       │
//! │  │  payment_status │   │  amount_cents   │   │  status         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  PaymentStatus  │   │ CommissionStatus│   │FirstPaymentRatio│       │
//! │  │  DepositPending │   │  Pending        │   │  Full   (100%)  │       │
//! │  │  DepositPaid    │   │  Approved       │   │  Half    (50%)  │       │
//! │  │  FullyPaid      │   │  Paid           │   │  Thirty  (30%)  │       │
//! │  │  Cancelled      │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity is keyed by a UUID v4 string, matching the storage layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

// =============================================================================
// First Payment Ratio
// =============================================================================

/// Fraction of the total the first tranche is expected to cover.
///
/// Advisory only: it pre-fills the expected deposit, it never blocks a
/// first payment of a different size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum FirstPaymentRatio {
    /// 100% up front.
    #[default]
    Full,
    /// 50% deposit.
    Half,
    /// 30% deposit.
    Thirty,
}

impl FirstPaymentRatio {
    /// Returns the ratio in basis points (10000 = 100%).
    #[inline]
    pub const fn bps(&self) -> u32 {
        match self {
            FirstPaymentRatio::Full => 10_000,
            FirstPaymentRatio::Half => 5_000,
            FirstPaymentRatio::Thirty => 3_000,
        }
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Payment state of a booking.
///
/// Caller-supplied and authoritative: the engine does not recompute it from
/// tranche sums unless derived mode is switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Booking created, deposit not yet confirmed.
    #[default]
    DepositPending,
    /// Deposit received, balance outstanding.
    DepositPaid,
    /// Booking settled in full.
    FullyPaid,
    /// Booking cancelled.
    Cancelled,
}

impl PaymentStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::DepositPending,
        PaymentStatus::DepositPaid,
        PaymentStatus::FullyPaid,
        PaymentStatus::Cancelled,
    ];

    #[inline]
    pub const fn is_fully_paid(&self) -> bool {
        matches!(self, PaymentStatus::FullyPaid)
    }

    #[inline]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, PaymentStatus::Cancelled)
    }

    /// Statuses a booking may be created with.
    #[inline]
    pub const fn is_valid_initial(&self) -> bool {
        matches!(self, PaymentStatus::DepositPending | PaymentStatus::DepositPaid)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::DepositPending => write!(f, "DEPOSIT_PENDING"),
            PaymentStatus::DepositPaid => write!(f, "DEPOSIT_PAID"),
            PaymentStatus::FullyPaid => write!(f, "FULLY_PAID"),
            PaymentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

// =============================================================================
// Tranche Slot
// =============================================================================

/// One of the three ordered payment slots on a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TrancheSlot {
    First,
    Second,
    Third,
}

impl TrancheSlot {
    pub const ALL: [TrancheSlot; 3] = [TrancheSlot::First, TrancheSlot::Second, TrancheSlot::Third];

    /// The slot that must already be filled before this one may be.
    #[inline]
    pub const fn predecessor(&self) -> Option<TrancheSlot> {
        match self {
            TrancheSlot::First => None,
            TrancheSlot::Second => Some(TrancheSlot::First),
            TrancheSlot::Third => Some(TrancheSlot::Second),
        }
    }
}

impl fmt::Display for TrancheSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrancheSlot::First => write!(f, "first"),
            TrancheSlot::Second => write!(f, "second"),
            TrancheSlot::Third => write!(f, "third"),
        }
    }
}

// =============================================================================
// Commission Status
// =============================================================================

/// Payout state of a commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    /// Earned on paper but not payable (booking not settled or cancelled).
    Pending,
    /// Payable.
    Approved,
    /// Paid out to the agent.
    Paid,
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommissionStatus::Pending => write!(f, "PENDING"),
            CommissionStatus::Approved => write!(f, "APPROVED"),
            CommissionStatus::Paid => write!(f, "PAID"),
        }
    }
}

// =============================================================================
// Reference Data
// =============================================================================

/// A sellable trip. Only the base price matters to this engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Trip {
    pub id: String,
    pub name: String,
    /// Base price per booking in cents.
    pub base_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

/// A sales agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesUser {
    pub id: String,
    pub full_name: String,
    /// Flat commission per booking in cents. `None` or zero means none due.
    pub commission_per_head_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl SalesUser {
    /// The commission owed per fully paid booking, if any.
    pub fn commission_per_head(&self) -> Option<Money> {
        self.commission_per_head_cents
            .map(Money::from_cents)
            .filter(Money::is_positive)
    }
}

/// A sales lead owned by a customer.
///
/// Lead status rules live in another subsystem; the engine only asks for a
/// resync whenever a booking's payment status moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Lead {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub status_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment (Tranche)
// =============================================================================

/// A recorded payment filling one tranche slot. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    pub slot: TrancheSlot,
    pub amount_cents: i64,
    pub paid_at: DateTime<Utc>,
    /// URI of the externally stored proof-of-payment document.
    pub proof_uri: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Input for recording a tranche.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTranche {
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
    pub proof_uri: Option<String>,
}

impl NewTranche {
    pub fn new(amount: Money, paid_at: DateTime<Utc>) -> Self {
        NewTranche {
            amount,
            paid_at,
            proof_uri: None,
        }
    }

    pub fn with_proof(mut self, uri: impl Into<String>) -> Self {
        self.proof_uri = Some(uri.into());
        self
    }
}

// =============================================================================
// Booking
// =============================================================================

/// A customer's booking on a trip.
///
/// `total_amount` is deliberately absent: it is recomputed from the trip's
/// base price and the current extras on every use (see [`crate::pricing`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub trip_id: String,
    /// Agent credited with the sale.
    pub sales_user_id: String,
    pub referring_agent_id: Option<String>,
    pub lead_id: Option<String>,
    pub companion_customer_ids: Vec<String>,

    pub extra_single_cents: Option<i64>,
    pub extra_bed_cents: Option<i64>,
    pub extra_seat_cents: Option<i64>,
    pub extra_bag_cents: Option<i64>,
    pub discount_cents: Option<i64>,

    pub first_payment_ratio: FirstPaymentRatio,
    pub payment_status: PaymentStatus,

    pub first_payment: Option<Payment>,
    pub second_payment: Option<Payment>,
    pub third_payment: Option<Payment>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Returns the payment stored in `slot`, if any.
    pub fn tranche(&self, slot: TrancheSlot) -> Option<&Payment> {
        match slot {
            TrancheSlot::First => self.first_payment.as_ref(),
            TrancheSlot::Second => self.second_payment.as_ref(),
            TrancheSlot::Third => self.third_payment.as_ref(),
        }
    }

    pub(crate) fn tranche_mut(&mut self, slot: TrancheSlot) -> &mut Option<Payment> {
        match slot {
            TrancheSlot::First => &mut self.first_payment,
            TrancheSlot::Second => &mut self.second_payment,
            TrancheSlot::Third => &mut self.third_payment,
        }
    }

    /// Iterates the filled tranches in slot order.
    pub fn tranches(&self) -> impl Iterator<Item = &Payment> {
        TrancheSlot::ALL.into_iter().filter_map(move |slot| self.tranche(slot))
    }

    /// Sum of all supplements; absent supplements count as zero.
    ///
    /// `None` when the sum overflows.
    pub fn extras(&self) -> Option<Money> {
        Money::checked_sum(
            [
                self.extra_single_cents,
                self.extra_bed_cents,
                self.extra_seat_cents,
                self.extra_bag_cents,
            ]
            .into_iter()
            .map(Money::from_optional_cents),
        )
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_optional_cents(self.discount_cents)
    }
}

/// Input for creating a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub customer_id: String,
    pub trip_id: String,
    pub sales_user_id: String,
    pub referring_agent_id: Option<String>,
    pub lead_id: Option<String>,
    pub companion_customer_ids: Vec<String>,
    pub extra_single: Option<Money>,
    pub extra_bed: Option<Money>,
    pub extra_seat: Option<Money>,
    pub extra_bag: Option<Money>,
    pub discount: Option<Money>,
    pub first_payment_ratio: FirstPaymentRatio,
    pub payment_status: PaymentStatus,
    pub first_payment: NewTranche,
}

impl NewBooking {
    /// A booking with no extras, no discount and no companions.
    pub fn new(
        customer_id: impl Into<String>,
        trip_id: impl Into<String>,
        sales_user_id: impl Into<String>,
        first_payment: NewTranche,
    ) -> Self {
        NewBooking {
            customer_id: customer_id.into(),
            trip_id: trip_id.into(),
            sales_user_id: sales_user_id.into(),
            referring_agent_id: None,
            lead_id: None,
            companion_customer_ids: Vec::new(),
            extra_single: None,
            extra_bed: None,
            extra_seat: None,
            extra_bag: None,
            discount: None,
            first_payment_ratio: FirstPaymentRatio::default(),
            payment_status: PaymentStatus::default(),
            first_payment,
        }
    }
}

/// A partial booking update. `None` leaves a field untouched.
///
/// Nullable fields use `Option<Option<_>>`: `Some(None)` clears the value,
/// `Some(Some(v))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingPatch {
    pub trip_id: Option<String>,
    pub sales_user_id: Option<String>,
    pub referring_agent_id: Option<Option<String>>,
    pub lead_id: Option<Option<String>>,
    pub companion_customer_ids: Option<Vec<String>>,
    pub extra_single: Option<Option<Money>>,
    pub extra_bed: Option<Option<Money>>,
    pub extra_seat: Option<Option<Money>>,
    pub extra_bag: Option<Option<Money>>,
    pub discount: Option<Option<Money>>,
    pub first_payment_ratio: Option<FirstPaymentRatio>,
    pub payment_status: Option<PaymentStatus>,
    pub second_payment: Option<NewTranche>,
    pub third_payment: Option<NewTranche>,
}

impl BookingPatch {
    /// A patch that only sets the payment status.
    pub fn status(status: PaymentStatus) -> Self {
        BookingPatch {
            payment_status: Some(status),
            ..Default::default()
        }
    }

    /// True when the patch touches any pricing input.
    pub fn changes_pricing(&self) -> bool {
        self.trip_id.is_some()
            || self.extra_single.is_some()
            || self.extra_bed.is_some()
            || self.extra_seat.is_some()
            || self.extra_bag.is_some()
            || self.discount.is_some()
    }
}

// =============================================================================
// Commission
// =============================================================================

/// The single commission owed to an agent for one booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Commission {
    pub id: String,
    pub booking_id: String,
    pub sales_user_id: String,
    /// Copied from the agent's rate when the commission was created.
    pub amount_cents: i64,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Commission {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Per-status commission totals for one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSummary {
    pub pending: Money,
    pub approved: Money,
    pub paid: Money,
}

impl CommissionSummary {
    /// Adds `amount` to the bucket for `status`.
    pub fn add(&mut self, status: CommissionStatus, amount: Money) {
        match status {
            CommissionStatus::Pending => self.pending += amount,
            CommissionStatus::Approved => self.approved += amount,
            CommissionStatus::Paid => self.paid += amount,
        }
    }

    pub fn total(&self) -> Money {
        self.pending + self.approved + self.paid
    }
}

// =============================================================================
// Reconciliation Outbox
// =============================================================================

/// Which reconciliation entry point a status change requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReconcileKind {
    /// The booking just became FULLY_PAID: a commission may need creating.
    FullyPaidArrival,
    /// Any other status move: an existing commission may need adjusting.
    StatusChange,
}

impl fmt::Display for ReconcileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileKind::FullyPaidArrival => write!(f, "fully_paid_arrival"),
            ReconcileKind::StatusChange => write!(f, "status_change"),
        }
    }
}

/// A durable "needs reconciliation" marker.
///
/// Written in the same transaction as the booking change so a crash between
/// commit and the post-commit call cannot lose the work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReconciliationMarker {
    pub id: String,
    pub booking_id: String,
    pub kind: ReconcileKind,
    /// JSON of the status change that raised the marker.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
