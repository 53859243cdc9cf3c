//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Booking totals feed tranche expectations AND commission payouts.       │
//! │  A drifting cent here becomes a disputed invoice later.                 │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    10,000.00 × 30% = 1,000,000 cents × 3000 bps / 10000                 │
//! │                    = 300,000 cents  (exact)                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use voyage_core::money::Money;
//!
//! let base = Money::from_major_minor(10_000, 0);
//! let extra = Money::from_cents(45_050);
//! let total = base + extra;
//! assert_eq!(total.cents(), 1_045_050);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Basis points in one whole (100%).
pub const BPS_DENOMINATOR: u32 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: outstanding balances go negative on overpayment
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - Currency is implied by the agency's ledger; no mixed-currency math happens here
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Trip.base_price ──┐                                                    │
/// │  Booking extras  ──┼──► total_amount ──► expected first tranche         │
/// │  Booking discount ─┘                                                    │
/// │                                                                         │
/// │  Tranche amounts ─────► paid_amount ───► outstanding balance            │
/// │                                                                         │
/// │  Agent.commission_per_head ──► Commission.amount (copied once)          │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use voyage_core::money::Money;
    ///
    /// let deposit = Money::from_cents(250_000); // 2,500.00
    /// assert_eq!(deposit.cents(), 250_000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Adds two amounts, returning `None` if the result does not fit in i64.
    ///
    /// Pricing sums go through this; amounts are only bounded below by
    /// validation, so `+` on untrusted input can overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Subtracts `other`, returning `None` on overflow.
    #[inline]
    pub const fn checked_sub(self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums the amounts, returning `None` as soon as a partial sum overflows.
    ///
    /// ## Example
    /// ```rust
    /// use voyage_core::money::Money;
    ///
    /// let amounts = [Money::from_cents(i64::MAX), Money::from_cents(1)];
    /// assert_eq!(Money::checked_sum(amounts), None);
    /// ```
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }

    /// Converts an optional cents column into Money, treating `None` as zero.
    ///
    /// Booking extras and discounts are nullable; every pricing formula
    /// counts an absent charge as nothing owed.
    #[inline]
    pub fn from_optional_cents(cents: Option<i64>) -> Self {
        Money(cents.unwrap_or(0))
    }

    /// Scales the amount by a ratio expressed in basis points.
    ///
    /// ## Rounding
    /// Half away from zero, to the nearest cent:
    /// ```text
    /// 333.33 × 50%  = 166.665 → 166.67
    /// -333.33 × 50% = -166.665 → -166.67
    /// ```
    /// i128 intermediates keep large totals from overflowing.
    ///
    /// ## Example
    /// ```rust
    /// use voyage_core::money::Money;
    ///
    /// let total = Money::from_major_minor(10_000, 0);
    /// assert_eq!(total.apply_bps(5_000), Money::from_major_minor(5_000, 0));
    /// ```
    pub fn apply_bps(&self, bps: u32) -> Money {
        let product = self.0 as i128 * bps as i128;
        let half = (BPS_DENOMINATOR / 2) as i128;
        let denominator = BPS_DENOMINATOR as i128;
        let scaled = if product >= 0 {
            (product + half) / denominator
        } else {
            (product - half) / denominator
        };
        Money(scaled as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain `major.minor` rendering for logs; presentation layers format currency.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
