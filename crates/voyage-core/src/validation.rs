//! # Validation Module
//!
//! Input validation for booking creation and updates.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure)                                            │
//! │  ├── Required ids, positive tranche amounts                             │
//! │  ├── Non-negative extras and discounts                                  │
//! │  └── Initial status, distinct companions                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: voyage-engine (inside the transaction)                        │
//! │  ├── Referenced agent / customer / trip / lead exist                    │
//! │  └── Companions already hold a booking on the same trip                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK constraints on amounts                                       │
//! │  ├── UNIQUE(booking_id, slot), UNIQUE(booking_id) on commissions        │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use voyage_core::money::Money;
//! use voyage_core::validation::{validate_tranche_amount, validate_required_id};
//!
//! validate_required_id("trip_id", "6f1c2d3e").unwrap();
//! assert!(validate_tranche_amount(Money::zero()).is_err());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{NewBooking, PaymentStatus};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates that a reference id is present.
pub fn validate_required_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates that an optional reference id, when given, is not blank.
pub fn validate_optional_id(field: &str, id: Option<&str>) -> ValidationResult<()> {
    match id {
        Some(id) if id.trim().is_empty() => Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not be blank when supplied".to_string(),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Money Validators
// =============================================================================

/// Validates a tranche amount.
///
/// ## Rules
/// - Must be strictly positive
/// - No upper bound: overpayment against the booking total is allowed
pub fn validate_tranche_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    Ok(())
}

/// Validates an optional supplement or discount.
///
/// Absent is fine; zero is fine; negative is not.
pub fn validate_optional_charge(field: &str, amount: Option<Money>) -> ValidationResult<()> {
    match amount {
        Some(amount) if amount.is_negative() => Err(ValidationError::MustBeNonNegative {
            field: field.to_string(),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Booking Validators
// =============================================================================

/// Validates the status a booking is created with.
///
/// Only `DEPOSIT_PENDING` and `DEPOSIT_PAID` are accepted.
pub fn validate_initial_status(status: PaymentStatus) -> ValidationResult<()> {
    if status.is_valid_initial() {
        Ok(())
    } else {
        Err(ValidationError::NotAllowed {
            field: "payment_status".to_string(),
            allowed: vec![
                PaymentStatus::DepositPending.to_string(),
                PaymentStatus::DepositPaid.to_string(),
            ],
        })
    }
}

/// Validates a companion list on its own.
///
/// ## Rules
/// - No blank ids
/// - No duplicates
/// - The booking's own customer may not be listed
///
/// Whether each companion already travels on the trip needs storage and is
/// checked by the engine.
pub fn validate_companions(customer_id: &str, companions: &[String]) -> ValidationResult<()> {
    let mut seen = HashSet::with_capacity(companions.len());
    for companion in companions {
        validate_required_id("companion_customer_ids", companion)?;

        if companion == customer_id {
            return Err(ValidationError::InvalidFormat {
                field: "companion_customer_ids".to_string(),
                reason: "the booking customer cannot be their own companion".to_string(),
            });
        }
        if !seen.insert(companion.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "companion_customer_ids".to_string(),
                value: companion.clone(),
            });
        }
    }
    Ok(())
}

/// Runs every storage-free check on a new booking.
pub fn validate_new_booking(booking: &NewBooking) -> ValidationResult<()> {
    validate_required_id("customer_id", &booking.customer_id)?;
    validate_required_id("trip_id", &booking.trip_id)?;
    validate_required_id("sales_user_id", &booking.sales_user_id)?;
    validate_optional_id("referring_agent_id", booking.referring_agent_id.as_deref())?;
    validate_optional_id("lead_id", booking.lead_id.as_deref())?;

    validate_optional_charge("extra_single", booking.extra_single)?;
    validate_optional_charge("extra_bed", booking.extra_bed)?;
    validate_optional_charge("extra_seat", booking.extra_seat)?;
    validate_optional_charge("extra_bag", booking.extra_bag)?;
    validate_optional_charge("discount", booking.discount)?;

    validate_initial_status(booking.payment_status)?;
    validate_tranche_amount(booking.first_payment.amount)?;
    validate_companions(&booking.customer_id, &booking.companion_customer_ids)?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
