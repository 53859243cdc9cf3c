//! # Error Types
//!
//! Domain-specific error types for voyage-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  voyage-core errors (this file)                                         │
//! │  ├── CoreError        - Tranche, status and commission rule breaches    │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  voyage-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  voyage-engine errors                                                   │
//! │  └── EngineError      - What callers see, with an ErrorKind             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError ← DbError              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::{CommissionStatus, PaymentStatus, TrancheSlot};

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
///
/// Each variant is rejected before anything is written.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A tranche was supplied before the slot it depends on.
    ///
    /// ## When This Occurs
    /// ```text
    /// first_payment:  ✓ stored
    /// second_payment: ✗ missing
    /// third_payment:  ← supplied
    ///      │
    ///      ▼
    /// InvalidTrancheOrder { slot: third, missing: second }
    /// ```
    #[error("cannot record {slot} payment before the {missing} payment")]
    InvalidTrancheOrder {
        slot: TrancheSlot,
        missing: TrancheSlot,
    },

    /// The slot already holds a payment; tranches are append-only.
    #[error("{slot} payment already recorded")]
    TrancheAlreadyExists { slot: TrancheSlot },

    /// A commission was asked to do something its status does not allow.
    #[error("commission {commission_id} is {current}, cannot perform operation")]
    InvalidCommissionState {
        commission_id: String,
        current: CommissionStatus,
    },

    /// Rejected by the strict transition policy.
    #[error("payment status cannot move from {from} to {to}")]
    InvalidStatusTransition { from: PaymentStatus, to: PaymentStatus },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business rule runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// A referenced record does not exist.
    #[error("{entity} '{id}' does not exist")]
    UnknownReference { entity: String, id: String },

    /// A companion customer holds no booking on the same trip.
    #[error("companion '{customer_id}' has no booking on trip '{trip_id}'")]
    CompanionNotOnTrip { customer_id: String, trip_id: String },

    /// A money sum left the representable range.
    #[error("{field} is too large to compute")]
    AmountOverflow { field: String },

    /// Duplicate value in a list that must be distinct.
    #[error("{field} '{value}' is listed more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
