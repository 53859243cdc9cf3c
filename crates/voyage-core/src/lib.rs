//! # voyage-core: Pure Booking Payment Logic
//!
//! The domain rules of the booking payment lifecycle, as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Voyage Back Office                                 │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 voyage-engine (orchestration)                   │   │
//! │  │   create/update booking ──► lead sync ──► commission engine     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ voyage-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌───────────┐ │   │
//! │  │  │  money  │ │ pricing │ │ tranche │ │ status  │ │commission │ │   │
//! │  │  │  Money  │ │ totals  │ │ 1st→3rd │ │ policy  │ │  rules    │ │   │
//! │  │  └─────────┘ └─────────┘ └─────────┘ └─────────┘ └───────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  voyage-db (Database Layer)                     │   │
//! │  │         SQLite queries, migrations, repositories, outbox        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Booking, Payment, Commission, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`pricing`] - Total, paid and expected-first-payment formulas
//! - [`tranche`] - Ordered, append-only payment slots
//! - [`status`] - Payment state machine, transition policy, derived status
//! - [`commission`] - Commission status decisions
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use voyage_core::money::Money;
//! use voyage_core::pricing::compute_expected_first_payment;
//! use voyage_core::types::FirstPaymentRatio;
//!
//! let total = Money::from_major_minor(10_000, 0);
//! let deposit = compute_expected_first_payment(total, FirstPaymentRatio::Half);
//! assert_eq!(deposit, Money::from_major_minor(5_000, 0));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod commission;
pub mod error;
pub mod money;
pub mod pricing;
pub mod status;
pub mod tranche;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::PaymentSummary;
pub use status::{StatusChange, StatusSource, TransitionPolicy};
pub use types::*;
