//! # voyage-engine: Booking Reconciliation Engine
//!
//! Booking writes, the lead fan-out that rides in their transaction, and the
//! commission bookkeeping that follows them.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Reconciliation Engine                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                BookingService (reconciliation.rs)                │  │
//! │  │                                                                  │  │
//! │  │  create_booking / update_booking / payment_summary               │  │
//! │  │  one transaction: booking + tranches + lead sync + outbox marker │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ after commit                            │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌──────────────────┐  ┌────────────────────────┐  │
//! │  │ LeadStatusSync │  │ CommissionEngine │  │ ReconciliationSweep    │  │
//! │  │                │  │                  │  │                        │  │
//! │  │ trait seam to  │  │ fully-paid grant │◄─│ retries markers the    │  │
//! │  │ the lead rules │  │ status follow-up │  │ post-commit call left  │  │
//! │  │ (in the tx)    │  │ payout           │  │ pending                │  │
//! │  └────────────────┘  └──────────────────┘  └────────────────────────┘  │
//! │                                                                         │
//! │  EngineConfig: defaults → engine.toml → VOYAGE_* environment            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`reconciliation`] - `BookingService`, the transaction boundary
//! - [`commission`] - `CommissionEngine`
//! - [`sweep`] - `ReconciliationSweep` background worker
//! - [`lead_sync`] - `LeadStatusSync` collaborator trait
//! - [`config`] - `EngineConfig`
//! - [`error`] - `EngineError` and `ErrorKind`
//!
//! ## Usage
//! ```rust,ignore
//! use std::sync::Arc;
//! use voyage_core::{BookingPatch, PaymentStatus};
//! use voyage_db::Database;
//! use voyage_engine::{BookingService, EngineConfig, StampLeadSync};
//!
//! let config = EngineConfig::load(None)?;
//! let db = Arc::new(Database::new(config.db_config()).await?);
//! let service = BookingService::from_config(db, Arc::new(StampLeadSync), &config);
//!
//! let update = service
//!     .update_booking(&booking_id, BookingPatch::status(PaymentStatus::FullyPaid))
//!     .await?;
//! ```

pub mod commission;
pub mod config;
pub mod error;
pub mod lead_sync;
pub mod reconciliation;
pub mod sweep;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use commission::CommissionEngine;
pub use config::{DatabaseSettings, EngineConfig, EngineSettings, SweepSettings};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use lead_sync::{LeadStatusSync, LeadSyncError, StampLeadSync};
pub use reconciliation::{BookingCreated, BookingService, BookingUpdate, CommissionOutcome};
pub use sweep::{ReconciliationSweep, ReconciliationSweepHandle, SweepReport};
