//! # voyage-db: Database Layer for the Booking Engine
//!
//! SQLite storage for bookings, tranches, commissions and the reconciliation
//! outbox, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Voyage Data Flow                                 │
//! │                                                                         │
//! │  voyage-engine (BookingService, CommissionEngine, ReconciliationSweep)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     voyage-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │   │   │
//! │  │   │               │    │ BookingRepo   │    │              │   │   │
//! │  │   │ SqlitePool    │◄───│ CommissionRepo│    │ 001_initial  │   │   │
//! │  │   │ begin()       │    │ OutboxRepo    │    │   _schema    │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use voyage_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("voyage.db")).await?;
//! let booking = db.bookings().get_by_id(&booking_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::booking::BookingRepository;
pub use repository::commission::CommissionRepository;
pub use repository::customer::CustomerRepository;
pub use repository::outbox::ReconciliationOutboxRepository;
pub use repository::sales_user::SalesUserRepository;
pub use repository::trip::TripRepository;
