//! # Repository Module
//!
//! Database repository implementations for the booking store.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pooled (reads, standalone writes)                                      │
//! │       db.bookings().get_by_id(id)                                       │
//! │       db.commissions().summary_for_agent(agent_id)                      │
//! │                                                                         │
//! │  Connection-level (inside a transaction)                                │
//! │       let mut tx = db.begin().await?;                                   │
//! │       booking::update_booking(&mut tx, &booking).await?;                │
//! │       outbox::enqueue(&mut tx, &booking.id, &change).await?;            │
//! │       tx.commit().await?;                                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`BookingRepository`](booking::BookingRepository) - Bookings, tranches, companions
//! - [`CommissionRepository`](commission::CommissionRepository) - Commissions and agent summaries
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers and leads
//! - [`TripRepository`](trip::TripRepository) - Trips
//! - [`SalesUserRepository`](sales_user::SalesUserRepository) - Sales agents
//! - [`ReconciliationOutboxRepository`](outbox::ReconciliationOutboxRepository) - Reconciliation markers

pub mod booking;
pub mod commission;
pub mod customer;
pub mod outbox;
pub mod sales_user;
pub mod trip;

#[cfg(test)]
pub(crate) mod test_fixtures;
