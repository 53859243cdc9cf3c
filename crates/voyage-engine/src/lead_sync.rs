//! # Lead Status Synchronization
//!
//! The seam to the lead subsystem. The engine only knows "given a lead id,
//! resynchronize it"; the rules that decide a lead's status live behind this
//! trait.
//!
//! ```text
//! BookingService::update_booking
//!   └── tx (one connection)
//!         ├── UPDATE bookings ...
//!         ├── for lead in leads_for_customer(customer_id):
//!         │       sync.sync_lead_status(&mut tx, lead.id)   ← same connection
//!         └── INSERT INTO reconciliation_outbox ...
//! ```
//!
//! An implementation receives the transaction's connection. Anything it writes
//! commits or rolls back with the booking, and an `Err` aborts the update.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;
use thiserror::Error;
use tracing::debug;

use voyage_db::repository::customer;

/// A lead could not be resynchronized.
#[derive(Debug, Error)]
#[error("lead {lead_id}: {reason}")]
pub struct LeadSyncError {
    pub lead_id: String,
    pub reason: String,
}

impl LeadSyncError {
    pub fn new(lead_id: impl Into<String>, reason: impl Into<String>) -> Self {
        LeadSyncError {
            lead_id: lead_id.into(),
            reason: reason.into(),
        }
    }
}

/// Resynchronizes one lead after its customer's booking changed status.
#[async_trait]
pub trait LeadStatusSync: Send + Sync {
    async fn sync_lead_status(
        &self,
        conn: &mut SqliteConnection,
        lead_id: &str,
    ) -> Result<(), LeadSyncError>;
}

/// Default collaborator: stamps `leads.status_synced_at`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StampLeadSync;

#[async_trait]
impl LeadStatusSync for StampLeadSync {
    async fn sync_lead_status(
        &self,
        conn: &mut SqliteConnection,
        lead_id: &str,
    ) -> Result<(), LeadSyncError> {
        let found = customer::touch_lead_sync(conn, lead_id, Utc::now())
            .await
            .map_err(|e| LeadSyncError::new(lead_id, e.to_string()))?;

        if !found {
            return Err(LeadSyncError::new(lead_id, "lead does not exist"));
        }

        debug!(lead_id = %lead_id, "Lead status resynchronized");
        Ok(())
    }
}
