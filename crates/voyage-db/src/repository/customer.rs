//! # Customer Repository
//!
//! Customers and the leads they own. Lead status rules live elsewhere; this
//! layer only lists a customer's leads and stamps when one was resynced.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use voyage_core::{Customer, Lead};

// =============================================================================
// Connection-level queries
// =============================================================================

pub async fn get_customer(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        "SELECT id, full_name, created_at FROM customers WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(customer)
}

pub async fn get_lead(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Lead>> {
    let lead = sqlx::query_as::<_, Lead>(
        r#"
        SELECT id, customer_id, status, status_synced_at, created_at
        FROM leads
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(lead)
}

/// All leads owned by a customer, oldest first.
pub async fn leads_for_customer(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<Vec<Lead>> {
    let leads = sqlx::query_as::<_, Lead>(
        r#"
        SELECT id, customer_id, status, status_synced_at, created_at
        FROM leads
        WHERE customer_id = ?1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(customer_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(leads)
}

/// Records that a lead's status was resynchronized. Returns `false` if the
/// lead does not exist.
pub async fn touch_lead_sync(
    conn: &mut SqliteConnection,
    lead_id: &str,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    debug!(lead_id = %lead_id, "Stamping lead status sync");

    let result = sqlx::query("UPDATE leads SET status_synced_at = ?2 WHERE id = ?1")
        .bind(lead_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for customers and leads.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        get_customer(&mut conn, id).await
    }

    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(customer_id = %customer.id, "Inserting customer");

        sqlx::query("INSERT INTO customers (id, full_name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&customer.id)
            .bind(&customer.full_name)
            .bind(customer.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_lead(&self, id: &str) -> DbResult<Option<Lead>> {
        let mut conn = self.pool.acquire().await?;
        get_lead(&mut conn, id).await
    }

    pub async fn insert_lead(&self, lead: &Lead) -> DbResult<()> {
        debug!(lead_id = %lead.id, customer_id = %lead.customer_id, "Inserting lead");

        sqlx::query(
            r#"
            INSERT INTO leads (id, customer_id, status, status_synced_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&lead.id)
        .bind(&lead.customer_id)
        .bind(&lead.status)
        .bind(lead.status_synced_at)
        .bind(lead.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn leads_for_customer(&self, customer_id: &str) -> DbResult<Vec<Lead>> {
        let mut conn = self.pool.acquire().await?;
        leads_for_customer(&mut conn, customer_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
