//! # Trip Repository
//!
//! Trips are reference data here: the engine only reads the base price.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use voyage_core::Trip;

pub async fn get_trip(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Trip>> {
    let trip = sqlx::query_as::<_, Trip>(
        "SELECT id, name, base_price_cents, created_at FROM trips WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(trip)
}

/// Repository for trip database operations.
#[derive(Debug, Clone)]
pub struct TripRepository {
    pool: SqlitePool,
}

impl TripRepository {
    /// Creates a new TripRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TripRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Trip>> {
        let mut conn = self.pool.acquire().await?;
        get_trip(&mut conn, id).await
    }

    pub async fn insert(&self, trip: &Trip) -> DbResult<()> {
        debug!(trip_id = %trip.id, base_price_cents = trip.base_price_cents, "Inserting trip");

        sqlx::query(
            "INSERT INTO trips (id, name, base_price_cents, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&trip.id)
        .bind(&trip.name)
        .bind(trip.base_price_cents)
        .bind(trip.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
