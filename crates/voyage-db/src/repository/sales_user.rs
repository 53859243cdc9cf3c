//! # Sales Agent Repository

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use voyage_core::SalesUser;

pub async fn get_sales_user(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<SalesUser>> {
    let user = sqlx::query_as::<_, SalesUser>(
        r#"
        SELECT id, full_name, commission_per_head_cents, created_at
        FROM sales_users
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(user)
}

/// Repository for sales agents.
#[derive(Debug, Clone)]
pub struct SalesUserRepository {
    pool: SqlitePool,
}

impl SalesUserRepository {
    /// Creates a new SalesUserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SalesUserRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SalesUser>> {
        let mut conn = self.pool.acquire().await?;
        get_sales_user(&mut conn, id).await
    }

    pub async fn insert(&self, user: &SalesUser) -> DbResult<()> {
        debug!(sales_user_id = %user.id, "Inserting sales user");

        sqlx::query(
            r#"
            INSERT INTO sales_users (id, full_name, commission_per_head_cents, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&user.id)
        .bind(&user.full_name)
        .bind(user.commission_per_head_cents)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Changes an agent's per-head rate.
    ///
    /// Existing commissions keep the amount they were created with.
    pub async fn set_commission_rate(&self, id: &str, cents: Option<i64>) -> DbResult<()> {
        let result = sqlx::query("UPDATE sales_users SET commission_per_head_cents = ?2 WHERE id = ?1")
            .bind(id)
            .bind(cents)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SalesUser", id));
        }
        Ok(())
    }
}
