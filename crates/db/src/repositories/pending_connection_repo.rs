//! Repository for the `pending_connections` table.

use handoff_core::types::{ConnectionId, Timestamp};
use sqlx::PgPool;

use crate::models::pending_connection::{CreatePendingConnection, PendingConnectionRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, character, server_name, created_at";

pub struct PendingConnectionRepo;

impl PendingConnectionRepo {
    /// Insert a new ticket, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreatePendingConnection<'_>,
    ) -> Result<PendingConnectionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO pending_connections (id, character, server_name)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PendingConnectionRow>(&query)
            .bind(input.id)
            .bind(input.character)
            .bind(input.server_name)
            .fetch_one(pool)
            .await
    }

    /// Delete a ticket and return it in one statement.
    ///
    /// `DELETE ... RETURNING` takes a row lock, so concurrent callers for the
    /// same id see the row at most once.
    pub async fn take(
        pool: &PgPool,
        id: ConnectionId,
    ) -> Result<Option<PendingConnectionRow>, sqlx::Error> {
        let query = format!("DELETE FROM pending_connections WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, PendingConnectionRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Delete tickets created before `cutoff`. Returns the count of deleted rows.
    pub async fn delete_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pending_connections WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
