//! [`PendingConnectionStore`] backed by the `pending_connections` table.

use async_trait::async_trait;
use handoff_core::pending::{PendingConnection, PendingConnectionStore, StoreError};
use handoff_core::types::{ConnectionId, Timestamp};

use crate::models::pending_connection::CreatePendingConnection;
use crate::repositories::PendingConnectionRepo;
use crate::DbPool;

/// PostgreSQL unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgPendingConnectionStore {
    pool: DbPool,
}

impl PgPendingConnectionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PendingConnectionStore for PgPendingConnectionStore {
    async fn create(
        &self,
        character: &str,
        server_name: &str,
    ) -> Result<PendingConnection, StoreError> {
        let id = ConnectionId::new_v4();
        let input = CreatePendingConnection {
            id,
            character,
            server_name,
        };
        let row = PendingConnectionRepo::create(&self.pool, &input)
            .await
            .map_err(|e| classify(e, id))?;
        Ok(row.into())
    }

    async fn consume(&self, id: ConnectionId) -> Result<Option<PendingConnection>, StoreError> {
        let row = PendingConnectionRepo::take(&self.pool, id)
            .await
            .map_err(|e| classify(e, id))?;
        Ok(row.map(Into::into))
    }

    async fn reap(&self, older_than: Timestamp) -> Result<u64, StoreError> {
        PendingConnectionRepo::delete_older_than(&self.pool, older_than)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

fn classify(err: sqlx::Error, id: ConnectionId) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Collision(id)
        }
        _ => {
            tracing::error!(error = %err, connection_id = %id, "Ticket store query failed");
            StoreError::Backend(err.to_string())
        }
    }
}
