//! Pending connection model and DTOs.

use handoff_core::pending::PendingConnection;
use handoff_core::types::{ConnectionId, Timestamp};
use sqlx::FromRow;

/// A row from the `pending_connections` table.
#[derive(Debug, Clone, FromRow)]
pub struct PendingConnectionRow {
    pub id: ConnectionId,
    pub character: String,
    pub server_name: String,
    pub created_at: Timestamp,
}

impl From<PendingConnectionRow> for PendingConnection {
    fn from(row: PendingConnectionRow) -> Self {
        Self {
            id: row.id,
            character: row.character,
            server_name: row.server_name,
            created_at: row.created_at,
        }
    }
}

/// DTO for inserting a new ticket. The id is generated by the caller.
pub struct CreatePendingConnection<'a> {
    pub id: ConnectionId,
    pub character: &'a str,
    pub server_name: &'a str,
}
