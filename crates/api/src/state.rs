use std::sync::Arc;

use handoff_core::connection::ConnectionService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (JWT secret, deployment mode, ...).
    pub config: Arc<ServerConfig>,
    /// The ticket broker.
    pub connections: Arc<ConnectionService>,
    /// Postgres pool when the ticket store is database-backed.
    pub pool: Option<handoff_db::DbPool>,
}
