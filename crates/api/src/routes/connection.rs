//! Route definitions for the ticket lifecycle.

use axum::routing::post;
use axum::Router;

use crate::handlers::connection;
use crate::state::AppState;

/// Routes mounted at `/connections`.
///
/// ```text
/// POST /         -> connect (player)
/// POST /verify   -> verify (game server)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(connection::connect))
        .route("/verify", post(connection::verify))
}

/// Routes mounted at `/transfers`.
///
/// ```text
/// POST /   -> transfer (game server)
/// ```
pub fn transfer_router() -> Router<AppState> {
    Router::new().route("/", post(connection::transfer))
}
