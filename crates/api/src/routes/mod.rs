pub mod connection;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /connections          issue a ticket (requires play)
/// /connections/verify   redeem a ticket (requires game-server)
/// /transfers            re-issue for another world (requires game-server)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/connections", connection::router())
        .nest("/transfers", connection::transfer_router())
}
