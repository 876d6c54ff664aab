//! Handlers for the ticket lifecycle (connect, verify, transfer).

use axum::extract::State;
use axum::Json;
use handoff_core::character::{CharacterRecord, CharacterTarget};
use handoff_core::connection::ConnectionTicket;
use serde::Deserialize;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /connections`.
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub target: CharacterTarget,
}

/// Request body for `POST /connections/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub connection_id: String,
    pub server_name: String,
}

/// Request body for `POST /transfers`.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub character: String,
    pub target_location: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/connections
///
/// Allocate a game server for a character and return a single-use ticket.
pub async fn connect(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppJson(input): AppJson<ConnectRequest>,
) -> AppResult<Json<DataResponse<ConnectionTicket>>> {
    let ticket = state
        .connections
        .connect_game_server(&caller, &input.target)
        .await?;
    Ok(Json(DataResponse { data: ticket }))
}

/// POST /api/v1/connections/verify
///
/// Redeem a ticket from a game server. Returns the connecting character.
pub async fn verify(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppJson(input): AppJson<VerifyRequest>,
) -> AppResult<Json<DataResponse<CharacterRecord>>> {
    let character = state
        .connections
        .verify_connect(&caller, &input.connection_id, &input.server_name)
        .await?;
    Ok(Json(DataResponse { data: character }))
}

/// POST /api/v1/transfers
///
/// Move a connected character to an instance serving `target_location`.
pub async fn transfer(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppJson(input): AppJson<TransferRequest>,
) -> AppResult<Json<DataResponse<ConnectionTicket>>> {
    let ticket = state
        .connections
        .transfer_player(&caller, &input.character, &input.target_location)
        .await?;
    Ok(Json(DataResponse { data: ticket }))
}
