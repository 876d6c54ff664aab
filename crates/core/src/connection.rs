//! The three broker operations: connect, verify, transfer.
//!
//! Connect and transfer run the same allocate-then-issue sequence and differ
//! only in who may trigger them. Verify is the redeeming side: a game server
//! presents the ticket its client handed over and learns which character is
//! connecting.
//!
//! Ordering invariants:
//! - authorization runs before any collaborator call;
//! - a ticket is only created after allocation succeeded;
//! - a ticket is consumed before its server binding is checked, so a
//!   mismatched redemption burns it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::character::{
    validate_character_name, CharacterDirectory, CharacterRecord, CharacterTarget,
};
use crate::error::CoreError;
use crate::fleet::{AllocationError, FleetAllocator, SelectorPolicy};
use crate::identity::Caller;
use crate::pending::{PendingConnectionStore, DEFAULT_TICKET_TTL};
use crate::roles::{Capability, RoleCatalog};
use crate::types::ConnectionId;

/// Default upper bound on a single allocator round-trip.
pub const DEFAULT_ALLOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// What a client needs to reach its server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionTicket {
    pub address: String,
    pub port: u16,
    pub connection_id: ConnectionId,
}

pub struct ConnectionService {
    roles: RoleCatalog,
    directory: Arc<dyn CharacterDirectory>,
    allocator: Arc<dyn FleetAllocator>,
    store: Arc<dyn PendingConnectionStore>,
    selectors: SelectorPolicy,
    ticket_ttl: Duration,
    allocation_timeout: Duration,
}

impl ConnectionService {
    pub fn new(
        roles: RoleCatalog,
        directory: Arc<dyn CharacterDirectory>,
        allocator: Arc<dyn FleetAllocator>,
        store: Arc<dyn PendingConnectionStore>,
        selectors: SelectorPolicy,
    ) -> Self {
        Self {
            roles,
            directory,
            allocator,
            store,
            selectors,
            ticket_ttl: DEFAULT_TICKET_TTL,
            allocation_timeout: DEFAULT_ALLOCATION_TIMEOUT,
        }
    }

    pub fn with_ticket_ttl(mut self, ttl: Duration) -> Self {
        self.ticket_ttl = ttl;
        self
    }

    pub fn with_allocation_timeout(mut self, timeout: Duration) -> Self {
        self.allocation_timeout = timeout;
        self
    }

    pub fn store(&self) -> Arc<dyn PendingConnectionStore> {
        Arc::clone(&self.store)
    }

    pub fn allocator_kind(&self) -> &'static str {
        self.allocator.kind()
    }

    /// Issue a ticket so `caller` can play `target`.
    ///
    /// Requires [`Capability::Play`]; acting on a character the caller does
    /// not own additionally requires [`Capability::ManageOthers`].
    pub async fn connect_game_server(
        &self,
        caller: &Caller,
        target: &CharacterTarget,
    ) -> Result<ConnectionTicket, CoreError> {
        self.roles.require(caller, Capability::Play)?;
        target.validate()?;

        let character = self.resolve(target).await?;

        if !character.is_owned_by(&caller.subject) {
            self.roles.require(caller, Capability::ManageOthers)?;
            tracing::info!(
                subject = %caller.subject,
                owner = %character.owner_id,
                character = %character.name,
                "Connecting on behalf of another account"
            );
        }

        self.issue_ticket(&character.name, Some(&character.location.world))
            .await
    }

    /// Redeem a ticket on behalf of the server named `server_name`.
    ///
    /// The ticket is gone after this call whatever the outcome, including a
    /// server-name mismatch.
    pub async fn verify_connect(
        &self,
        caller: &Caller,
        connection_id: &str,
        server_name: &str,
    ) -> Result<CharacterRecord, CoreError> {
        self.roles.require(caller, Capability::GameServer)?;

        let id: ConnectionId = connection_id.trim().parse().map_err(|_| {
            CoreError::Validation(format!("Malformed connection id '{connection_id}'"))
        })?;
        if server_name.trim().is_empty() {
            return Err(CoreError::Validation(
                "Server name must not be empty".to_string(),
            ));
        }

        let pending = self
            .store
            .consume(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Pending connection", id))?;

        if pending.is_expired(self.ticket_ttl, Utc::now()) {
            tracing::debug!(connection_id = %id, "Rejected expired ticket");
            return Err(CoreError::not_found("Pending connection", id));
        }

        if pending.server_name != server_name {
            tracing::warn!(
                connection_id = %id,
                expected = %pending.server_name,
                presented = %server_name,
                "Ticket redeemed on the wrong server"
            );
            return Err(CoreError::Forbidden(
                "Connection was issued for a different server".to_string(),
            ));
        }

        let record = self
            .resolve(&CharacterTarget::ByName(pending.character))
            .await?;

        tracing::info!(
            connection_id = %id,
            character = %record.name,
            server = %server_name,
            "Ticket redeemed"
        );
        Ok(record)
    }

    /// Move an already-connected character to an instance serving
    /// `target_location`. Only game servers may initiate a transfer.
    pub async fn transfer_player(
        &self,
        caller: &Caller,
        character: &str,
        target_location: &str,
    ) -> Result<ConnectionTicket, CoreError> {
        self.roles.require(caller, Capability::GameServer)?;
        validate_character_name(character)?;
        if target_location.trim().is_empty() {
            return Err(CoreError::Validation(
                "Target location must not be empty".to_string(),
            ));
        }

        let record = self
            .resolve(&CharacterTarget::ByName(character.to_string()))
            .await?;

        tracing::info!(
            character = %record.name,
            from = %record.location.world,
            to = %target_location,
            "Transferring player"
        );
        self.issue_ticket(&record.name, Some(target_location)).await
    }

    async fn resolve(&self, target: &CharacterTarget) -> Result<CharacterRecord, CoreError> {
        self.directory
            .get_character(target)
            .await?
            .ok_or_else(|| CoreError::not_found("Character", target))
    }

    /// Allocate a server, then bind a fresh ticket to it.
    async fn issue_ticket(
        &self,
        character: &str,
        world: Option<&str>,
    ) -> Result<ConnectionTicket, CoreError> {
        let selectors = self.selectors.selectors(world);

        let allocation = tokio::time::timeout(
            self.allocation_timeout,
            self.allocator.allocate(&selectors),
        )
        .await
        .map_err(|_| AllocationError::Timeout(self.allocation_timeout))??;

        let ticket = match self.store.create(character, &allocation.server_name).await {
            Ok(ticket) => ticket,
            Err(err) => {
                let released = self.allocator.release(&allocation).await;
                tracing::error!(
                    error = %err,
                    server = %allocation.server_name,
                    released,
                    "Ticket store write failed after allocation"
                );
                return Err(err.into());
            }
        };

        tracing::info!(
            connection_id = %ticket.id,
            character = %character,
            server = %allocation.server_name,
            address = %allocation.address,
            port = allocation.port,
            "Issued connection ticket"
        );

        Ok(ConnectionTicket {
            address: allocation.address,
            port: allocation.port,
            connection_id: ticket.id,
        })
    }
}
