//! Single-use connection tickets and the store that issues and redeems them.
//!
//! A [`PendingConnection`] binds one character to one allocated server. It
//! is created after a successful allocation and consumed exactly once when
//! the server redeems it. `consume` is a get-and-delete: under any number of
//! concurrent calls for the same id, exactly one returns the ticket.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::types::{ConnectionId, Timestamp};

/// Default ticket lifetime.
pub const DEFAULT_TICKET_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingConnection {
    /// Unguessable token handed to the client (random UUID v4).
    pub id: ConnectionId,
    /// Name of the character the ticket admits.
    pub character: String,
    /// Name of the instance the ticket is valid on.
    pub server_name: String,
    pub created_at: Timestamp,
}

impl PendingConnection {
    /// Build a fresh ticket with a random id and the current time.
    pub fn issue(character: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self {
            id: ConnectionId::new_v4(),
            character: character.into(),
            server_name: server_name.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether the ticket has outlived `ttl` at instant `now`.
    pub fn is_expired(&self, ttl: Duration, now: Timestamp) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => self.created_at + ttl <= now,
            // A TTL too large to represent never expires.
            Err(_) => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Ticket id collision: {0}")]
    Collision(ConnectionId),

    #[error("Ticket store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::Internal(err.to_string())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PendingConnectionStore: Send + Sync {
    /// Generate a fresh ticket for `character` on `server_name` and persist
    /// it. On error no ticket exists.
    async fn create(
        &self,
        character: &str,
        server_name: &str,
    ) -> Result<PendingConnection, StoreError>;

    /// Atomically remove and return the ticket. `Ok(None)` when the id is
    /// unknown or was already consumed.
    async fn consume(&self, id: ConnectionId) -> Result<Option<PendingConnection>, StoreError>;

    /// Delete unconsumed tickets created before `older_than`. Returns how
    /// many were removed.
    async fn reap(&self, older_than: Timestamp) -> Result<u64, StoreError>;
}

/// Ticket store held in process memory.
///
/// A single mutex is the serialization point for every create, consume and
/// reap, which makes `consume` linearizable.
#[derive(Default)]
pub struct InMemoryPendingConnectionStore {
    tickets: Mutex<HashMap<ConnectionId, PendingConnection>>,
}

impl InMemoryPendingConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unconsumed, unreaped) tickets.
    pub async fn len(&self) -> usize {
        self.tickets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tickets.lock().await.is_empty()
    }

    /// Insert a pre-built ticket. Lets tests backdate `created_at`.
    pub async fn insert(&self, ticket: PendingConnection) -> Result<(), StoreError> {
        let mut tickets = self.tickets.lock().await;
        if tickets.contains_key(&ticket.id) {
            return Err(StoreError::Collision(ticket.id));
        }
        tickets.insert(ticket.id, ticket);
        Ok(())
    }
}

#[async_trait]
impl PendingConnectionStore for InMemoryPendingConnectionStore {
    async fn create(
        &self,
        character: &str,
        server_name: &str,
    ) -> Result<PendingConnection, StoreError> {
        let ticket = PendingConnection::issue(character, server_name);
        self.insert(ticket.clone()).await?;
        Ok(ticket)
    }

    async fn consume(&self, id: ConnectionId) -> Result<Option<PendingConnection>, StoreError> {
        Ok(self.tickets.lock().await.remove(&id))
    }

    async fn reap(&self, older_than: Timestamp) -> Result<u64, StoreError> {
        let mut tickets = self.tickets.lock().await;
        let before = tickets.len();
        tickets.retain(|_, t| t.created_at >= older_than);
        Ok((before - tickets.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn consume_returns_created_ticket_exactly_once() {
        let store = InMemoryPendingConnectionStore::new();
        let ticket = store.create("Aria", "server-x").await.unwrap();

        let first = store.consume(ticket.id).await.unwrap();
        assert_eq!(first.as_ref(), Some(&ticket));
        assert_eq!(first.unwrap().character, "Aria");

        let second = store.consume(ticket.id).await.unwrap();
        assert!(second.is_none(), "a ticket must not be redeemable twice");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn consume_unknown_id_is_none() {
        let store = InMemoryPendingConnectionStore::new();
        let result = store.consume(ConnectionId::new_v4()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn created_ids_are_distinct() {
        let store = InMemoryPendingConnectionStore::new();
        let a = store.create("Aria", "server-x").await.unwrap();
        let b = store.create("Aria", "server-x").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn reap_removes_only_old_tickets() {
        let store = InMemoryPendingConnectionStore::new();

        let mut stale = PendingConnection::issue("Old", "server-a");
        stale.created_at = Utc::now() - chrono::Duration::minutes(10);
        store.insert(stale.clone()).await.unwrap();
        let fresh = store.create("New", "server-b").await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::minutes(1);
        assert_eq!(store.reap(cutoff).await.unwrap(), 1);

        assert!(store.consume(stale.id).await.unwrap().is_none());
        assert!(store.consume(fresh.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_collision() {
        let store = InMemoryPendingConnectionStore::new();
        let ticket = PendingConnection::issue("Aria", "server-x");
        store.insert(ticket.clone()).await.unwrap();
        assert!(matches!(
            store.insert(ticket).await,
            Err(StoreError::Collision(_))
        ));
    }

    #[test]
    fn expiry_is_relative_to_creation_time() {
        let mut ticket = PendingConnection::issue("Aria", "server-x");
        let now = Utc::now();
        ticket.created_at = now - chrono::Duration::seconds(30);

        assert!(!ticket.is_expired(Duration::from_secs(60), now));
        assert!(ticket.is_expired(Duration::from_secs(30), now));
        assert!(ticket.is_expired(Duration::from_secs(10), now));
    }

    async fn race_consumers(n: usize) {
        let store = Arc::new(InMemoryPendingConnectionStore::new());
        let ticket = store.create("Aria", "server-x").await.unwrap();

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.consume(ticket.id).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        let winners = results
            .into_iter()
            .map(|r| r.expect("task should not panic").expect("consume should not error"))
            .filter(Option::is_some)
            .count();

        assert_eq!(winners, 1, "exactly one of {n} consumers must win");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consume_has_single_winner() {
        for n in [2, 10, 100] {
            race_consumers(n).await;
        }
    }
}
