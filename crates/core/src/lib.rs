//! Domain core for the handoff connection broker.
//!
//! Everything the broker needs to issue and redeem single-use connection
//! tickets lives here; transport and concrete collaborators live in the
//! `handoff-api`, `handoff-db` and `handoff-upstream` crates.

pub mod character;
pub mod connection;
pub mod error;
pub mod fleet;
pub mod identity;
pub mod pending;
pub mod roles;
pub mod types;
