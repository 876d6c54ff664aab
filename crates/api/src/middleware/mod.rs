//! Request extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated caller from a JWT Bearer token.
//!
//! Capability checks happen inside the connection service, against the
//! role catalog it was built with.

pub mod auth;
