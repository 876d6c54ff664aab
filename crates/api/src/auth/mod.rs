//! Authentication primitives.
//!
//! - [`jwt`] -- JWT access-token validation (and generation for tooling/tests).

pub mod jwt;
