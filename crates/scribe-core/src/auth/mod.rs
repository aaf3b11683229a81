//! Authentication and authorization.
//!
//! - [`token`] signs and verifies access tokens.
//! - [`password`] hashes and verifies passwords with argon2.
//! - [`access`] runs the per-request access control chain.

pub mod access;
pub mod password;
pub mod token;
