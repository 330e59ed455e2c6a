//! # fitstack_core
//!
//! Core domain logic for FitStack: token lifecycle, abuse throttling,
//! user directory queries, and account-data purge.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod purge;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
