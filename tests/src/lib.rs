//! Shared helpers for the HTTP and store integration tests.

pub mod containers;
pub mod setup;
