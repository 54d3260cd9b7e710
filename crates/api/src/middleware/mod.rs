//! Request guards applied as route layers.

pub mod auth;
pub mod rate_limit;
