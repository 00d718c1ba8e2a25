//! Shared library surface for the routing server and its tests.

pub mod api;
pub mod backoff;
pub mod config;
pub mod loader;
pub mod loops;
pub mod persistence;
pub mod refresh;
pub mod state;
