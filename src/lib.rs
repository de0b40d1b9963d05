//! Git LFS server brokering large binaries into a versioned object store
//! under human-readable paths.
//!
//! Library target so integration tests and embedders can build the router
//! against their own stores.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
