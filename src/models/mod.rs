//! Core data models for the Git LFS server.
//!
//! `Oid` is the content identity, `ObjectRecord` the durable mapping entry,
//! and `batch` holds the wire types of the LFS batch protocol. Records
//! serialize naturally as JSON via `serde` for both the wire and the
//! JSON-file mapping backend.

pub mod batch;
pub mod oid;
pub mod record;
