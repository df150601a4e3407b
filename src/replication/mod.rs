//! Replication Module
//!
//! Best-effort cross-node file replication: fire-and-forget multipart
//! uploads to every peer, deduplicated by filename.

pub mod dispatcher;

pub use dispatcher::ReplicationDispatcher;
