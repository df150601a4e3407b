//! FileHive - Minimal Multi-Node File Storage Cluster
//!
//! A small cluster of identical storage nodes that coordinate through
//! three mechanisms: a simulated leader-rotation signal, a peer-liveness
//! heartbeat, and asynchronous cross-node file replication.
//!
//! # Architecture
//!
//! Every node runs the same binary. A periodic election cycle designates
//! one member as leader by unweighted random choice (a placeholder for
//! real consensus, kept behind a consensus-shaped interface). Uploads are
//! admitted only on the leader, persisted locally, then fanned out to all
//! peers as fire-and-forget multipart transfers, deduplicated by filename
//! for the process lifetime. A heartbeat loop probes every peer's health
//! endpoint and records a binary liveness status.
//!
//! # Features
//!
//! - HTTP API for upload, download, listing, and deletion
//! - Simulated leader rotation behind a swappable election trait
//! - Per-peer liveness monitoring with bounded probe timeouts
//! - Best-effort replication fan-out with per-transfer timeouts
//! - Flat local file store with byte-quota accounting

pub mod api;
pub mod cluster;
pub mod config;
pub mod error;
pub mod replication;
pub mod storage;

pub use config::FileHiveConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cluster::{ElectionService, HeartbeatMonitor, LeaderElection};
    pub use crate::config::FileHiveConfig;
    pub use crate::error::{Error, Result};
    pub use crate::replication::ReplicationDispatcher;
    pub use crate::storage::LocalStore;
}
