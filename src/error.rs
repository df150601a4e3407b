//! FileHive Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for FileHive operations
pub type Result<T> = std::result::Result<T, Error>;

/// FileHive error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Replication and probe errors
    #[error("Transport error contacting {peer}: {reason}")]
    Transport { peer: String, reason: String },

    #[error("Failed to read local file {path}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    // Leadership errors
    #[error("Not leader: current leader is {0}")]
    NotLeader(String),

    #[error("No leader elected yet")]
    NoLeader,

    // Storage errors
    #[error("Quota exceeded: {used} bytes used + {incoming} incoming over {limit} byte limit")]
    QuotaExceeded { used: u64, incoming: u64, limit: u64 },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error came from contacting a peer
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. } | Error::Network(_))
    }
}
