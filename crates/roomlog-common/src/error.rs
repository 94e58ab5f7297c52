//! Error types for Roomlog
//!
//! Only `CapacityExceeded`, `IllegalArgument` and `ConfigError` ever reach an
//! end caller. The peer-level variants are produced while draining a peer
//! and are absorbed by the aggregator, which turns them into a per-peer
//! outcome.

/// Result alias used across the Roomlog crates
pub type Result<T, E = RoomlogError> = std::result::Result<T, E>;

/// Application-specific error types
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomlogError {
    #[error("message log is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    #[error("peer {peer} unavailable: {reason}")]
    Unavailable { peer: String, reason: String },

    #[error("stream from peer {peer} interrupted: {reason}")]
    StreamInterrupted { peer: String, reason: String },

    #[error("peer discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("caused: {0}")]
    IllegalArgument(String),
}
