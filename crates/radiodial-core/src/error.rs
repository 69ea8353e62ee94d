//! Error types for radiodial-core.

use thiserror::Error;

/// Error type for radiodial-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid station '{id}': {reason}")]
    InvalidStation { id: String, reason: String },

    #[error("Duplicate station id: {0}")]
    DuplicateStation(String),

    #[error("Unknown station id: {0}")]
    UnknownStation(String),

    #[error("Backend: {0}")]
    Backend(String),

    #[error("Receiver is inert after a failed initialization")]
    Inert,

    #[error("Catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a node refused to start playing.
///
/// Absorbed by the mix engine; only visible through the ready/playing flags.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("source not loaded yet")]
    NotReady,

    #[error("playback rejected: {0}")]
    Rejected(String),

    #[error("decode failed: {0}")]
    Decode(String),
}
