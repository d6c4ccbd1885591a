//! Error types for the Joyride DNS service
//!
//! This module defines all error types used throughout the crate.

use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for Joyride operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the Joyride DNS service
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// An event was constructed with missing or invalid fields
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// A subscription filter could not be built
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// The event bus has been shut down
    #[error("Event bus is not active")]
    BusInactive,

    /// The responder socket could not be bound
    #[error("Failed to bind DNS socket on {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Filesystem and network errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// DNS wire protocol errors
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid event error
    pub fn invalid_event(msg: impl Into<String>) -> Self {
        Self::InvalidEvent(msg.into())
    }

    /// Create an invalid filter error
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a bind error for the given address
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }
}
