//! # Error Types
//!
//! Custom error types for Fieldlink using `thiserror`.
//!
//! Everything here propagates to the caller. The one failure the crate
//! recovers from locally, an unparseable inbound frame, is not an error at
//! all: it is [`crate::serial::frame::Inbound::Malformed`].

use thiserror::Error;

/// Main error type for Fieldlink
#[derive(Debug, Error)]
pub enum FieldlinkError {
    /// No explicit device path and no enumerated device matched the filter
    #[error("No radio port: no explicit path given and no serial device matched the descriptor filter")]
    EmptyPort,

    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    /// Serial device enumeration failed
    #[error("Failed to enumerate serial ports: {0}")]
    Enumeration(String),

    /// Opening the serial device failed (busy, permissions, missing node)
    #[error("Failed to open {path}: {reason}")]
    LinkOpen { path: String, reason: String },

    /// Writing a frame failed
    #[error("Serial write error: {0}")]
    Write(String),

    /// The port accepted fewer bytes than the frame holds
    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// Outbound payload cannot be carried as a single-line frame
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Inbound bytes are not valid UTF-8
    #[error("Frame is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// Payload could not be rendered as JSON
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A sensor or GPS source failed to produce a reading
    #[error("Source error: {0}")]
    Source(String),

    /// The downstream collector rejected or failed a forward
    #[error("Sink error: {0}")]
    Sink(String),

    /// The poller's wait step gave up
    #[error("Wait exhausted: {0}")]
    WaitExhausted(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Fieldlink
pub type Result<T> = std::result::Result<T, FieldlinkError>;
