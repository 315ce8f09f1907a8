//! Error types for the Beacon session client
//!
//! Configuration problems are raised to the caller before any transport is
//! opened. Transport and protocol failures are absorbed by the state machine
//! and surfaced as `error` events carrying a [`SessionError`], which is why
//! every error type here is `Clone`.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Invalid or incomplete session configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid address {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Unsupported scheme {scheme}: expected ws or wss")]
    UnsupportedScheme { scheme: String },
    #[error("Address {url} has no path")]
    MissingPath { url: String },
    #[error("No credential configured")]
    MissingCredential,
    #[error("No session exists and no options were supplied")]
    MissingOptions,
    #[error("Invalid option {field}: {reason}")]
    Validation { field: String, reason: String },
}

/// Failures of the underlying transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },
    #[error("Send failed: {reason}")]
    SendFailed { reason: String },
    #[error("Transport closed")]
    Closed,
    #[error("No async runtime available to drive the transport")]
    NoRuntime,
    #[error("Transport I/O error: {reason}")]
    Io { reason: String },
}

/// Envelope encoding and decoding failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed envelope: {reason}")]
    Malformed { reason: String },
    #[error("Envelope has no type field")]
    MissingType,
    #[error("Failed to encode envelope: {reason}")]
    Encode { reason: String },
}

// ----------------------------------------------------------------------------
// Session Error
// ----------------------------------------------------------------------------

/// Umbrella error reported through the session API and `error` events
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Reconnect attempts exhausted after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Not connected")]
    NotConnected,

    #[error("Session task unavailable: {0}")]
    Channel(String),
}

impl SessionError {
    pub fn transport_io(reason: impl Into<String>) -> Self {
        Self::Transport(TransportError::Io {
            reason: reason.into(),
        })
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::Malformed {
            reason: reason.into(),
        })
    }

    pub fn channel(reason: impl Into<String>) -> Self {
        Self::Channel(reason.into())
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration(ConfigError::Validation {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Whether this error stems from configuration and will not heal by retrying
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
