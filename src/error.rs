//! # Error Types
//!
//! Error taxonomy for the probe core.
//!
//! Two layers:
//! - [`DecodeError`]: typed, offset-aware failures produced by the pure codec
//!   library. Pure decoders never touch a socket, so these are unit-testable
//!   against byte slices.
//! - [`ProbeError`]: everything a probe can fail with, from input validation
//!   through DNS, connect, TLS, timeout, and protocol violations. Every
//!   variant maps to a [`FailureKind`], which in turn maps to the HTTP status
//!   the gateway reports.
//!
//! The engine never swallows a failure: any non-terminal error ends the
//! session and surfaces through the response envelope.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common cases.
pub mod constants {
    /// Validation errors
    pub const ERR_EMPTY_HOST: &str = "Host must not be empty";
    pub const ERR_HOST_CHARSET: &str = "Host contains characters outside [A-Za-z0-9.-:]";
    pub const ERR_PORT_RANGE: &str = "Port must be in range 1-65535";
    pub const ERR_TIMEOUT_RANGE: &str = "Timeout must be in range 0-600000 ms";

    /// Security guard errors
    pub const ERR_EDGE_RANGE: &str =
        "Destination resolves to reverse-proxy edge infrastructure and cannot be probed";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed by peer";
    pub const ERR_TIMEOUT: &str = "Operation timed out";
    pub const ERR_NO_ADDRESSES: &str = "Hostname resolved to no addresses";

    /// Protocol errors
    pub const ERR_UNEXPECTED_FRAME: &str = "Unexpected frame for current handshake phase";
    pub const ERR_UNEXPECTED_STATE: &str = "Handshake reached an unexpected state";
    pub const ERR_UPGRADE_WITHOUT_STARTTLS: &str =
        "Adapter requested TLS upgrade but request was not starttls mode";

    /// Auth errors
    pub const ERR_CREDENTIALS_REJECTED: &str = "Credentials rejected by peer";
    pub const ERR_CREDENTIALS_MISSING: &str = "Protocol step requires credentials";
}

/// Typed failure from the pure codec library.
///
/// Decoders report the byte offset of the violation where feasible so a
/// misbehaving peer can be diagnosed from the envelope alone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ended before the declared frame length was satisfied.
    #[error("Truncated frame: needed {needed} bytes, had {available}")]
    Truncated { needed: usize, available: usize },

    /// The declared length exceeds the protocol ceiling.
    #[error("Frame too large: declared {declared} bytes, limit {limit}")]
    FrameTooLarge { declared: usize, limit: usize },

    /// The bytes violate the wire format.
    #[error("Malformed frame at offset {offset}: {detail}")]
    Malformed { offset: usize, detail: &'static str },
}

/// Coarse failure classification driving the HTTP status of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Bad input; no network I/O was attempted.
    Validation,
    /// Destination blocked by the security guard.
    SecurityBlock,
    /// Hostname resolution failed.
    Dns,
    /// TCP connect failed (refused, unreachable).
    Connect,
    /// The per-session deadline expired.
    Timeout,
    /// The peer violated the expected frame or handshake contract.
    Protocol,
    /// Credentials rejected.
    Auth,
    /// TLS negotiation failed.
    Tls,
}

impl FailureKind {
    /// HTTP status the gateway reports for this failure class.
    pub fn http_status(self) -> u16 {
        match self {
            FailureKind::Validation => 400,
            FailureKind::SecurityBlock => 403,
            FailureKind::Dns => 502,
            FailureKind::Connect
            | FailureKind::Timeout
            | FailureKind::Protocol
            | FailureKind::Auth
            | FailureKind::Tls => 500,
        }
    }
}

/// Primary error type for all probe operations.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{reason}")]
    SecurityBlock { reason: String, is_cloudflare: bool },

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Protocol error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProbeError {
    /// Classify this error for envelope/status mapping.
    pub fn kind(&self) -> FailureKind {
        match self {
            ProbeError::Validation(_) => FailureKind::Validation,
            ProbeError::SecurityBlock { .. } => FailureKind::SecurityBlock,
            ProbeError::Dns(_) => FailureKind::Dns,
            ProbeError::Connect(_) | ProbeError::Io(_) => FailureKind::Connect,
            ProbeError::Timeout => FailureKind::Timeout,
            ProbeError::Tls(_) => FailureKind::Tls,
            ProbeError::Decode(_) | ProbeError::Protocol(_) | ProbeError::ConnectionClosed => {
                FailureKind::Protocol
            }
            ProbeError::Auth(_) => FailureKind::Auth,
            ProbeError::Config(_) => FailureKind::Validation,
        }
    }

    /// Build the protocol-violation error the engine emits for an
    /// out-of-contract frame.
    pub fn unexpected_frame() -> Self {
        ProbeError::Protocol(constants::ERR_UNEXPECTED_FRAME.into())
    }
}

/// Type alias for Results using ProbeError
pub type Result<T> = std::result::Result<T, ProbeError>;
