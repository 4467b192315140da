//! Error types for RawSocket
//!
//! This module defines all error types used throughout the RawSocket crates.
//! Nothing in the engine recovers silently: every variant below reaches the
//! caller of the operation that detected it.

#![allow(missing_docs)]

use crate::protocol::Opcode;
use crate::state::WebSocketState;
use std::fmt;
use thiserror::Error;

/// Result type alias for RawSocket operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for RawSocket operations
#[derive(Error, Debug)]
pub enum Error {
    /// Peer violated the framing rules
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Malformed or oversized frame header
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// I/O errors from the underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Close errors
    #[error("Close error: {0}")]
    Close(#[from] CloseError),

    /// The transport reported end of stream while more bytes were required
    #[error("Unexpected end of stream: needed {needed} bytes, have {have}")]
    UnexpectedEof { needed: usize, have: usize },

    /// The caller's cancellation token fired while the operation was waiting
    #[error("Operation cancelled")]
    Cancelled,

    /// The operation is not permitted in the connection's current state
    #[error("Cannot {operation} while the connection is {state}")]
    InvalidState {
        operation: &'static str,
        state: WebSocketState,
    },

    /// A caller-supplied argument was rejected
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Another receive is already reading from this connection
    #[error("A receive operation is already in progress")]
    ConcurrentReceive,

    /// The transport has already been released
    #[error("Transport has been disposed")]
    Disposed,
}

impl Error {
    /// Check if this error came from the cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check if this error is a peer protocol violation
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

/// WebSocket protocol violations observed on received frames
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame mask bit disagrees with the connection's role
    #[error("Frame masking mismatch: expected masked={expected_masked}")]
    MaskingMismatch { expected_masked: bool },

    /// Continuation frame with no fragmented message open
    #[error("Continuation frame received without a fragmented message in progress")]
    UnexpectedContinuation,

    /// Control frame with the FIN bit cleared
    #[error("Control frames cannot be fragmented ({0})")]
    FragmentedControlFrame(Opcode),

    /// Control frame payload above 125 bytes
    #[error("Control frame {opcode} too large: {len} bytes")]
    ControlFrameTooLarge { opcode: Opcode, len: u64 },
}

/// Frame header parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Insufficient data to parse the header
    #[error("Insufficient data: need {needed} bytes, have {have}")]
    InsufficientData { needed: usize, have: usize },

    /// Invalid opcode
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// 64-bit payload length with the most significant bit set
    #[error("Invalid payload length: {0}")]
    InvalidPayloadLength(u64),

    /// A read requires more bytes than the receive buffer can ever hold
    #[error("Frame needs {needed} buffered bytes but receive buffer holds {capacity}")]
    ExceedsReceiveBuffer { needed: usize, capacity: usize },
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Close errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloseError {
    /// Close reason too long
    #[error("Close reason too long: {len} bytes (max: {max})")]
    ReasonTooLong { len: usize, max: usize },
}

/// WebSocket close codes as defined in RFC 6455 Section 7.4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// Normal closure
    Normal,
    /// Going away
    Away,
    /// Protocol error
    ProtocolError,
    /// Unsupported data
    Unsupported,
    /// No status received
    NoStatus,
    /// Abnormal closure
    Abnormal,
    /// Invalid frame payload data
    InvalidPayload,
    /// Policy violation
    PolicyViolation,
    /// Message too big
    TooBig,
    /// Mandatory extension
    MandatoryExtension,
    /// Internal server error
    Internal,
    /// TLS handshake failure
    TlsHandshake,
    /// Any other numeric code, preserved as received
    Other(u16),
}

impl CloseCode {
    /// Get the numeric value of the close code
    pub fn code(self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::TooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::Internal => 1011,
            CloseCode::TlsHandshake => 1015,
            CloseCode::Other(code) => code,
        }
    }

    /// Check if this close code indicates an error
    pub fn is_error(self) -> bool {
        !matches!(self, CloseCode::Normal | CloseCode::Away)
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::Unsupported,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::TooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::Internal,
            1015 => CloseCode::TlsHandshake,
            other => CloseCode::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.code()
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}
