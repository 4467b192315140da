//! WebSocket protocol constants and opcodes
//!
//! This module contains the wire-level definitions from RFC 6455 that the
//! frame codec and the connection engine share.

use std::fmt;

/// WebSocket opcodes as defined in RFC 6455 Section 5.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Continuation frame
    Continuation = 0x0,
    /// Text frame
    Text = 0x1,
    /// Binary frame
    Binary = 0x2,
    /// Close frame
    Close = 0x8,
    /// Ping frame
    Ping = 0x9,
    /// Pong frame
    Pong = 0xA,
}

impl Opcode {
    /// Decode the low nibble of the first header byte.
    ///
    /// Returns `None` for the reserved opcodes 0x3-0x7 and 0xB-0xF.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Get the numeric value of the opcode
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Check if this is a control opcode
    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }

    /// Check if this is a data opcode
    pub fn is_data(self) -> bool {
        matches!(self, Opcode::Text | Opcode::Binary | Opcode::Continuation)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::Continuation => "continuation",
            Opcode::Text => "text",
            Opcode::Binary => "binary",
            Opcode::Close => "close",
            Opcode::Ping => "ping",
            Opcode::Pong => "pong",
        };
        f.write_str(name)
    }
}

/// WebSocket protocol constants
pub mod constants {
    /// Smallest possible frame header: two fixed bytes
    pub const MIN_HEADER_SIZE: usize = 2;

    /// Largest possible frame header: 2 fixed + 8 extended length + 4 mask key
    pub const MAX_HEADER_SIZE: usize = 14;

    /// Largest payload a control frame may carry
    pub const MAX_CONTROL_PAYLOAD_LEN: usize = 125;

    /// Size of the status code prefix in a close payload
    pub const CLOSE_STATUS_LEN: usize = 2;

    /// Largest close description that still fits a control frame
    pub const MAX_CLOSE_REASON_SIZE: usize = MAX_CONTROL_PAYLOAD_LEN - CLOSE_STATUS_LEN;

    /// Largest payload length representable on the wire (2^63 - 1)
    pub const MAX_PAYLOAD_LEN: u64 = i64::MAX as u64;

    /// Default capacity of the sliding receive buffer
    pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 16 * 1024;

    /// Smallest receive buffer that can hold any header and any control payload
    pub const MIN_RECEIVE_BUFFER_SIZE: usize = MAX_CONTROL_PAYLOAD_LEN;
}

/// Frame header bit positions and masks
pub mod frame {
    /// FIN bit position
    pub const FIN_BIT: u8 = 0x80;

    /// Opcode mask
    pub const OPCODE_MASK: u8 = 0x0F;

    /// MASK bit position
    pub const MASK_BIT: u8 = 0x80;

    /// Payload length mask for 7-bit length
    pub const PAYLOAD_LEN_MASK: u8 = 0x7F;

    /// Extended payload length (16-bit) marker
    pub const PAYLOAD_LEN_16: u8 = 126;

    /// Extended payload length (64-bit) marker
    pub const PAYLOAD_LEN_64: u8 = 127;

    /// Masking key length
    pub const MASKING_KEY_LEN: usize = 4;
}
