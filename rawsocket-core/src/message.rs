//! Message kinds and receive results
//!
//! The engine moves messages in caller-sized chunks, so there is no owned
//! message type here: a send names the kind of the chunk, a receive reports
//! what it copied.

use crate::error::CloseCode;
use crate::protocol::Opcode;

/// Kind of message a chunk belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// UTF-8 text message
    Text,
    /// Binary message
    Binary,
    /// Close frame received from the peer
    Close,
}

impl MessageKind {
    /// Opcode of the first frame of a message of this kind
    pub fn opcode(self) -> Opcode {
        match self {
            MessageKind::Text => Opcode::Text,
            MessageKind::Binary => Opcode::Binary,
            MessageKind::Close => Opcode::Close,
        }
    }

    /// Kind carried by a non-continuation opcode
    pub fn from_opcode(opcode: Opcode) -> Option<Self> {
        match opcode {
            Opcode::Text => Some(MessageKind::Text),
            Opcode::Binary => Some(MessageKind::Binary),
            Opcode::Close => Some(MessageKind::Close),
            _ => None,
        }
    }
}

/// Outcome of one `receive` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveResult {
    /// Bytes copied into the destination buffer
    pub count: usize,
    /// Kind of the message these bytes belong to
    pub kind: MessageKind,
    /// Whether this chunk ends the message
    pub end_of_message: bool,
    /// Peer's close status, set only for `MessageKind::Close`
    pub close_status: Option<CloseCode>,
    /// Peer's close description, set only for `MessageKind::Close`
    pub close_status_description: Option<String>,
}

impl ReceiveResult {
    /// Result for a chunk of data
    pub fn data(count: usize, kind: MessageKind, end_of_message: bool) -> Self {
        Self {
            count,
            kind,
            end_of_message,
            close_status: None,
            close_status_description: None,
        }
    }

    /// Result for a received close frame
    pub fn close(status: CloseCode, description: String) -> Self {
        Self {
            count: 0,
            kind: MessageKind::Close,
            end_of_message: true,
            close_status: Some(status),
            close_status_description: Some(description),
        }
    }

    /// Check if this result reports a close frame
    pub fn is_close(&self) -> bool {
        self.kind == MessageKind::Close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_opcode_mapping() {
        for kind in [MessageKind::Text, MessageKind::Binary, MessageKind::Close] {
            assert_eq!(MessageKind::from_opcode(kind.opcode()), Some(kind));
        }
        assert_eq!(MessageKind::from_opcode(Opcode::Continuation), None);
        assert_eq!(MessageKind::from_opcode(Opcode::Ping), None);
    }

    #[test]
    fn test_close_result() {
        let result = ReceiveResult::close(CloseCode::Normal, "bye".to_string());
        assert!(result.is_close());
        assert!(result.end_of_message);
        assert_eq!(result.count, 0);
        assert_eq!(result.close_status_description.as_deref(), Some("bye"));

        let result = ReceiveResult::data(3, MessageKind::Text, false);
        assert!(!result.is_close());
        assert_eq!(result.close_status, None);
    }
}
