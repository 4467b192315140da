//! Prelude module for RawSocket Core
//!
//! This module re-exports commonly used types and traits to make them
//! easily accessible for users of the library.

pub use crate::entropy::{MaskKeySource, RandomMaskKeys, ZeroMaskKey};
pub use crate::error::{CloseCode, Error, Result};
pub use crate::frame::FrameHeader;
pub use crate::message::{MessageKind, ReceiveResult};
pub use crate::protocol::Opcode;
pub use crate::state::WebSocketState;
pub use crate::transport::TransportStream;

// Re-export commonly used external dependencies
pub use bytes::{Bytes, BytesMut};
