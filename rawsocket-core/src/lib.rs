//! # RawSocket Core
//!
//! Wire-level building blocks for the RawSocket WebSocket engine:
//!
//! - Error handling and types
//! - RFC 6455 frame header encoding and decoding
//! - Payload masking and mask key sources
//! - Protocol constants, opcodes and close codes
//! - The connection state table
//! - Transport layer abstractions

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

// Core modules
pub mod entropy;
pub mod error;
pub mod frame;
pub mod mask;
pub mod message;
pub mod protocol;
pub mod state;
pub mod transport;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use entropy::{MaskKeySource, RandomMaskKeys, ZeroMaskKey};
pub use error::{CloseCode, Error, Result};
pub use frame::FrameHeader;
pub use message::{MessageKind, ReceiveResult};
pub use protocol::Opcode;
pub use state::WebSocketState;
pub use transport::{TransportRead, TransportStream, TransportWrite};
