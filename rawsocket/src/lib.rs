//! # RawSocket
//!
//! **Frame-level RFC 6455 WebSocket engine over an already-upgraded stream**
//!
//! RawSocket takes any byte stream that has completed the HTTP upgrade and
//! turns it into a WebSocket endpoint: chunked send and receive, fragmentation,
//! masking, automatic pong replies and the close handshake.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rawsocket::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     // The upgrade handshake has already happened on this stream.
//!     let stream = tokio::net::TcpStream::connect("127.0.0.1:8080").await?;
//!     let ws = WebSocket::new(stream, WebSocketConfig::client())?;
//!     let cancel = CancellationToken::new();
//!
//!     ws.send(b"hello", MessageKind::Text, true, &cancel).await?;
//!
//!     let mut buf = [0u8; 1024];
//!     let result = ws.receive(&mut buf, &cancel).await?;
//!     println!("{:?}: {:?}", result.kind, &buf[..result.count]);
//!
//!     ws.close(CloseCode::Normal, "bye", &cancel).await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

#[macro_use]
mod logging;

pub mod config;
pub mod connection;
mod receive_buffer;

// Re-export core components
pub use rawsocket_core::*;

pub use config::WebSocketConfig;
pub use connection::WebSocket;
pub use logging::init_logging;
pub use tokio_util::sync::CancellationToken;

/// Prelude module with common imports
pub mod prelude {
    pub use rawsocket_core::prelude::*;

    pub use crate::config::WebSocketConfig;
    pub use crate::connection::WebSocket;
    pub use tokio_util::sync::CancellationToken;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_library_compiles() {
        assert_eq!(env!("CARGO_PKG_NAME"), "rawsocket");
    }
}
