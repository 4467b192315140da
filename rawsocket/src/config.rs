//! Connection configuration
//!
//! Everything here is fixed when the connection is constructed.

use rawsocket_core::error::ConfigError;
use rawsocket_core::protocol::constants::{DEFAULT_RECEIVE_BUFFER_SIZE, MIN_RECEIVE_BUFFER_SIZE};
use rawsocket_core::Error;
use std::time::Duration;

/// Per-connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketConfig {
    /// Subprotocol agreed during the upgrade handshake; exposed, never interpreted
    pub subprotocol: Option<String>,
    /// Capacity of the sliding receive buffer in bytes
    pub receive_buffer_size: usize,
    /// Mask outgoing frames (client role)
    pub mask_output: bool,
    /// Expect and remove masking on incoming frames (server role)
    pub unmask_input: bool,
    /// Use a constant zero mask key instead of random keys (testing only)
    pub use_zero_mask: bool,
    /// Interval for unsolicited keep-alive pongs, if any
    pub keep_alive_interval: Option<Duration>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self::client()
    }
}

impl WebSocketConfig {
    /// Client role: mask output, expect unmasked input
    pub fn client() -> Self {
        Self {
            subprotocol: None,
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            mask_output: true,
            unmask_input: false,
            use_zero_mask: false,
            keep_alive_interval: None,
        }
    }

    /// Server role: unmasked output, expect masked input
    pub fn server() -> Self {
        Self {
            mask_output: false,
            unmask_input: true,
            ..Self::client()
        }
    }

    /// Set the negotiated subprotocol
    pub fn subprotocol(mut self, subprotocol: impl Into<String>) -> Self {
        self.subprotocol = Some(subprotocol.into());
        self
    }

    /// Set the receive buffer capacity
    pub fn receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = size;
        self
    }

    /// Force zero mask keys
    pub fn use_zero_mask(mut self, enabled: bool) -> Self {
        self.use_zero_mask = enabled;
        self
    }

    /// Enable periodic keep-alive pongs
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = Some(interval);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> rawsocket_core::Result<()> {
        if self.receive_buffer_size < MIN_RECEIVE_BUFFER_SIZE {
            return Err(Error::Config(ConfigError::Validation(format!(
                "receive_buffer_size must be at least {} bytes, got {}",
                MIN_RECEIVE_BUFFER_SIZE, self.receive_buffer_size
            ))));
        }

        if self.keep_alive_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(Error::Config(ConfigError::Validation(
                "keep_alive_interval must be greater than 0".to_string(),
            )));
        }

        Ok(())
    }
}
