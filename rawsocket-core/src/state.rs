//! Connection state machine for the close handshake
//!
//! Transition table (anything not listed is rejected):
//!
//! | from            | close sent    | close received | abort     | dispose  |
//! |-----------------|---------------|----------------|-----------|----------|
//! | `Open`          | `CloseSent`   | `CloseReceived`| `Aborted` | `Closed` |
//! | `CloseSent`     | rejected      | `Closed`       | `Aborted` | `Closed` |
//! | `CloseReceived` | `Closed`      | rejected       | `Aborted` | `Closed` |
//! | `Closed`        | rejected      | rejected       | no-op     | no-op    |
//! | `Aborted`       | rejected      | rejected       | no-op     | no-op    |
//!
//! Entering `Closed` or `Aborted` is the single point where the owner releases
//! its transport.

use crate::error::{Error, Result};
use std::fmt;

/// State of one WebSocket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebSocketState {
    /// Both directions are open
    Open,
    /// We sent a close frame and are waiting for the peer's
    CloseSent,
    /// The peer sent a close frame and we have not answered yet
    CloseReceived,
    /// Close handshake finished
    Closed,
    /// Connection was torn down without a handshake
    Aborted,
}

impl WebSocketState {
    /// `Closed` and `Aborted` never change again
    pub fn is_terminal(self) -> bool {
        matches!(self, WebSocketState::Closed | WebSocketState::Aborted)
    }

    /// State after writing our close frame.
    pub fn on_close_sent(self) -> Result<Self> {
        match self {
            WebSocketState::Open => Ok(WebSocketState::CloseSent),
            WebSocketState::CloseReceived => Ok(WebSocketState::Closed),
            state => Err(Error::InvalidState {
                operation: "send a close frame",
                state,
            }),
        }
    }

    /// State after reading the peer's close frame.
    pub fn on_close_received(self) -> Result<Self> {
        match self {
            WebSocketState::Open => Ok(WebSocketState::CloseReceived),
            WebSocketState::CloseSent => Ok(WebSocketState::Closed),
            state => Err(Error::InvalidState {
                operation: "receive a close frame",
                state,
            }),
        }
    }

    /// State after an abort, or `None` when already terminal.
    pub fn on_abort(self) -> Option<Self> {
        (!self.is_terminal()).then_some(WebSocketState::Aborted)
    }

    /// State after disposal, or `None` when already terminal.
    pub fn on_dispose(self) -> Option<Self> {
        (!self.is_terminal()).then_some(WebSocketState::Closed)
    }

    /// Fail with `InvalidState` unless the state is one of `allowed`.
    pub fn ensure_one_of(self, allowed: &[WebSocketState], operation: &'static str) -> Result<()> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self,
            })
        }
    }
}

impl fmt::Display for WebSocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
