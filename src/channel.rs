//! Channel contract
//!
//! A channel turns transport events into `Engine::process_message` calls and
//! renders the returned steps back to its transport.

mod console;

pub use console::ConsoleChannel;

use crate::engine::Engine;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Channel {0} is already running")]
    AlreadyStarted(String),
    /// Transport could not deliver a reply; `code` is the transport's own code
    #[error("{message} ({code})")]
    NoResponse { message: String, code: String },
}

impl ChannelError {
    pub fn no_response(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::NoResponse {
            message: message.into(),
            code: code.into(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::NoResponse { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Shuts a started channel down
pub struct StopHandle(Box<dyn FnOnce() + Send>);

impl StopHandle {
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(stop))
    }

    pub fn stop(self) {
        (self.0)();
    }
}

impl From<CancellationToken> for StopHandle {
    fn from(token: CancellationToken) -> Self {
        Self::new(move || token.cancel())
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StopHandle(..)")
    }
}

/// Transport adapter started by the engine
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Begin receiving messages; long-running input loops are spawned here
    ///
    /// The returned handle, if any, is invoked on `Engine::stop`.
    fn start(&self, engine: Arc<Engine>) -> Result<Option<StopHandle>, ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_response_carries_code() {
        let err = ChannelError::no_response("Recipient unreachable", "E_RECIPIENT");
        assert_eq!(err.code(), Some("E_RECIPIENT"));
        assert_eq!(err.to_string(), "Recipient unreachable (E_RECIPIENT)");

        let io = ChannelError::from(std::io::Error::other("closed"));
        assert_eq!(io.code(), None);
    }

    #[test]
    fn test_stop_handle_cancels_token() {
        let token = CancellationToken::new();
        let handle = StopHandle::from(token.clone());
        assert!(!token.is_cancelled());
        handle.stop();
        assert!(token.is_cancelled());
    }
}
