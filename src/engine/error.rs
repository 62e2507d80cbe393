//! Engine error types

use crate::channel::ChannelError;
use crate::session::SessionError;
use thiserror::Error;

/// Errors raised by the engine and by navigation
///
/// A message that matches no expected response is not an error: the engine
/// answers it with the "didn't understand" message instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown step {step} in {flow}")]
    UnknownStep { step: String, flow: String },
    #[error("Flow {0} not found")]
    UnknownFlow(String),
    #[error("Flow {0} is already registered")]
    DuplicateFlow(String),
    #[error("Step {step} is declared more than once in flow {flow}")]
    DuplicateStep { step: String, flow: String },
    #[error("Step {step} still had a render callback after {passes} passes")]
    RenderLimit { step: String, passes: usize },
    #[error("Session key {0} is reserved for the engine")]
    ReservedKey(String),
    #[error("Session value {key} could not be converted: {source}")]
    SessionValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Channel {channel} failed to start: {source}")]
    ChannelStart {
        channel: String,
        #[source]
        source: ChannelError,
    },
    /// Application failure raised from a step or response callback
    #[error("Callback failed: {0}")]
    Callback(String),
}

impl EngineError {
    pub fn callback(message: impl std::fmt::Display) -> Self {
        Self::Callback(message.to_string())
    }

    /// Navigation errors come from programmer-driven `goto`/`start` calls
    pub fn is_navigation(&self) -> bool {
        matches!(self, Self::UnknownStep { .. } | Self::UnknownFlow(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
