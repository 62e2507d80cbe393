//! flowbot - conversational flow engine
//!
//! Walks developer-defined flows of steps for each incoming chat message,
//! keeping every conversation's position in a pluggable session store.

pub mod channel;
pub mod config;
pub mod engine;
pub mod matcher;
pub mod model;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{Channel, ChannelError, ConsoleChannel, StopHandle};
pub use config::{ConsoleConfig, EngineConfig};
pub use engine::{Context, Engine, EngineError, EngineResult};
pub use matcher::{default_response_matcher, ResponseMatcher, WILDCARD};
pub use model::{
    Callback, CallbackResult, ExpectedResponse, Flow, IncomingMessage, IncomingMessageType,
    OutgoingMessage, OutgoingMessageType, Step, StepOverlay,
};
pub use session::{InMemorySessionStore, Session, SessionError, SessionStore};
