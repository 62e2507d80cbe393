//! Session store contract
//!
//! The engine keeps nothing between messages: a conversation's position lives
//! in two reserved keys of its session. Step callbacks may store anything else
//! under their own keys.

mod memory;

pub use memory::InMemorySessionStore;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Session key holding the current flow id
pub const FLOW_KEY: &str = "__flow_id";

/// Session key holding the current step id
pub const STEP_KEY: &str = "__step_id";

/// Keys owned by the engine
pub const RESERVED_KEYS: [&str; 2] = [FLOW_KEY, STEP_KEY];

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session backend error: {0}")]
    Backend(String),
    #[error("Session storage lock poisoned")]
    Poisoned,
}

/// Key/value accessor for one conversation
#[async_trait]
pub trait Session: Send + Sync {
    /// Read a value; `None` when the key was never set or was cleared
    async fn get(&self, key: &str) -> Result<Option<Value>, SessionError>;

    /// Write a value; writing `Value::Null` clears the key
    async fn set(&self, key: &str, value: Value) -> Result<(), SessionError>;
}

/// Hands out the session of a conversation, creating it when absent
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn session(&self, conversation_id: &str) -> Result<Arc<dyn Session>, SessionError>;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn session(&self, conversation_id: &str) -> Result<Arc<dyn Session>, SessionError> {
        (**self).session(conversation_id).await
    }
}

/// Read one of the engine's id pointers
///
/// Anything other than a string counts as unset.
pub(crate) async fn read_pointer(
    session: &dyn Session,
    key: &str,
) -> Result<Option<String>, SessionError> {
    match session.get(key).await? {
        Some(Value::String(id)) => Ok(Some(id)),
        Some(Value::Null) | None => Ok(None),
        Some(other) => {
            tracing::warn!(key, value = %other, "Ignoring non-string session pointer");
            Ok(None)
        }
    }
}

pub(crate) fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}
