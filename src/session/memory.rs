//! In-memory session store

use super::{Session, SessionError, SessionStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Process-local session storage, lost on restart
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<String, Arc<MemorySession>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything stored for a conversation
    pub fn snapshot(&self, conversation_id: &str) -> Result<HashMap<String, Value>, SessionError> {
        let sessions = self.sessions.lock().map_err(|_| SessionError::Poisoned)?;
        match sessions.get(conversation_id) {
            Some(session) => session.snapshot(),
            None => Ok(HashMap::new()),
        }
    }

    pub fn conversation_count(&self) -> usize {
        self.sessions.lock().map_or(0, |sessions| sessions.len())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn session(&self, conversation_id: &str) -> Result<Arc<dyn Session>, SessionError> {
        let mut sessions = self.sessions.lock().map_err(|_| SessionError::Poisoned)?;
        let session = sessions
            .entry(conversation_id.to_string())
            .or_default()
            .clone();
        Ok(session)
    }
}

#[derive(Default)]
struct MemorySession {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySession {
    fn snapshot(&self) -> Result<HashMap<String, Value>, SessionError> {
        Ok(self
            .values
            .lock()
            .map_err(|_| SessionError::Poisoned)?
            .clone())
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn get(&self, key: &str) -> Result<Option<Value>, SessionError> {
        let values = self.values.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), SessionError> {
        let mut values = self.values.lock().map_err(|_| SessionError::Poisoned)?;
        if value.is_null() {
            values.remove(key);
        } else {
            values.insert(key.to_string(), value);
        }
        Ok(())
    }
}
