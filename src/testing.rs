//! Shared fixtures and fake stores for tests

use crate::engine::{Context, Engine, FlowRegistry, DEFAULT_MAX_RENDER_PASSES};
use crate::model::{Callback, ExpectedResponse, Flow, IncomingMessage, Step};
use crate::session::{InMemorySessionStore, Session, SessionError, SessionStore};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// `main` flow: `welcome` says "Hi" and accepts anything, `done` says "Bye"
pub fn scenario_flow() -> Flow {
    Flow::new("main", "welcome")
        .step(
            Step::new("welcome")
                .text("Hi")
                .response(ExpectedResponse::any_text(Callback::goto("done"))),
        )
        .step(Step::new("done").text("Bye"))
}

pub fn scenario_engine() -> Engine {
    Engine::in_memory(scenario_flow()).unwrap()
}

/// Context for a fresh conversation whose default flow is [`scenario_flow`]
pub async fn test_context(message: IncomingMessage) -> Context {
    let store = InMemorySessionStore::new();
    let session = store.session("test-conv").await.unwrap();
    let flows = FlowRegistry::new(Arc::new(scenario_flow()));
    Context::new(
        "test-conv",
        message,
        Arc::new(flows),
        session,
        DEFAULT_MAX_RENDER_PASSES,
    )
}

/// Store that records every write while delegating to memory
#[derive(Clone, Default)]
pub struct RecordingStore {
    inner: InMemorySessionStore,
    writes: Arc<Mutex<Vec<(String, String, Value)>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemorySessionStore {
        &self.inner
    }

    /// `(conversation, key, value)` for every write, in order
    pub fn writes(&self) -> Vec<(String, String, Value)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn session(&self, conversation_id: &str) -> Result<Arc<dyn Session>, SessionError> {
        let inner = self.inner.session(conversation_id).await?;
        Ok(Arc::new(RecordingSession {
            conversation_id: conversation_id.to_string(),
            inner,
            writes: Arc::clone(&self.writes),
        }))
    }
}

struct RecordingSession {
    conversation_id: String,
    inner: Arc<dyn Session>,
    writes: Arc<Mutex<Vec<(String, String, Value)>>>,
}

#[async_trait]
impl Session for RecordingSession {
    async fn get(&self, key: &str) -> Result<Option<Value>, SessionError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), SessionError> {
        self.writes.lock().unwrap().push((
            self.conversation_id.clone(),
            key.to_string(),
            value.clone(),
        ));
        self.inner.set(key, value).await
    }
}

/// Store whose sessions fail every call after `fail_after` successful ones
pub struct FailingStore {
    inner: InMemorySessionStore,
    calls: Arc<AtomicUsize>,
    fail_after: usize,
}

impl FailingStore {
    pub fn new(fail_after: usize) -> Self {
        Self {
            inner: InMemorySessionStore::new(),
            calls: Arc::new(AtomicUsize::new(0)),
            fail_after,
        }
    }
}

#[async_trait]
impl SessionStore for FailingStore {
    async fn session(&self, conversation_id: &str) -> Result<Arc<dyn Session>, SessionError> {
        let inner = self.inner.session(conversation_id).await?;
        Ok(Arc::new(FailingSession {
            inner,
            calls: Arc::clone(&self.calls),
            fail_after: self.fail_after,
        }))
    }
}

struct FailingSession {
    inner: Arc<dyn Session>,
    calls: Arc<AtomicUsize>,
    fail_after: usize,
}

impl FailingSession {
    fn check(&self) -> Result<(), SessionError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
            return Err(SessionError::Backend("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for FailingSession {
    async fn get(&self, key: &str) -> Result<Option<Value>, SessionError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), SessionError> {
        self.check()?;
        self.inner.set(key, value).await
    }
}
