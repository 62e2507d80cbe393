//! Conversation engine
//!
//! Walks the flow/step graph for each incoming message. Session state is the
//! only thing that survives between messages, so any number of conversations
//! can share one engine.

mod context;
mod error;
mod render;

#[cfg(test)]
mod proptests;

pub use context::Context;
pub use error::{EngineError, EngineResult};
pub use render::DEFAULT_MAX_RENDER_PASSES;

use crate::channel::{Channel, StopHandle};
use crate::config::EngineConfig;
use crate::matcher::ResponseMatcher;
use crate::model::{Flow, IncomingMessage, OutgoingMessage, Step};
use crate::session::{self, InMemorySessionStore, SessionStore, FLOW_KEY, STEP_KEY};
use render::render_step;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;

/// The default flow plus every explicitly registered flow
#[derive(Debug, Clone)]
pub(crate) struct FlowRegistry {
    default_flow: Arc<Flow>,
    flows: Vec<Arc<Flow>>,
}

impl FlowRegistry {
    pub(crate) fn new(default_flow: Arc<Flow>) -> Self {
        Self {
            default_flow,
            flows: Vec::new(),
        }
    }

    /// Default flow first, then registered flows
    pub(crate) fn find(&self, flow_id: &str) -> Option<&Arc<Flow>> {
        if self.default_flow.id == flow_id {
            return Some(&self.default_flow);
        }
        self.flows.iter().find(|flow| flow.id == flow_id)
    }

    fn push(&mut self, flow: Flow) -> EngineResult<()> {
        if self.find(&flow.id).is_some() {
            return Err(EngineError::DuplicateFlow(flow.id));
        }
        self.flows.push(Arc::new(flow));
        Ok(())
    }
}

/// Flow engine: resolves steps, matches responses and navigates
///
/// Flows and channels are registered during setup, before [`Engine::start`].
pub struct Engine {
    config: EngineConfig,
    session_store: Arc<dyn SessionStore>,
    flows: Arc<FlowRegistry>,
    response_matcher: ResponseMatcher,
    channels: Vec<Arc<dyn Channel>>,
    stop_handles: Mutex<Vec<StopHandle>>,
    /// One lock per conversation with a message in flight
    conversation_locks: ConversationLocks,
}

type ConversationLocks = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Claim on a conversation's lock; forgets the lock on drop once no other
/// caller holds it, including when the processing future is cancelled
struct ConversationLease<'a> {
    locks: &'a ConversationLocks,
    conversation_id: &'a str,
    lock: Arc<AsyncMutex<()>>,
}

impl<'a> ConversationLease<'a> {
    fn acquire(locks: &'a ConversationLocks, conversation_id: &'a str) -> Self {
        let lock = Arc::clone(
            locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(conversation_id.to_string())
                .or_default(),
        );
        Self {
            locks,
            conversation_id,
            lock,
        }
    }
}

impl Drop for ConversationLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map's reference plus ours
        if locks
            .get(self.conversation_id)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2)
        {
            locks.remove(self.conversation_id);
        }
    }
}

impl Engine {
    pub fn new(session_store: impl SessionStore + 'static, default_flow: Flow) -> EngineResult<Self> {
        Self::with_config(session_store, default_flow, EngineConfig::default())
    }

    /// Engine backed by an [`InMemorySessionStore`]
    pub fn in_memory(default_flow: Flow) -> EngineResult<Self> {
        Self::new(InMemorySessionStore::new(), default_flow)
    }

    pub fn with_config(
        session_store: impl SessionStore + 'static,
        default_flow: Flow,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        default_flow.validate()?;
        Ok(Self {
            config,
            session_store: Arc::new(session_store),
            flows: Arc::new(FlowRegistry::new(Arc::new(default_flow))),
            response_matcher: ResponseMatcher::default(),
            channels: Vec::new(),
            stop_handles: Mutex::new(Vec::new()),
            conversation_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Flow entered on a conversation's first message and after `end_flow`
    pub fn default_flow(&self) -> &Arc<Flow> {
        &self.flows.default_flow
    }

    /// Replace the engine-wide matcher; steps with their own matcher keep it
    pub fn set_response_matcher(&mut self, matcher: ResponseMatcher) {
        self.response_matcher = matcher;
    }

    /// Add a flow that navigation can reach by id
    ///
    /// Ids must be unique across the default flow and registered flows.
    pub fn register_flow(&mut self, flow: Flow) -> EngineResult<()> {
        flow.validate()?;
        tracing::debug!(flow = %flow.id, steps = flow.steps.len(), "Registering flow");
        Arc::make_mut(&mut self.flows).push(flow)
    }

    pub fn find_flow_by_id(&self, flow_id: &str) -> Option<&Arc<Flow>> {
        self.flows.find(flow_id)
    }

    pub fn register(&mut self, channel: impl Channel + 'static) {
        tracing::debug!(channel = channel.name(), "Registering channel");
        self.channels.push(Arc::new(channel));
    }

    /// Start every registered channel, keeping the stop handles they return
    pub fn start(self: &Arc<Self>) -> EngineResult<()> {
        for channel in &self.channels {
            let handle = channel
                .start(Arc::clone(self))
                .map_err(|source| EngineError::ChannelStart {
                    channel: channel.name().to_string(),
                    source,
                })?;
            tracing::info!(channel = channel.name(), "Channel started");

            if let Some(handle) = handle {
                self.stop_handles
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(handle);
            }
        }
        Ok(())
    }

    /// Invoke every collected stop handle
    pub fn stop(&self) {
        let handles = std::mem::take(
            &mut *self
                .stop_handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        tracing::info!(count = handles.len(), "Stopping channels");
        for handle in handles {
            handle.stop();
        }
    }

    /// Handle one incoming message for a conversation
    ///
    /// Returns the step the channel should render, or `None` when a response
    /// callback ended the flow without producing a step. Messages for the same
    /// conversation are processed one at a time.
    pub async fn process_message(
        &self,
        conversation_id: &str,
        message: IncomingMessage,
    ) -> EngineResult<Option<Step>> {
        let lease = ConversationLease::acquire(&self.conversation_locks, conversation_id);
        let result = {
            let _guard = lease.lock.lock().await;
            self.process_locked(conversation_id, message).await
        };
        drop(lease);

        if let Err(e) = &result {
            tracing::warn!(conv_id = %conversation_id, error = %e, "Message processing failed");
        }
        result
    }

    async fn process_locked(
        &self,
        conversation_id: &str,
        message: IncomingMessage,
    ) -> EngineResult<Option<Step>> {
        let session = self.session_store.session(conversation_id).await?;

        let flow_id = session::read_pointer(session.as_ref(), FLOW_KEY).await?;
        let flow = flow_id
            .as_deref()
            .and_then(|id| self.flows.find(id))
            .cloned();
        let step_id = match session::read_pointer(session.as_ref(), STEP_KEY).await? {
            Some(step_id) => Some(step_id),
            None => flow.as_ref().map(|f| f.default_step.clone()),
        };
        let step = match (&flow, &step_id) {
            (Some(flow), Some(step_id)) => flow.find_step(step_id).cloned(),
            _ => None,
        };

        if flow_id.is_some() && flow.is_none() {
            tracing::info!(conv_id = %conversation_id, flow = ?flow_id, "Recorded flow no longer exists");
        }

        let mut ctx = Context::new(
            conversation_id,
            message,
            Arc::clone(&self.flows),
            session,
            self.config.max_render_passes,
        );
        ctx.flow = flow;
        ctx.step_id = step_id;
        ctx.current_step = step;

        if let Some(step) = ctx.current_step.clone() {
            let rendered = render_step(step, &mut ctx).await?;
            ctx.current_step = Some(rendered);
        }

        let Some(flow) = ctx.flow.clone() else {
            tracing::info!(conv_id = %conversation_id, flow = %self.flows.default_flow.id, "Starting default flow");
            let default_flow = Arc::clone(&self.flows.default_flow);
            return ctx.start_flow(&default_flow, None).await.map(Some);
        };

        let Some(step) = ctx.current_step.clone() else {
            return ctx.goto_step(&flow.default_step).await.map(Some);
        };

        self.respond(&mut ctx, step).await
    }

    /// Match the message against the current step and run the response callback
    async fn respond(&self, ctx: &mut Context, step: Step) -> EngineResult<Option<Step>> {
        let matcher = step
            .response_matcher
            .as_ref()
            .unwrap_or(&self.response_matcher);
        let callback = matcher
            .matches(&ctx.message, &step, ctx)
            .map(|response| response.callback.clone());

        let Some(callback) = callback else {
            tracing::debug!(conv_id = %ctx.conversation_id, step = %step.id, "No response matched");
            let mut step = step;
            step.messages
                .insert(0, OutgoingMessage::text(&self.config.not_understood_text));
            return Ok(Some(step));
        };

        match callback.call(ctx).await? {
            Some(overlay) => {
                let mut next = step;
                next.apply(overlay);
                render_step(next, ctx).await.map(Some)
            }
            None if ctx.flow.is_none() => Ok(None),
            None => Ok(Some(step)),
        }
    }

    /// Navigate from inside a callback; see [`Context::goto_step`]
    pub async fn goto_step(&self, ctx: &mut Context, step_id: &str) -> EngineResult<Step> {
        ctx.goto_step(step_id).await
    }

    pub async fn start_flow(
        &self,
        ctx: &mut Context,
        flow: &Flow,
        step_id: Option<&str>,
    ) -> EngineResult<Step> {
        ctx.start_flow(flow, step_id).await
    }

    pub async fn start_flow_by_name(
        &self,
        ctx: &mut Context,
        flow_id: &str,
        step_id: Option<&str>,
    ) -> EngineResult<Step> {
        ctx.start_flow_by_name(flow_id, step_id).await
    }

    pub async fn end_flow(&self, ctx: &mut Context) -> EngineResult<()> {
        ctx.end_flow().await
    }

    #[cfg(test)]
    pub(crate) fn active_conversations(&self) -> usize {
        self.conversation_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
