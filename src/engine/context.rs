//! Per-message context and navigation

use super::render::render_step;
use super::{EngineError, EngineResult, FlowRegistry};
use crate::model::{Flow, IncomingMessage, Step};
use crate::session::{self, Session, FLOW_KEY, STEP_KEY};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Everything a callback needs while one message is processed
///
/// Built fresh for every `process_message` call and dropped when it returns.
/// Navigation goes through the context: each call updates the session and the
/// context's own view of the current flow and step.
pub struct Context {
    pub(crate) conversation_id: String,
    pub(crate) message: IncomingMessage,
    pub(crate) flows: Arc<FlowRegistry>,
    pub(crate) session: Arc<dyn Session>,
    pub(crate) flow: Option<Arc<Flow>>,
    pub(crate) step_id: Option<String>,
    pub(crate) current_step: Option<Step>,
    pub(crate) max_render_passes: usize,
    /// Render callbacks run so far for this message
    pub(crate) render_passes: usize,
}

impl Context {
    pub(crate) fn new(
        conversation_id: impl Into<String>,
        message: IncomingMessage,
        flows: Arc<FlowRegistry>,
        session: Arc<dyn Session>,
        max_render_passes: usize,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message,
            flows,
            session,
            flow: None,
            step_id: None,
            current_step: None,
            max_render_passes,
            render_passes: 0,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// The message being processed
    pub fn message(&self) -> &IncomingMessage {
        &self.message
    }

    pub fn flow(&self) -> Option<&Arc<Flow>> {
        self.flow.as_ref()
    }

    pub fn flow_id(&self) -> Option<&str> {
        self.flow.as_ref().map(|flow| flow.id.as_str())
    }

    /// Look up the default flow or a registered flow by id
    pub fn find_flow(&self, flow_id: &str) -> Option<&Arc<Flow>> {
        self.flows.find(flow_id)
    }

    pub fn step_id(&self) -> Option<&str> {
        self.step_id.as_deref()
    }

    /// Step the conversation was on when the message arrived, rendered once
    /// rendering has run
    pub fn current_step(&self) -> Option<&Step> {
        self.current_step.as_ref()
    }

    /// Raw session accessor, reserved keys included
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// Read conversation data stored by callbacks
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> EngineResult<Option<T>> {
        let Some(value) = self.session.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|source| EngineError::SessionValue {
                key: key.to_string(),
                source,
            })
    }

    /// Store conversation data; the engine's own keys are off limits
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> EngineResult<()> {
        if session::is_reserved(key) {
            return Err(EngineError::ReservedKey(key.to_string()));
        }
        let value = serde_json::to_value(value).map_err(|source| EngineError::SessionValue {
            key: key.to_string(),
            source,
        })?;
        self.session.set(key, value).await?;
        Ok(())
    }

    /// Move to `step_id` within the session's current flow and render it
    ///
    /// Fails with [`EngineError::UnknownStep`] when the step does not exist.
    pub async fn goto_step(&mut self, step_id: &str) -> EngineResult<Step> {
        let flow_id = session::read_pointer(self.session.as_ref(), FLOW_KEY).await?;
        let flow = flow_id
            .as_deref()
            .and_then(|id| self.flows.find(id))
            .cloned();

        let Some(step) = flow.as_ref().and_then(|f| f.find_step(step_id)).cloned() else {
            return Err(EngineError::UnknownStep {
                step: step_id.to_string(),
                flow: flow_id.unwrap_or_else(|| "no flow".to_string()),
            });
        };

        self.session
            .set(STEP_KEY, Value::String(step_id.to_string()))
            .await?;
        self.flow = flow;
        self.step_id = Some(step_id.to_string());

        tracing::debug!(
            conv_id = %self.conversation_id,
            flow = ?self.flow_id(),
            step = %step_id,
            "Entered step"
        );

        render_step(step, self).await
    }

    /// Record `flow` as current and enter `step_id`, or its default step
    ///
    /// The flow must be known to the engine. Nothing is written when the flow
    /// or the step cannot be found.
    pub async fn start_flow(&mut self, flow: &Flow, step_id: Option<&str>) -> EngineResult<Step> {
        let step_id = step_id.unwrap_or(&flow.default_step);
        let Some(registered) = self.flows.find(&flow.id) else {
            return Err(EngineError::UnknownFlow(flow.id.clone()));
        };
        if registered.find_step(step_id).is_none() {
            return Err(EngineError::UnknownStep {
                step: step_id.to_string(),
                flow: flow.id.clone(),
            });
        }

        self.session
            .set(FLOW_KEY, Value::String(flow.id.clone()))
            .await?;
        tracing::debug!(conv_id = %self.conversation_id, flow = %flow.id, "Started flow");

        self.goto_step(step_id).await
    }

    /// Like [`Context::start_flow`] for a flow known to the engine by id
    pub async fn start_flow_by_name(
        &mut self,
        flow_id: &str,
        step_id: Option<&str>,
    ) -> EngineResult<Step> {
        let flow = self
            .flows
            .find(flow_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownFlow(flow_id.to_string()))?;
        self.start_flow(&flow, step_id).await
    }

    /// Clear the conversation's position; the next message starts over
    pub async fn end_flow(&mut self) -> EngineResult<()> {
        self.session.set(FLOW_KEY, Value::Null).await?;
        self.session.set(STEP_KEY, Value::Null).await?;
        tracing::debug!(conv_id = %self.conversation_id, flow = ?self.flow_id(), "Ended flow");

        self.flow = None;
        self.step_id = None;
        Ok(())
    }
}
