//! Steps, step overlays and the callbacks that render or answer them

use super::message::{IncomingMessageType, OutgoingMessage};
use crate::engine::{Context, EngineResult};
use crate::matcher::{ResponseMatcher, WILDCARD};
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// What a callback hands back: an overlay to merge onto the step, or nothing
pub type CallbackResult = EngineResult<Option<StepOverlay>>;

type CallbackFn = dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, CallbackResult> + Send + Sync;

/// Async callback run against the per-message [`Context`]
///
/// Used both to render a step (computing its content when it is reached) and to
/// answer a matched response. Callbacks navigate through the context
/// (`ctx.goto_step(..)`, `ctx.end_flow()`, ...) and may return a partial step.
///
/// ```ignore
/// Callback::new(|ctx| Box::pin(async move {
///     Ok(Some(ctx.goto_step("done").await?.into()))
/// }))
/// ```
#[derive(Clone)]
pub struct Callback(Arc<CallbackFn>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, CallbackResult> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Navigate to another step of the current flow
    pub fn goto(step_id: impl Into<String>) -> Self {
        let step_id: String = step_id.into();
        Self::new(move |ctx| {
            let step_id = step_id.clone();
            Box::pin(async move { Ok(Some(ctx.goto_step(&step_id).await?.into())) })
        })
    }

    /// Switch to a registered flow, entering its default step
    pub fn start_flow(flow_id: impl Into<String>) -> Self {
        let flow_id: String = flow_id.into();
        Self::new(move |ctx| {
            let flow_id = flow_id.clone();
            Box::pin(async move { Ok(Some(ctx.start_flow_by_name(&flow_id, None).await?.into())) })
        })
    }

    /// End the conversation's current flow
    pub fn end_flow() -> Self {
        Self::new(|ctx| {
            Box::pin(async move {
                ctx.end_flow().await?;
                Ok(None)
            })
        })
    }

    /// Return a fixed overlay without navigating
    pub fn reply(overlay: StepOverlay) -> Self {
        Self::new(move |_ctx| {
            let overlay = overlay.clone();
            Box::pin(async move { Ok(Some(overlay)) })
        })
    }

    pub fn call<'a>(&self, ctx: &'a mut Context) -> BoxFuture<'a, CallbackResult> {
        (self.0)(ctx)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// A response the step is waiting for, and what to do when it arrives
#[derive(Debug, Clone, Serialize)]
pub struct ExpectedResponse {
    #[serde(rename = "type")]
    pub kind: IncomingMessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing)]
    pub callback: Callback,
}

impl ExpectedResponse {
    /// Plaintext response matching `text` exactly
    pub fn text(text: impl Into<String>, callback: Callback) -> Self {
        Self {
            kind: IncomingMessageType::Plaintext,
            text: Some(text.into()),
            payload: None,
            callback,
        }
    }

    /// Plaintext response matching any text
    pub fn any_text(callback: Callback) -> Self {
        Self::text(WILDCARD, callback)
    }

    /// Structured response matching `payload` exactly
    pub fn payload(payload: impl Into<Value>, callback: Callback) -> Self {
        Self {
            kind: IncomingMessageType::Payload,
            text: None,
            payload: Some(payload.into()),
            callback,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.kind == IncomingMessageType::Plaintext && self.text.as_deref() == Some(WILDCARD)
    }
}

/// A node of a flow
///
/// A step with a `callback` is still pending: the engine renders it (runs the
/// callback chain) before it is matched against or handed to a channel.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub id: String,
    pub messages: Vec<OutgoingMessage>,
    pub responses: Vec<ExpectedResponse>,
    #[serde(skip_serializing)]
    pub response_matcher: Option<ResponseMatcher>,
    #[serde(skip_serializing)]
    pub callback: Option<Callback>,
}

impl Step {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            responses: Vec::new(),
            response_matcher: None,
            callback: None,
        }
    }

    pub fn message(mut self, message: OutgoingMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.message(OutgoingMessage::text(text))
    }

    pub fn response(mut self, response: ExpectedResponse) -> Self {
        self.responses.push(response);
        self
    }

    pub fn matcher(mut self, matcher: ResponseMatcher) -> Self {
        self.response_matcher = Some(matcher);
        self
    }

    /// Compute the step's content each time it is reached
    pub fn on_render(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Whether the step still carries a render callback
    pub fn is_pending(&self) -> bool {
        self.callback.is_some()
    }

    /// Merge an overlay onto this step
    ///
    /// Fields present in the overlay replace ours. The callback is always
    /// replaced, so an overlay without one finishes the render chain.
    pub fn apply(&mut self, overlay: StepOverlay) {
        let StepOverlay {
            id,
            messages,
            responses,
            response_matcher,
            callback,
        } = overlay;

        if let Some(id) = id {
            self.id = id;
        }
        if let Some(messages) = messages {
            self.messages = messages;
        }
        if let Some(responses) = responses {
            self.responses = responses;
        }
        if let Some(matcher) = response_matcher {
            self.response_matcher = Some(matcher);
        }
        self.callback = callback;
    }

    /// Text of every plaintext outgoing message, in order
    pub fn texts(&self) -> Vec<&str> {
        self.messages.iter().filter_map(OutgoingMessage::as_text).collect()
    }
}

/// Partial step returned by callbacks
#[derive(Debug, Clone, Default)]
pub struct StepOverlay {
    pub id: Option<String>,
    pub messages: Option<Vec<OutgoingMessage>>,
    pub responses: Option<Vec<ExpectedResponse>>,
    pub response_matcher: Option<ResponseMatcher>,
    /// Next callback in the render chain
    pub callback: Option<Callback>,
}

impl StepOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(mut self, messages: Vec<OutgoingMessage>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Append a plaintext message to the overlay's messages
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.messages
            .get_or_insert_with(Vec::new)
            .push(OutgoingMessage::text(text));
        self
    }

    pub fn responses(mut self, responses: Vec<ExpectedResponse>) -> Self {
        self.responses = Some(responses);
        self
    }

    pub fn matcher(mut self, matcher: ResponseMatcher) -> Self {
        self.response_matcher = Some(matcher);
        self
    }

    pub fn then(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }
}

impl From<Step> for StepOverlay {
    fn from(step: Step) -> Self {
        Self {
            id: Some(step.id),
            messages: Some(step.messages),
            responses: Some(step.responses),
            response_matcher: step.response_matcher,
            callback: step.callback,
        }
    }
}
