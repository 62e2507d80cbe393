//! Declarative flow/step model
//!
//! Flows and steps are immutable once registered with the engine. Dynamic
//! content comes from step callbacks, which are resolved per message.

mod flow;
mod message;
mod step;

pub use flow::Flow;
pub use message::{IncomingMessage, IncomingMessageType, OutgoingMessage, OutgoingMessageType};
pub use step::{Callback, CallbackResult, ExpectedResponse, Step, StepOverlay};
