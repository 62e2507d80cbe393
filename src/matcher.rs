//! Response matching
//!
//! Maps an incoming message to the expected response of the current step it
//! satisfies. First match in declaration order wins.

use crate::engine::Context;
use crate::model::{ExpectedResponse, IncomingMessage, IncomingMessageType, Step};
use std::fmt;
use std::sync::Arc;

/// Plaintext response text that matches any incoming text
pub const WILDCARD: &str = "*";

type MatchFn = dyn for<'s> Fn(&IncomingMessage, &'s Step, &Context) -> Option<&'s ExpectedResponse>
    + Send
    + Sync;

/// Matching policy, set engine-wide or overridden per step
#[derive(Clone)]
pub struct ResponseMatcher(Arc<MatchFn>);

impl ResponseMatcher {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'s> Fn(&IncomingMessage, &'s Step, &Context) -> Option<&'s ExpectedResponse>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn matches<'s>(
        &self,
        message: &IncomingMessage,
        step: &'s Step,
        context: &Context,
    ) -> Option<&'s ExpectedResponse> {
        (self.0)(message, step, context)
    }
}

impl Default for ResponseMatcher {
    fn default() -> Self {
        Self::new(default_response_matcher)
    }
}

impl fmt::Debug for ResponseMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseMatcher(..)")
    }
}

/// Default policy: same type, same payload, and for plaintext the same text
/// or the wildcard
pub fn default_response_matcher<'s>(
    message: &IncomingMessage,
    step: &'s Step,
    _context: &Context,
) -> Option<&'s ExpectedResponse> {
    step.responses
        .iter()
        .find(|expected| response_matches(expected, message))
}

fn response_matches(expected: &ExpectedResponse, message: &IncomingMessage) -> bool {
    if expected.kind != message.kind {
        return false;
    }

    let text_matches = expected.kind != IncomingMessageType::Plaintext
        || expected.text == message.text
        || expected.text.as_deref() == Some(WILDCARD);

    text_matches && expected.payload == message.payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Callback;
    use crate::testing::test_context;
    use proptest::prelude::*;

    fn yes_or_anything() -> Step {
        Step::new("confirm")
            .response(ExpectedResponse::text("yes", Callback::goto("yes")))
            .response(ExpectedResponse::any_text(Callback::goto("other")))
    }

    #[tokio::test]
    async fn test_exact_text_wins_over_wildcard() {
        let ctx = test_context(IncomingMessage::plaintext("yes")).await;
        let step = yes_or_anything();

        let matched = default_response_matcher(ctx.message(), &step, &ctx).unwrap();
        assert_eq!(matched.text.as_deref(), Some("yes"));
    }

    #[tokio::test]
    async fn test_wildcard_catches_other_text() {
        let ctx = test_context(IncomingMessage::plaintext("no")).await;
        let step = yes_or_anything();

        let matched = default_response_matcher(ctx.message(), &step, &ctx).unwrap();
        assert!(matched.is_wildcard());
    }

    #[tokio::test]
    async fn test_payload_does_not_match_plaintext_responses() {
        let ctx = test_context(IncomingMessage::payload("X")).await;
        let step = yes_or_anything();

        assert!(default_response_matcher(ctx.message(), &step, &ctx).is_none());
    }

    #[tokio::test]
    async fn test_payload_must_be_equal() {
        let step = Step::new("colors")
            .response(ExpectedResponse::payload("RED", Callback::goto("red")))
            .response(ExpectedResponse::payload("BLUE", Callback::goto("blue")));

        let ctx = test_context(IncomingMessage::payload("BLUE")).await;
        let matched = default_response_matcher(ctx.message(), &step, &ctx).unwrap();
        assert_eq!(matched.payload, Some(serde_json::json!("BLUE")));

        let ctx = test_context(IncomingMessage::payload("GREEN")).await;
        assert!(default_response_matcher(ctx.message(), &step, &ctx).is_none());
    }

    #[tokio::test]
    async fn test_plaintext_with_payload_needs_payload() {
        let mut expected = ExpectedResponse::any_text(Callback::end_flow());
        expected.payload = Some(serde_json::json!({"button": 1}));
        let step = Step::new("s").response(expected);

        let ctx = test_context(IncomingMessage::plaintext("hello")).await;
        assert!(default_response_matcher(ctx.message(), &step, &ctx).is_none());
    }

    #[tokio::test]
    async fn test_custom_matcher() {
        let last = ResponseMatcher::new(|_message, step, _ctx| step.responses.last());
        let ctx = test_context(IncomingMessage::plaintext("yes")).await;
        let step = yes_or_anything();

        let matched = last.matches(ctx.message(), &step, &ctx).unwrap();
        assert!(matched.is_wildcard());
    }

    proptest! {
        #[test]
        fn prop_wildcard_matches_any_text(text in ".{0,40}") {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let ctx = rt.block_on(test_context(IncomingMessage::plaintext(text.clone())));
            let step = Step::new("s").response(ExpectedResponse::any_text(Callback::end_flow()));

            prop_assert!(default_response_matcher(ctx.message(), &step, &ctx).is_some());
        }

        #[test]
        fn prop_exact_text_matches_only_itself(expected in "[a-z]{1,10}", actual in "[a-z]{1,10}") {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let ctx = rt.block_on(test_context(IncomingMessage::plaintext(actual.clone())));
            let step = Step::new("s").response(ExpectedResponse::text(expected.clone(), Callback::end_flow()));

            let matched = default_response_matcher(ctx.message(), &step, &ctx).is_some();
            prop_assert_eq!(matched, expected == actual);
        }
    }
}
