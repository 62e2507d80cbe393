//! Property-based tests for the engine
//!
//! These tests check navigation invariants across generated flows and input.

use super::*;
use crate::model::{Callback, ExpectedResponse};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Test Helpers
// ============================================================================

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Chain of steps `s0 -> s1 -> ... -> s{n-1}`, each advancing on its own
/// keyword; the last one ends the flow
fn chain_flow(keywords: &[String]) -> Flow {
    let mut flow = Flow::new("chain", "s0");
    for (i, keyword) in keywords.iter().enumerate() {
        let next = if i + 1 == keywords.len() {
            Callback::end_flow()
        } else {
            Callback::goto(format!("s{}", i + 1))
        };
        flow = flow.step(
            Step::new(format!("s{i}"))
                .text(format!("Step {i}"))
                .response(ExpectedResponse::text(keyword.clone(), next)),
        );
    }
    flow
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_keywords() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::hash_set("[a-z]{1,8}", 1..6).prop_map(|set| set.into_iter().collect())
}

fn arb_texts() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(".{0,30}", 0..5)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_rendering_plain_step_is_identity(texts in arb_texts()) {
        let rt = runtime();
        let mut ctx = rt.block_on(crate::testing::test_context(IncomingMessage::plaintext("hi")));
        let step = texts
            .iter()
            .fold(Step::new("plain"), |step, text| step.text(text.clone()));

        let once = rt.block_on(render_step(step.clone(), &mut ctx)).unwrap();
        let twice = rt.block_on(render_step(once.clone(), &mut ctx)).unwrap();

        prop_assert_eq!(once.texts(), step.texts());
        prop_assert_eq!(twice.texts(), step.texts());
        prop_assert!(!twice.is_pending());
    }

    #[test]
    fn prop_keywords_walk_the_chain(keywords in arb_keywords()) {
        let rt = runtime();
        let store = InMemorySessionStore::new();
        let engine = Engine::new(store.clone(), chain_flow(&keywords)).unwrap();

        let first = rt
            .block_on(engine.process_message("conv", IncomingMessage::plaintext("start")))
            .unwrap()
            .unwrap();
        prop_assert_eq!(first.id, "s0");

        for (i, keyword) in keywords.iter().enumerate() {
            let reply = rt
                .block_on(engine.process_message("conv", IncomingMessage::plaintext(keyword.clone())))
                .unwrap();
            if i + 1 == keywords.len() {
                prop_assert!(reply.is_none());
            } else {
                let expected = format!("s{}", i + 1);
                prop_assert_eq!(reply.map(|step| step.id), Some(expected));
            }
        }

        prop_assert!(store.snapshot("conv").unwrap().is_empty());
    }

    #[test]
    fn prop_unmatched_text_keeps_position(keywords in arb_keywords(), noise in "[A-Z0-9]{1,8}") {
        // Keywords are lowercase, so uppercase noise never matches
        let rt = runtime();
        let store = InMemorySessionStore::new();
        let engine = Engine::new(store.clone(), chain_flow(&keywords)).unwrap();

        rt.block_on(engine.process_message("conv", IncomingMessage::plaintext("start")))
            .unwrap();
        let reply = rt
            .block_on(engine.process_message("conv", IncomingMessage::plaintext(noise)))
            .unwrap()
            .unwrap();

        prop_assert_eq!(reply.id.as_str(), "s0");
        prop_assert_eq!(
            reply.texts(),
            vec![engine.config().not_understood_text.as_str(), "Step 0"]
        );
        let snapshot = store.snapshot("conv").unwrap();
        prop_assert_eq!(snapshot.get(STEP_KEY), Some(&json!("s0")));
    }
}
