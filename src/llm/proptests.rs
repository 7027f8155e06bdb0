//! Property-based tests for the streaming wire layer
//!
//! These tests verify that decoding preserves key invariants:
//! - SSE payloads survive arbitrary chunk boundaries
//! - Text parts of a chunk are concatenated in order
//! - Function calls keep their name and arguments, and always get an id
//! - Chunks with no usable content are skipped rather than failing

#![allow(clippy::redundant_closure_for_method_calls)]

use super::gemini::parse_chunk;
use super::sse::decode_sse;
use super::LlmError;
use futures::{executor::block_on, stream, StreamExt};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::convert::Infallible;

// ============================================================================
// Strategies
// ============================================================================

/// Single-line SSE payload
fn arb_payload() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 {}:\",.]{1,40}".prop_filter("not the done marker", |s| s.trim() != "[DONE]")
}

/// Text as the model streams it, including multibyte characters
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?🌧️°é\n]{0,40}"
}

fn arb_args() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({})),
        "[A-Za-z ]{1,20}".prop_map(|location| json!({ "location": location })),
    ]
}

fn encode_events(payloads: &[String]) -> Vec<u8> {
    payloads
        .iter()
        .map(|p| format!("data: {p}\n\n"))
        .collect::<String>()
        .into_bytes()
}

/// Cut `bytes` at the given offsets, ignoring char boundaries
fn split_bytes(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    points.push(0);
    points.push(bytes.len());
    points.sort_unstable();
    points.dedup();
    points.windows(2).map(|w| bytes[w[0]..w[1]].to_vec()).collect()
}

fn decode_all(chunks: Vec<Vec<u8>>) -> Vec<String> {
    let input = stream::iter(chunks.into_iter().map(Ok::<_, Infallible>));
    let decoded = decode_sse(input, |data| Ok::<_, LlmError>(Some(data.to_string())));
    block_on(decoded.map(|r| r.unwrap()).collect())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_sse_payloads_survive_chunking(
        payloads in proptest::collection::vec(arb_payload(), 1..6),
        cuts in proptest::collection::vec(any::<usize>(), 0..10),
    ) {
        let bytes = encode_events(&payloads);
        let decoded = decode_all(split_bytes(&bytes, &cuts));
        prop_assert_eq!(decoded, payloads);
    }

    #[test]
    fn prop_text_parts_concatenated(parts in proptest::collection::vec(arb_text(), 1..5)) {
        let wire: Vec<Value> = parts.iter().map(|t| json!({ "text": t })).collect();
        let data = json!({ "candidates": [{ "content": { "role": "model", "parts": wire } }] });

        let fragment = parse_chunk(&data.to_string()).unwrap();
        let joined: String = parts.concat();
        if joined.is_empty() {
            prop_assert!(fragment.is_none());
        } else {
            let fragment = fragment.unwrap();
            prop_assert_eq!(fragment.text, Some(joined));
            prop_assert!(fragment.function_calls.is_empty());
        }
    }

    #[test]
    fn prop_function_calls_preserved(
        name in "[a-z_]{3,20}",
        args in arb_args(),
        id in proptest::option::of("[a-z0-9]{6,12}"),
    ) {
        let mut call = json!({ "name": name, "args": args });
        if let Some(id) = &id {
            call["id"] = json!(id);
        }
        let data = json!({ "candidates": [{ "content": { "parts": [{ "functionCall": call }] } }] });

        let fragment = parse_chunk(&data.to_string()).unwrap().unwrap();
        prop_assert_eq!(fragment.text, None);
        prop_assert_eq!(fragment.function_calls.len(), 1);

        let parsed = &fragment.function_calls[0];
        prop_assert_eq!(&parsed.name, &name);
        prop_assert_eq!(&parsed.args, &args);
        prop_assert!(!parsed.id.is_empty());
        if let Some(id) = id {
            prop_assert_eq!(&parsed.id, &id);
        }
    }

    #[test]
    fn prop_empty_chunks_skipped(finish in prop_oneof![Just("STOP"), Just("MAX_TOKENS")]) {
        let no_candidates = json!({ "candidates": [] });
        let no_content = json!({ "candidates": [{ "finishReason": finish }] });
        let no_parts = json!({ "candidates": [{ "content": { "parts": [] } }] });

        for data in [no_candidates, no_content, no_parts] {
            prop_assert!(parse_chunk(&data.to_string()).unwrap().is_none());
        }
    }
}
