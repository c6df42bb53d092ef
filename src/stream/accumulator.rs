//! Folds frame payloads into the assistant message being streamed.

use super::sse::DONE_SENTINEL;
use super::transcript::ChatMessage;
use serde_json::Value;

/// Result of applying one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Text was appended to the message.
    Delta(String),
    /// Noise: unparseable JSON or an object with neither `delta` nor `error`.
    Ignored,
    /// Termination sentinel; the message was not touched.
    Done,
    /// The producer reported an error; an annotation was appended.
    Failed(String),
}

impl Applied {
    pub fn should_continue(&self) -> bool {
        matches!(self, Self::Delta(_) | Self::Ignored)
    }
}

/// Apply `payload` to `sink`, the only message this function may mutate.
///
/// `error` takes precedence over `delta` when both are present. A `null`
/// value counts as absent, and a non-string `delta` is ignored.
pub fn apply(payload: &str, sink: &mut ChatMessage) -> Applied {
    if payload == DONE_SENTINEL {
        return Applied::Done;
    }

    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(payload) else {
        tracing::debug!("skipping non-JSON stream payload");
        return Applied::Ignored;
    };

    match object.get("error") {
        None | Some(Value::Null) => {}
        Some(error) => {
            let reason = match error {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            sink.push_error_annotation(&reason);
            return Applied::Failed(reason);
        }
    }

    match object.get("delta") {
        Some(Value::String(delta)) => {
            sink.content.push_str(delta);
            Applied::Delta(delta.clone())
        }
        _ => Applied::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::{Applied, apply};
    use crate::stream::transcript::ChatMessage;

    #[test]
    fn deltas_then_sentinel_build_content() {
        let mut message = ChatMessage::assistant("");
        assert_eq!(
            apply(r#"{"delta":"Hel"}"#, &mut message),
            Applied::Delta("Hel".into())
        );
        assert_eq!(
            apply(r#"{"delta":"lo"}"#, &mut message),
            Applied::Delta("lo".into())
        );
        let done = apply("[DONE]", &mut message);
        assert_eq!(done, Applied::Done);
        assert!(!done.should_continue());
        assert_eq!(message.content, "Hello");
    }

    #[test]
    fn malformed_payload_is_skipped() {
        let mut message = ChatMessage::assistant("a");
        let outcome = apply("not-json", &mut message);
        assert_eq!(outcome, Applied::Ignored);
        assert!(outcome.should_continue());
        assert_eq!(message.content, "a");
    }

    #[test]
    fn error_payload_is_recorded_and_terminal() {
        let mut message = ChatMessage::assistant("partial");
        let outcome = apply(r#"{"error":"rate_limited"}"#, &mut message);
        assert_eq!(outcome, Applied::Failed("rate_limited".into()));
        assert!(!outcome.should_continue());
        assert_eq!(message.content, "partial\n[error: rate_limited]");
    }

    #[test]
    fn structured_error_is_rendered_as_json() {
        let mut message = ChatMessage::assistant("");
        let outcome = apply(r#"{"error":{"code":429}}"#, &mut message);
        assert_eq!(outcome, Applied::Failed(r#"{"code":429}"#.into()));
        assert_eq!(message.content, r#"[error: {"code":429}]"#);
    }

    #[test]
    fn error_wins_over_delta() {
        let mut message = ChatMessage::assistant("");
        let outcome = apply(r#"{"delta":"x","error":"boom"}"#, &mut message);
        assert_eq!(outcome, Applied::Failed("boom".into()));
        assert_eq!(message.content, "[error: boom]");
    }

    #[test]
    fn null_error_is_treated_as_absent() {
        let mut message = ChatMessage::assistant("");
        let outcome = apply(r#"{"delta":"x","error":null}"#, &mut message);
        assert_eq!(outcome, Applied::Delta("x".into()));
    }

    #[test]
    fn other_shapes_are_ignored() {
        let mut message = ChatMessage::assistant("keep");
        for payload in [r#"{}"#, r#"{"delta":5}"#, "[1,2]", r#""text""#, "", " [DONE]"] {
            assert_eq!(apply(payload, &mut message), Applied::Ignored, "{payload}");
        }
        assert_eq!(message.content, "keep");
    }

    #[test]
    fn delta_is_appended_verbatim() {
        let mut message = ChatMessage::assistant("");
        apply(r#"{"delta":"  line\n\ttab "}"#, &mut message);
        assert_eq!(message.content, "  line\n\ttab ");
    }
}
