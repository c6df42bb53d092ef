//! One assistant turn: `Idle -> Streaming -> Completed | Failed | Aborted`.
//!
//! A turn owns exactly one assistant slot in the shared transcript and never
//! writes anywhere else. Once a terminal state is reached the slot is sealed
//! and later events are ignored.

use super::accumulator::{Applied, apply};
use super::sink::TurnSink;
use super::sse::{StreamFrame, TailPolicy, decode_frames};
use super::transcript::{ChatMessage, MessageSlot, SharedTranscript};
use crate::error::StreamError;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use std::fmt::Display;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Streaming,
    Completed,
    Failed,
    /// Cancelled by the caller; partial content is kept without annotation.
    Aborted,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub slot: Option<MessageSlot>,
    pub state: TurnState,
    pub content: String,
    pub frames: usize,
    /// `false` for a `Completed` turn means the transport closed before the
    /// termination sentinel arrived.
    pub sentinel_seen: bool,
    pub error: Option<String>,
}

pub struct Turn<'a> {
    transcript: SharedTranscript,
    sink: &'a dyn TurnSink,
    slot: Option<MessageSlot>,
    state: TurnState,
    frames: usize,
    sentinel_seen: bool,
    error: Option<String>,
}

impl<'a> Turn<'a> {
    pub fn new(transcript: SharedTranscript, sink: &'a dyn TurnSink) -> Self {
        Self {
            transcript,
            sink,
            slot: None,
            state: TurnState::Idle,
            frames: 0,
            sentinel_seen: false,
            error: None,
        }
    }

    /// Open the assistant slot and return the history the request should
    /// carry. Calling it again does not open a second slot.
    pub fn start(&mut self) -> Vec<ChatMessage> {
        let mut transcript = self.transcript.lock();
        let slot = match self.slot {
            Some(slot) => slot,
            None => {
                let slot = transcript.begin_assistant();
                self.slot = Some(slot);
                self.state = TurnState::Streaming;
                tracing::debug!(slot = slot.index(), "stream turn started");
                slot
            }
        };
        transcript.history_before(slot)
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn slot(&self) -> Option<MessageSlot> {
        self.slot
    }

    /// Feed one frame. Returns `false` once the turn must stop reading.
    pub fn on_frame(&mut self, frame: &StreamFrame) -> bool {
        if self.state != TurnState::Streaming {
            return false;
        }
        self.frames += 1;
        frame.payloads().all(|payload| self.on_payload(payload))
    }

    /// Feed one already-unmarked payload.
    pub fn on_payload(&mut self, payload: &str) -> bool {
        if self.state != TurnState::Streaming {
            return false;
        }
        let Some(slot) = self.slot else {
            return false;
        };

        let outcome = {
            let mut transcript = self.transcript.lock();
            let Some(message) = transcript.open_message_mut(slot) else {
                tracing::warn!(slot = slot.index(), "assistant slot sealed under a live turn");
                return false;
            };
            apply(payload, message)
        };

        match outcome {
            Applied::Delta(text) => {
                self.sink.on_delta(&text);
                true
            }
            Applied::Ignored => true,
            Applied::Done => {
                self.sentinel_seen = true;
                self.settle(TurnState::Completed);
                false
            }
            Applied::Failed(reason) => {
                tracing::warn!(error = %reason, "stream producer reported an error");
                self.error = Some(reason);
                self.settle(TurnState::Failed);
                false
            }
        }
    }

    /// Transport-level failure: annotate the slot and end the turn.
    pub fn fail(&mut self, error: &StreamError) {
        if self.state.is_terminal() {
            return;
        }
        tracing::warn!(%error, "stream turn failed");
        let reason = error.annotation();
        if let Some(slot) = self.slot
            && let Some(message) = self.transcript.lock().open_message_mut(slot)
        {
            message.push_error_annotation(&reason);
        }
        self.error = Some(reason);
        self.settle(TurnState::Failed);
    }

    /// Caller cancelled; keep partial content as is.
    pub fn abort(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        tracing::info!(frames = self.frames, "stream turn aborted");
        self.settle(TurnState::Aborted);
    }

    /// The transport reached end of input.
    pub fn close(&mut self) {
        if self.state != TurnState::Streaming {
            return;
        }
        tracing::warn!(
            frames = self.frames,
            "stream closed without termination sentinel"
        );
        self.settle(TurnState::Completed);
    }

    fn settle(&mut self, state: TurnState) {
        self.state = state;
        if let Some(slot) = self.slot {
            self.transcript.lock().seal(slot);
        }
    }

    pub fn report(&self) -> TurnReport {
        let content = self
            .slot
            .and_then(|slot| {
                self.transcript
                    .lock()
                    .get(slot)
                    .map(|message| message.content.clone())
            })
            .unwrap_or_default();

        TurnReport {
            slot: self.slot,
            state: self.state,
            content,
            frames: self.frames,
            sentinel_seen: self.sentinel_seen,
            error: self.error.clone(),
        }
    }

    /// Read `chunks` until a terminal state, the end of the transport, or
    /// cancellation. Never returns an error; failures land in the transcript.
    pub async fn drive<S, B, E>(
        mut self,
        chunks: S,
        cancel: &CancellationToken,
        tail_policy: TailPolicy,
    ) -> TurnReport
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        if self.state == TurnState::Idle {
            self.start();
        }

        let frames = decode_frames(chunks, tail_policy);
        tokio::pin!(frames);

        while self.state == TurnState::Streaming {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.abort();
                    break;
                }
                next = frames.next() => next,
            };

            match next {
                Some(Ok(frame)) => {
                    self.on_frame(&frame);
                }
                Some(Err(error)) => self.fail(&StreamError::Read(error.to_string())),
                None => self.close(),
            }
        }

        self.finish()
    }

    /// Report the outcome and notify the sink.
    pub fn finish(self) -> TurnReport {
        let report = self.report();
        tracing::info!(
            state = ?report.state,
            frames = report.frames,
            chars = report.content.chars().count(),
            "stream turn finished"
        );
        self.sink.on_finish(&report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::sink::NullTurnSink;
    use crate::stream::transcript::{Role, Transcript};
    use futures_util::stream;
    use std::sync::Mutex;

    fn transcript_with_question() -> SharedTranscript {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::user("hi"));
        SharedTranscript::new(transcript)
    }

    fn body(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, String>> {
        let parts: Vec<_> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(parts)
    }

    async fn run(transcript: &SharedTranscript, parts: &[&str]) -> TurnReport {
        Turn::new(transcript.clone(), &NullTurnSink)
            .drive(body(parts), &CancellationToken::new(), TailPolicy::Discard)
            .await
    }

    #[tokio::test]
    async fn deltas_and_sentinel_complete_the_turn() {
        let transcript = transcript_with_question();
        let report = run(
            &transcript,
            &[
                "data: {\"delta\":\"Hel\"}\n\n",
                "data: {\"delta\":\"lo\"}\n\n",
                "data: [DONE]\n\n",
            ],
        )
        .await;

        assert_eq!(report.state, TurnState::Completed);
        assert!(report.sentinel_seen);
        assert_eq!(report.content, "Hello");
        assert_eq!(report.frames, 3);

        let messages = transcript.snapshot();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hello");
        assert!(!transcript.lock().is_open(report.slot.unwrap()));
    }

    #[tokio::test]
    async fn error_payload_fails_with_partial_content() {
        let transcript = transcript_with_question();
        let report = run(
            &transcript,
            &[
                "data: {\"delta\":\"Par\"}\n\n",
                "data: {\"error\":\"rate_limited\"}\n\n",
            ],
        )
        .await;

        assert_eq!(report.state, TurnState::Failed);
        assert_eq!(report.error.as_deref(), Some("rate_limited"));
        assert_eq!(report.content, "Par\n[error: rate_limited]");
    }

    #[tokio::test]
    async fn malformed_frame_between_deltas_is_skipped() {
        let transcript = transcript_with_question();
        let report = run(
            &transcript,
            &[
                "data: {\"delta\":\"a\"}\n\ndata: not-json\n\n",
                ": keep-alive\n\ndata: {\"delta\":\"b\"}\n\ndata: [DONE]\n\n",
            ],
        )
        .await;

        assert_eq!(report.state, TurnState::Completed);
        assert_eq!(report.content, "ab");
    }

    #[tokio::test]
    async fn frames_after_sentinel_are_not_applied() {
        let transcript = transcript_with_question();
        let report = run(
            &transcript,
            &["data: {\"delta\":\"x\"}\n\ndata: [DONE]\n\ndata: {\"delta\":\"y\"}\n\n"],
        )
        .await;
        assert_eq!(report.content, "x");
        assert_eq!(report.frames, 2);
    }

    #[tokio::test]
    async fn close_without_sentinel_completes_unflagged() {
        let transcript = transcript_with_question();
        let report = run(
            &transcript,
            &["data: {\"delta\":\"x\"}\n\ndata: {\"delta\":\"lost\"}"],
        )
        .await;

        assert_eq!(report.state, TurnState::Completed);
        assert!(!report.sentinel_seen);
        assert_eq!(report.content, "x");
    }

    #[tokio::test]
    async fn transport_error_annotates_and_fails() {
        let transcript = transcript_with_question();
        let chunks = stream::iter(vec![
            Ok(b"data: {\"delta\":\"so far\"}\n\n".to_vec()),
            Err("connection reset".to_string()),
        ]);
        let report = Turn::new(transcript.clone(), &NullTurnSink)
            .drive(chunks, &CancellationToken::new(), TailPolicy::Discard)
            .await;

        assert_eq!(report.state, TurnState::Failed);
        assert_eq!(
            report.content,
            "so far\n[error: connection lost: connection reset]"
        );
    }

    #[tokio::test]
    async fn cancellation_keeps_partial_content() {
        let transcript = transcript_with_question();
        let cancel = CancellationToken::new();
        let first = stream::iter(vec![Ok::<_, String>(
            b"data: {\"delta\":\"part\"}\n\n".to_vec(),
        )]);
        let chunks = first.chain(stream::pending());

        let mut turn = Turn::new(transcript.clone(), &NullTurnSink);
        turn.start();
        let driver = turn.drive(chunks, &cancel, TailPolicy::Discard);
        let canceller = async {
            tokio::task::yield_now().await;
            cancel.cancel();
        };
        let (report, ()) = tokio::join!(driver, canceller);

        assert_eq!(report.state, TurnState::Aborted);
        assert_eq!(report.content, "part");
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn concurrent_turns_write_only_their_own_slot() {
        let transcript = transcript_with_question();
        let mut first = Turn::new(transcript.clone(), &NullTurnSink);
        let mut second = Turn::new(transcript.clone(), &NullTurnSink);
        first.start();
        second.start();

        assert!(first.on_payload(r#"{"delta":"A1"}"#));
        assert!(second.on_payload(r#"{"delta":"B1"}"#));
        assert!(first.on_payload(r#"{"delta":"A2"}"#));
        assert!(!second.on_payload("[DONE]"));
        assert!(!first.on_payload(r#"{"error":"boom"}"#));

        let messages = transcript.snapshot();
        assert_eq!(messages[1].content, "A1A2\n[error: boom]");
        assert_eq!(messages[2].content, "B1");
        assert_eq!(first.state(), TurnState::Failed);
        assert_eq!(second.state(), TurnState::Completed);
    }

    #[test]
    fn terminal_turn_ignores_further_events() {
        let transcript = transcript_with_question();
        let mut turn = Turn::new(transcript.clone(), &NullTurnSink);
        turn.start();
        assert!(!turn.on_payload("[DONE]"));

        turn.fail(&StreamError::Read("late".into()));
        turn.abort();
        assert!(!turn.on_payload(r#"{"delta":"late"}"#));

        let report = turn.report();
        assert_eq!(report.state, TurnState::Completed);
        assert_eq!(report.content, "");
        assert!(report.error.is_none());
    }

    #[test]
    fn start_is_idempotent_and_returns_history() {
        let transcript = transcript_with_question();
        let mut turn = Turn::new(transcript.clone(), &NullTurnSink);
        assert_eq!(turn.state(), TurnState::Idle);

        let history = turn.start();
        assert_eq!(history, vec![ChatMessage::user("hi")]);
        assert_eq!(turn.start(), history);
        assert_eq!(transcript.snapshot().len(), 2);
        assert_eq!(turn.state(), TurnState::Streaming);
    }

    #[test]
    fn failure_before_any_frame_leaves_annotation_only() {
        let transcript = transcript_with_question();
        let mut turn = Turn::new(transcript.clone(), &NullTurnSink);
        turn.start();
        turn.fail(&StreamError::Status { status: 503 });
        assert_eq!(turn.report().content, "[error: http 503]");
        assert_eq!(turn.state(), TurnState::Failed);
    }

    #[test]
    fn sink_sees_each_delta() {
        struct Recording(Mutex<Vec<String>>);
        impl TurnSink for Recording {
            fn on_delta(&self, text: &str) {
                self.0.lock().unwrap().push(text.to_string());
            }
        }

        let sink = Recording(Mutex::new(Vec::new()));
        let transcript = transcript_with_question();
        let mut turn = Turn::new(transcript, &sink);
        turn.start();
        turn.on_frame(&StreamFrame::new("data: {\"delta\":\"a\"}\ndata: {\"delta\":\"b\"}"));
        turn.on_payload("noise");

        assert_eq!(*sink.0.lock().unwrap(), vec!["a", "b"]);
    }
}
