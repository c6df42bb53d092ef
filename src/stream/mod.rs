//! Streamed assistant replies.
//!
//! Bytes from the transport go through [`sse::FrameDecoder`], each frame's
//! payloads through [`accumulator::apply`], and the result lands in the one
//! assistant message a [`turn::Turn`] owns inside the shared transcript.

pub mod accumulator;
pub mod client;
pub mod sink;
pub mod sse;
pub mod transcript;
pub mod turn;

pub use accumulator::{Applied, apply};
pub use client::{ChatStreamRequest, StreamClient, build_stream_client};
pub use sink::{CliTurnSink, NullTurnSink, TurnSink};
pub use sse::{
    DONE_FRAME, DONE_SENTINEL, FrameDecoder, StreamFrame, TailPolicy, decode_frames, encode_delta,
    encode_error,
};
pub use transcript::{ChatMessage, MessageSlot, Role, SharedTranscript, Transcript};
pub use turn::{Turn, TurnReport, TurnState};
