use super::sink::TurnSink;
use super::sse::TailPolicy;
use super::transcript::{ChatMessage, SharedTranscript};
use super::turn::{Turn, TurnReport};
use crate::config::StreamConfig;
use crate::error::StreamError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Body of a stream request: the full history to be continued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatStreamRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

/// Long-lived streams: only connecting is bounded, reads are not.
pub fn build_stream_client(connect_timeout_secs: u64) -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

pub struct StreamClient {
    http: Client,
    endpoint: String,
    model: String,
    temperature: f64,
    tail_policy: TailPolicy,
}

impl StreamClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: build_stream_client(10),
            endpoint: endpoint.into(),
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            tail_policy: TailPolicy::Discard,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            http: build_stream_client(config.connect_timeout_secs),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            tail_policy: config.tail_policy,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_tail_policy(mut self, tail_policy: TailPolicy) -> Self {
        self.tail_policy = tail_policy;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one assistant turn against the stream endpoint.
    ///
    /// Appends an empty assistant message to `transcript`, posts the history
    /// that preceded it and streams the reply into it. Every failure ends up
    /// as an annotation in that message; nothing is returned as an error.
    pub async fn run_turn(
        &self,
        transcript: &SharedTranscript,
        sink: &dyn TurnSink,
        cancel: &CancellationToken,
    ) -> TurnReport {
        let mut turn = Turn::new(transcript.clone(), sink);
        let request = ChatStreamRequest {
            messages: turn.start(),
            model: self.model.clone(),
            temperature: self.temperature,
        };
        tracing::debug!(
            endpoint = %self.endpoint,
            messages = request.messages.len(),
            "opening chat stream"
        );

        let send = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&request)
            .send();
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                turn.abort();
                return turn.finish();
            }
            response = send => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                turn.fail(&StreamError::Request {
                    endpoint: self.endpoint.clone(),
                    message: error.without_url().to_string(),
                });
                return turn.finish();
            }
        };

        let status = response.status();
        if !status.is_success() {
            turn.fail(&StreamError::Status {
                status: status.as_u16(),
            });
            return turn.finish();
        }

        turn.drive(response.bytes_stream(), cancel, self.tail_policy)
            .await
    }
}
