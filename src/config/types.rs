use crate::error::ConfigError;
use crate::security::LaunchVerifier;
use crate::stream::TailPolicy;
use crate::stream::client::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub launch: LaunchConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.stream.temperature) {
            return Err(ConfigError::Validation(format!(
                "stream.temperature must be within 0.0..=2.0, got {}",
                self.stream.temperature
            )));
        }
        if self.stream.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "stream.endpoint must not be empty".into(),
            ));
        }
        if self.gateway.host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "gateway.host must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Shared secret for launch-data verification.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LaunchConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Maximum age of `auth_date` in seconds; 0 disables the check.
    #[serde(default)]
    pub max_age_secs: u64,
}

impl LaunchConfig {
    pub fn verifier(&self) -> Option<LaunchVerifier> {
        let token = self.bot_token.as_deref().map(str::trim)?;
        if token.is_empty() {
            return None;
        }
        Some(LaunchVerifier::new(token).with_max_age(Duration::from_secs(self.max_age_secs)))
    }
}

impl fmt::Debug for LaunchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("max_age_secs", &self.max_age_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_stream_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub tail_policy: TailPolicy,
}

fn default_stream_endpoint() -> String {
    "http://localhost:8000/v1/chat/stream".into()
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_stream_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            connect_timeout_secs: default_connect_timeout_secs(),
            tail_policy: TailPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Pause between demo delta frames.
    #[serde(default = "default_demo_delay_ms")]
    pub demo_delay_ms: u64,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

fn default_demo_delay_ms() -> u64 {
    20
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            allowed_origins: default_allowed_origins(),
            demo_delay_ms: default_demo_delay_ms(),
        }
    }
}
