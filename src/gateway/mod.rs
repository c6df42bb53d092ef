//! Axum-based HTTP gateway: demo chat stream producer and launch-data check.
//!
//! - Request body size limits (64KB max)
//! - Request timeouts (30s) on the time to first response byte
//! - CORS restricted to the configured origins

mod handlers;
mod server;

pub use server::{build_app, run_gateway, run_gateway_with_listener};

use crate::config::Config;
use crate::security::LaunchVerifier;
use std::sync::Arc;
use std::time::Duration;

/// Maximum request body size (64KB) -- prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) -- prevents slow-loris attacks
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Reply streamed by the demo producer, one character per frame.
pub const DEMO_REPLY: &str = "Demo stream: no text generation provider is configured. Привет!";

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub verifier: Option<Arc<LaunchVerifier>>,
    pub demo_delay: Duration,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            verifier: config.launch.verifier().map(Arc::new),
            demo_delay: Duration::from_millis(config.gateway.demo_delay_ms),
        }
    }
}
