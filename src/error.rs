use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `Studentio`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; the binary and the gateway glue use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum StudentioError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Security / Launch data ──────────────────────────────────────────
    #[error("security: {0}")]
    Security(#[from] SecurityError),

    // ── Streaming transport ─────────────────────────────────────────────
    #[error("stream: {0}")]
    Stream(#[from] StreamError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Security errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SecurityError {
    /// The keyed hash could not be initialised. Verification treats this as a
    /// rejection, never as success.
    #[error("hmac primitive unavailable: {0}")]
    HmacUnavailable(String),

    #[error("missing secret")]
    MissingSecret,
}

// ─── Stream errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("stream endpoint answered with status {status}")]
    Status { status: u16 },

    #[error("transport read failed: {0}")]
    Read(String),
}

impl StreamError {
    /// Short text placed inside the transcript's error annotation.
    pub fn annotation(&self) -> String {
        match self {
            Self::Request { message, .. } => format!("request failed: {message}"),
            Self::Status { status } => format!("http {status}"),
            Self::Read(message) => format!("connection lost: {message}"),
        }
    }
}

pub type Result<T, E = StudentioError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_error_wraps_into_top_level() {
        let err: StudentioError = SecurityError::MissingSecret.into();
        assert_eq!(err.to_string(), "security: missing secret");
    }

    #[test]
    fn stream_status_annotation_is_short() {
        let err = StreamError::Status { status: 502 };
        assert_eq!(err.annotation(), "http 502");
        assert_eq!(
            StudentioError::from(err).to_string(),
            "stream: stream endpoint answered with status 502"
        );
    }

    #[test]
    fn read_error_annotation_mentions_connection() {
        let err = StreamError::Read("reset by peer".into());
        assert_eq!(err.annotation(), "connection lost: reset by peer");
    }
}
