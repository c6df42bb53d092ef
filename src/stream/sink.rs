use super::turn::TurnReport;
use std::sync::Arc;

/// Observer for a streaming turn. Called synchronously from the read loop,
/// so implementations must not block.
pub trait TurnSink: Send + Sync {
    fn on_delta(&self, text: &str);

    fn on_finish(&self, _report: &TurnReport) {}
}

#[derive(Debug, Default)]
pub struct NullTurnSink;

impl TurnSink for NullTurnSink {
    fn on_delta(&self, _text: &str) {}
}

/// Echoes deltas to stderr as they arrive.
pub struct CliTurnSink {
    writer: Arc<dyn Fn(&str) + Send + Sync>,
}

impl CliTurnSink {
    pub fn new() -> Self {
        Self {
            writer: Arc::new(|text| {
                eprint!("{text}");
            }),
        }
    }

    #[cfg(test)]
    fn with_writer(writer: Arc<dyn Fn(&str) + Send + Sync>) -> Self {
        Self { writer }
    }
}

impl Default for CliTurnSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnSink for CliTurnSink {
    fn on_delta(&self, text: &str) {
        (self.writer)(text);
    }

    fn on_finish(&self, _report: &TurnReport) {
        (self.writer)("\n");
    }
}
