use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Append a visible `[error: ...]` marker, on its own line when the
    /// message already has text.
    pub fn push_error_annotation(&mut self, reason: &str) {
        if !self.content.is_empty() && !self.content.ends_with('\n') {
            self.content.push('\n');
        }
        self.content.push_str(&error_annotation(reason));
    }
}

pub fn error_annotation(reason: &str) -> String {
    format!("[error: {reason}]")
}

/// Position of a message in its transcript. Stable because the transcript
/// never removes or reorders entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageSlot(usize);

impl MessageSlot {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Ordered message log. Append-only, except for assistant messages opened by
/// [`Transcript::begin_assistant`], which stay writable until sealed.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    open: BTreeSet<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) -> MessageSlot {
        self.messages.push(message);
        MessageSlot(self.messages.len() - 1)
    }

    /// Append an empty assistant message that a streaming turn will fill.
    pub fn begin_assistant(&mut self) -> MessageSlot {
        let slot = self.push(ChatMessage::assistant(""));
        self.open.insert(slot.0);
        slot
    }

    /// Writable access to a still-open assistant message.
    pub fn open_message_mut(&mut self, slot: MessageSlot) -> Option<&mut ChatMessage> {
        if self.open.contains(&slot.0) {
            self.messages.get_mut(slot.0)
        } else {
            None
        }
    }

    /// Freeze a streamed message. Returns `false` if it was not open.
    pub fn seal(&mut self, slot: MessageSlot) -> bool {
        self.open.remove(&slot.0)
    }

    pub fn is_open(&self, slot: MessageSlot) -> bool {
        self.open.contains(&slot.0)
    }

    pub fn get(&self, slot: MessageSlot) -> Option<&ChatMessage> {
        self.messages.get(slot.0)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Finished messages that precede `slot`; the history a turn continues.
    pub fn history_before(&self, slot: MessageSlot) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .enumerate()
            .take(slot.0)
            .filter(|(index, _)| !self.open.contains(index))
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Transcript shared between concurrently streaming turns. Every mutation
/// happens under the lock and targets one slot.
#[derive(Debug, Clone, Default)]
pub struct SharedTranscript {
    inner: Arc<Mutex<Transcript>>,
}

impl SharedTranscript {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transcript)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Transcript> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn push(&self, message: ChatMessage) -> MessageSlot {
        self.lock().push(message)
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.lock().messages().to_vec()
    }
}
