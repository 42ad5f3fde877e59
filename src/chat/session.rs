//! In-progress conversation, turned into a transcript when saved

use crate::archive::{Message, Transcript};
use chrono::Utc;
use ulid::Ulid;

/// Longest generated title, in characters
pub const TITLE_MAX_CHARS: usize = 40;

const UNTITLED: &str = "Untitled chat";

/// Messages exchanged so far, in conversation order
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    messages: Vec<Message>,
    /// Id of the last saved snapshot and how many messages it held
    saved: Option<(String, usize)>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message typed by the user
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Record a reply from the assistant
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Forget the conversation
    ///
    /// The next save starts a new transcript.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.saved = None;
    }

    /// Id of the transcript this session was last saved as
    pub fn saved_id(&self) -> Option<&str> {
        self.saved.as_ref().map(|(id, _)| id.as_str())
    }

    /// Whether there are messages not covered by the last save
    pub fn has_unsaved_messages(&self) -> bool {
        match &self.saved {
            Some((_, saved_len)) => *saved_len != self.messages.len(),
            None => !self.messages.is_empty(),
        }
    }

    /// Record that `transcript` now holds this session
    pub fn mark_saved(&mut self, transcript: &Transcript) {
        self.saved = Some((transcript.id.clone(), transcript.message_count()));
    }

    /// Title used when none is given: the opening user message, shortened
    pub fn default_title(&self) -> String {
        self.messages
            .iter()
            .find(|m| m.is_user)
            .map(|m| m.text.trim())
            .filter(|text| !text.is_empty())
            .map(|text| text.chars().take(TITLE_MAX_CHARS).collect::<String>())
            .map(|title| title.trim_end().to_string())
            .unwrap_or_else(|| UNTITLED.to_string())
    }

    /// Snapshot the conversation as a transcript saved now
    ///
    /// A blank `title` falls back to [`default_title`](Self::default_title).
    /// Once the session has been saved, snapshots keep that transcript's id.
    pub fn finish(&self, owner_id: impl Into<String>, title: Option<&str>) -> Transcript {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_title());

        let id = self
            .saved_id()
            .map(str::to_string)
            .unwrap_or_else(|| Ulid::new().to_string());

        Transcript::new(
            id,
            owner_id,
            title,
            self.messages.clone(),
            Utc::now(),
        )
    }
}
