//! Conversation messages and the transcript that orders them.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Local>,
    /// Model that produced the message; empty for non-assistant messages
    #[serde(default)]
    pub model: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now(),
            model: model.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, "")
    }

    pub fn assistant(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, model)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content, "")
    }
}

/// Ordered conversation. Append-only apart from `clear`.
///
/// At most one assistant response is accumulated at a time; it lives outside
/// `messages` until committed, so it is never sent upstream half-finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
    #[serde(skip)]
    pending: Option<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.pending = None;
    }

    pub fn begin_response(&mut self, model: &str) {
        self.pending = Some(Message::assistant(String::new(), model));
    }

    pub fn append_fragment(&mut self, fragment: &str) {
        if let Some(pending) = self.pending.as_mut() {
            pending.content.push_str(fragment);
        }
    }

    pub fn pending(&self) -> Option<&Message> {
        self.pending.as_ref()
    }

    /// Finalise the pending response with the complete text.
    pub fn commit_response(&mut self, content: String) {
        let Some(mut message) = self.pending.take() else {
            return;
        };
        message.content = content;
        self.messages.push(message);
    }

    pub fn discard_response(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_after_turns_leaves_empty_transcript() {
        let mut transcript = Transcript::new();
        for i in 0..3 {
            transcript.push(Message::user(format!("question {i}")));
            transcript.begin_response("llama3.2:latest");
            transcript.append_fragment("ans");
            transcript.commit_response(format!("answer {i}"));
        }
        assert_eq!(transcript.len(), 6);

        transcript.begin_response("llama3.2:latest");
        transcript.clear();

        assert!(transcript.is_empty());
        assert!(transcript.pending().is_none());
    }

    #[test]
    fn pending_response_is_kept_out_of_messages() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("hi"));
        transcript.begin_response("mistral:latest");
        transcript.append_fragment("Hel");
        transcript.append_fragment("lo");

        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.pending().unwrap().content, "Hello");

        transcript.commit_response("Hello!".to_string());
        assert!(transcript.pending().is_none());

        let last = transcript.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Hello!");
        assert_eq!(last.model, "mistral:latest");
    }

    #[test]
    fn new_response_replaces_previous_pending() {
        let mut transcript = Transcript::new();
        transcript.begin_response("a");
        transcript.append_fragment("stale");
        transcript.begin_response("b");

        assert_eq!(transcript.pending().unwrap().content, "");
        assert_eq!(transcript.pending().unwrap().model, "b");
    }

    #[test]
    fn commit_without_pending_is_ignored() {
        let mut transcript = Transcript::new();
        transcript.commit_response("orphan".to_string());
        assert!(transcript.is_empty());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }
}
