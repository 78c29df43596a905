use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::composer::{AspectRatio, Submission};
use crate::media::{ImageReference, MediaItem};
use crate::payload::StructuredPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Generation,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    AwaitingPrompt,
    AwaitingImage,
    Complete,
    Errored,
}

impl TurnStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnStatus::Complete | TurnStatus::Errored)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TurnStatus::AwaitingPrompt => "awaiting_prompt",
            TurnStatus::AwaitingImage => "awaiting_image",
            TurnStatus::Complete => "complete",
            TurnStatus::Errored => "errored",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub kind: MessageKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TurnStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<StructuredPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    pub created_at: String,
}

impl Message {
    pub fn user(submission: &Submission) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            kind: MessageKind::Text,
            content: submission.text.trim().to_string(),
            media: submission.media.clone(),
            status: None,
            payload: None,
            image: None,
            aspect_ratio: None,
            created_at: now_utc_iso(),
        }
    }

    pub fn assistant_placeholder(aspect_ratio: AspectRatio) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            kind: MessageKind::Generation,
            content: String::new(),
            media: Vec::new(),
            status: Some(TurnStatus::AwaitingPrompt),
            payload: None,
            image: None,
            aspect_ratio: Some(aspect_ratio),
            created_at: now_utc_iso(),
        }
    }
}

/// Ordered, append-only record of the session's messages.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) -> MessageId {
        let id = message.id;
        self.messages.push(message);
        id
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    /// Applies `apply` to the message in place. Returns false if it is gone.
    pub fn update(&mut self, id: MessageId, apply: impl FnOnce(&mut Message)) -> bool {
        match self.messages.iter_mut().find(|message| message.id == id) {
            Some(message) => {
                apply(message);
                true
            }
            None => false,
        }
    }

    /// Removes a message outright. Only used to drop a placeholder whose
    /// turn was abandoned because the credential was rejected.
    pub fn discard(&mut self, id: MessageId) -> Option<Message> {
        let index = self.messages.iter().position(|message| message.id == id)?;
        Some(self.messages.remove(index))
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
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::{ConversationLog, Message, MessageKind, Role, TurnStatus};
    use crate::composer::{AspectRatio, Submission};

    #[test]
    fn placeholder_starts_awaiting_prompt() -> anyhow::Result<()> {
        let message = Message::assistant_placeholder(AspectRatio::Landscape16x9);
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.kind, MessageKind::Generation);
        assert_eq!(message.status, Some(TurnStatus::AwaitingPrompt));
        assert_eq!(message.aspect_ratio, Some(AspectRatio::Landscape16x9));
        DateTime::parse_from_rfc3339(&message.created_at)?;
        Ok(())
    }

    #[test]
    fn log_preserves_insertion_order_and_updates_in_place() {
        let mut log = ConversationLog::new();
        let user = log.append(Message::user(&Submission::new(
            " a cat astronaut ",
            Vec::new(),
            AspectRatio::Square,
        )));
        let assistant = log.append(Message::assistant_placeholder(AspectRatio::Square));

        assert!(log.update(assistant, |message| {
            message.status = Some(TurnStatus::Complete);
        }));
        let ids = log.messages().iter().map(|message| message.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![user, assistant]);
        assert_eq!(log.get(user).map(|m| m.content.as_str()), Some("a cat astronaut"));
        assert_eq!(
            log.get(assistant).and_then(|m| m.status),
            Some(TurnStatus::Complete)
        );
    }

    #[test]
    fn discard_removes_only_the_named_message() {
        let mut log = ConversationLog::new();
        let first = log.append(Message::assistant_placeholder(AspectRatio::Square));
        let second = log.append(Message::assistant_placeholder(AspectRatio::Square));
        assert!(log.discard(first).is_some());
        assert!(log.discard(first).is_none());
        assert!(!log.update(first, |_| {}));
        assert_eq!(log.len(), 1);
        assert!(log.get(second).is_some());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TurnStatus::Complete.is_terminal());
        assert!(TurnStatus::Errored.is_terminal());
        assert!(!TurnStatus::AwaitingImage.is_terminal());
    }
}
