//! Event chat messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProfileSummary;

/// A chat message posted in an event's chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub event_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub reply_to: Option<Uuid>,
    /// Sender was an anonymous participant when posting; fixed for the
    /// message's lifetime
    #[serde(default)]
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(event_id: Uuid, sender_id: Uuid, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            sender_id,
            content,
            reply_to: None,
            is_anonymous: false,
            created_at: Utc::now(),
        }
    }

    pub fn replying_to(mut self, message_id: Uuid) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn posted_anonymously(mut self, anonymous: bool) -> Self {
        self.is_anonymous = anonymous;
        self
    }
}

/// Sender identity as shown to a particular viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderIdentity {
    Revealed(ProfileSummary),
    Masked,
}

/// Short quote of the message being replied to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyPreview {
    pub message_id: Uuid,
    pub sender: SenderIdentity,
    pub excerpt: String,
}

/// Message with sender information for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDisplay {
    pub id: Uuid,
    pub sender: SenderIdentity,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// `None` also when the quoted message no longer exists
    pub reply_to: Option<ReplyPreview>,
}

impl MessageDisplay {
    pub fn format_timestamp(&self) -> String {
        self.timestamp.format("%H:%M").to_string()
    }
}

/// Cut `content` down to a reply excerpt of at most `max_chars` characters
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}
