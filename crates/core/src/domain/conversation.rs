use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CustomerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Customer,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self { id: MessageId::generate(), role, content: content.into(), timestamp }
    }

    pub fn customer(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Customer, content, Utc::now())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content, Utc::now())
    }
}

/// Bookkeeping carried alongside a conversation. `message_count` always
/// mirrors the retained message list; free-form facts live in `attributes`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub customer_id: CustomerId,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl ConversationMetadata {
    pub fn new(customer_id: CustomerId, created_at: DateTime<Utc>) -> Self {
        Self { customer_id, created_at, message_count: 0, attributes: BTreeMap::new() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<Message>,
    pub metadata: ConversationMetadata,
    pub last_activity_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(customer_id: CustomerId, now: DateTime<Utc>) -> Self {
        Self {
            messages: Vec::new(),
            metadata: ConversationMetadata::new(customer_id, now),
            last_activity_at: now,
        }
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.metadata.customer_id
    }

    /// Last `window` messages in chronological order.
    pub fn recent(&self, window: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(window);
        &self.messages[start..]
    }

    pub fn is_idle_longer_than(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_activity_at) > timeout
    }
}

/// Result of looking a customer up; a missing conversation is a distinct
/// case rather than an empty record.
#[derive(Clone, Debug, PartialEq)]
pub enum ConversationLookup {
    Found(Conversation),
    NotFound,
}

impl ConversationLookup {
    pub fn found(self) -> Option<Conversation> {
        match self {
            Self::Found(conversation) => Some(conversation),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn messages(&self) -> &[Message] {
        match self {
            Self::Found(conversation) => &conversation.messages,
            Self::NotFound => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Conversation, ConversationLookup, CustomerId, Message, MessageRole};

    #[test]
    fn recent_returns_tail_in_order() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().unwrap_or_else(Utc::now);
        let mut conversation = Conversation::new(CustomerId::from("+15550001111"), now);
        for index in 0..5 {
            conversation.messages.push(Message::new(
                MessageRole::Customer,
                format!("message {index}"),
                now + Duration::seconds(index),
            ));
        }

        let recent = conversation.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "message 3");
        assert_eq!(recent[1].content, "message 4");
        assert_eq!(conversation.recent(50).len(), 5);
    }

    #[test]
    fn idle_check_is_strictly_greater_than_timeout() {
        let now = Utc::now();
        let conversation = Conversation::new(CustomerId::from("+15550001111"), now);

        assert!(!conversation.is_idle_longer_than(now + Duration::hours(24), Duration::hours(24)));
        assert!(conversation.is_idle_longer_than(
            now + Duration::hours(24) + Duration::seconds(1),
            Duration::hours(24)
        ));
    }

    #[test]
    fn not_found_lookup_has_no_messages() {
        let lookup = ConversationLookup::NotFound;
        assert!(!lookup.is_found());
        assert!(lookup.messages().is_empty());
        assert!(lookup.found().is_none());
    }

    #[test]
    fn role_serializes_snake_case() {
        let json = serde_json::to_string(&MessageRole::Customer).unwrap_or_default();
        assert_eq!(json, "\"customer\"");
    }
}
