use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{
    Conversation, ConversationMetadata, CustomerId, Message, MessageId, MessageRole,
};

/// Serialized form of one conversation used for backup and restore.
///
/// Every field except the customer id is optional on input so that partial
/// or hand-edited backups still import.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub messages: Vec<RecordMessage>,
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<RecordMetadata>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message_count: Option<usize>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// One backed-up message. A missing id is regenerated and a missing
/// timestamp becomes the import time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    #[serde(default)]
    pub id: Option<MessageId>,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&Message> for RecordMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: Some(message.id.clone()),
            role: message.role,
            content: message.content.clone(),
            timestamp: Some(message.timestamp),
        }
    }
}

impl RecordMessage {
    fn into_message(self, now: DateTime<Utc>) -> Message {
        Message {
            id: self.id.unwrap_or_else(MessageId::generate),
            role: self.role,
            content: self.content,
            timestamp: self.timestamp.unwrap_or(now),
        }
    }
}

impl ConversationRecord {
    pub fn from_conversation(conversation: &Conversation) -> Self {
        Self {
            customer_id: conversation.metadata.customer_id.clone(),
            messages: conversation.messages.iter().map(RecordMessage::from).collect(),
            last_activity_at: Some(conversation.last_activity_at),
            metadata: Some(RecordMetadata {
                created_at: Some(conversation.metadata.created_at),
                message_count: Some(conversation.metadata.message_count),
                attributes: conversation.metadata.attributes.clone(),
            }),
        }
    }

    /// Rebuilds a conversation, filling absent fields with `now` and trimming
    /// to `max_history`. The stored message count is re-derived from the
    /// messages so the count invariant holds regardless of input.
    pub fn into_conversation(self, now: DateTime<Utc>, max_history: usize) -> Conversation {
        let Self { customer_id, messages, last_activity_at, metadata } = self;

        let excess = messages.len().saturating_sub(max_history);
        let messages = messages
            .into_iter()
            .skip(excess)
            .map(|message| message.into_message(now))
            .collect::<Vec<_>>();

        let (created_at, attributes) = match metadata {
            Some(metadata) => (metadata.created_at.unwrap_or(now), metadata.attributes),
            None => (now, BTreeMap::new()),
        };

        let mut metadata = ConversationMetadata::new(customer_id, created_at);
        metadata.attributes = attributes;
        metadata.message_count = messages.len();

        Conversation { messages, metadata, last_activity_at: last_activity_at.unwrap_or(now) }
    }
}
