use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::backup::ConversationRecord;
use super::SessionConfig;
use crate::domain::conversation::{
    Conversation, ConversationLookup, CustomerId, Message, MessageRole,
};
use crate::redact::redact_phone;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    pub customer_id: CustomerId,
    pub matching_messages: Vec<Message>,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionStats {
    pub active_conversations: usize,
    pub total_messages: usize,
    pub average_messages_per_conversation: f64,
    pub oldest_created_at: Option<DateTime<Utc>>,
    pub newest_activity: Option<DateTime<Utc>>,
}

/// In-memory conversation table.
///
/// All operations hold the table lock for a short, non-suspending critical
/// section, so the two appends of a turn are never interleaved with another
/// writer.
pub struct SessionStore {
    config: SessionConfig,
    conversations: Mutex<BTreeMap<String, Conversation>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self { config, conversations: Mutex::new(BTreeMap::new()) }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn table(&self) -> MutexGuard<'_, BTreeMap<String, Conversation>> {
        match self.conversations.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn record_turn(
        &self,
        customer_id: &str,
        customer_text: &str,
        assistant_text: &str,
    ) -> Conversation {
        self.record_turn_at(customer_id, customer_text, assistant_text, Utc::now())
    }

    /// Appends a customer message and the assistant reply as one unit, then
    /// trims the conversation back to `max_history`.
    pub fn record_turn_at(
        &self,
        customer_id: &str,
        customer_text: &str,
        assistant_text: &str,
        now: DateTime<Utc>,
    ) -> Conversation {
        let max_history = self.config.max_history;
        let mut table = self.table();
        let conversation = table
            .entry(customer_id.to_string())
            .or_insert_with(|| Conversation::new(CustomerId::from(customer_id), now));

        conversation.messages.push(Message::new(MessageRole::Customer, customer_text, now));
        conversation.messages.push(Message::new(MessageRole::Assistant, assistant_text, now));

        let excess = conversation.messages.len().saturating_sub(max_history);
        conversation.messages.drain(..excess);

        conversation.metadata.message_count = conversation.messages.len();
        conversation.last_activity_at = now;

        debug!(
            event_name = "session.turn_recorded",
            customer = %redact_phone(customer_id),
            message_count = conversation.metadata.message_count,
            trimmed = excess,
            "conversation turn recorded"
        );

        conversation.clone()
    }

    pub fn get_context(&self, customer_id: &str, window_size: usize) -> Vec<Message> {
        self.table()
            .get(customer_id)
            .map(|conversation| conversation.recent(window_size).to_vec())
            .unwrap_or_default()
    }

    pub fn get_conversation(&self, customer_id: &str) -> ConversationLookup {
        match self.table().get(customer_id) {
            Some(conversation) => ConversationLookup::Found(conversation.clone()),
            None => ConversationLookup::NotFound,
        }
    }

    pub fn update_metadata(
        &self,
        customer_id: &str,
        attributes: BTreeMap<String, serde_json::Value>,
    ) -> bool {
        self.update_metadata_at(customer_id, attributes, Utc::now())
    }

    /// Merges `attributes` into an existing conversation. Returns `false`
    /// without creating anything when the customer has no conversation.
    pub fn update_metadata_at(
        &self,
        customer_id: &str,
        attributes: BTreeMap<String, serde_json::Value>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut table = self.table();
        let Some(conversation) = table.get_mut(customer_id) else {
            return false;
        };

        conversation.metadata.attributes.extend(attributes);
        conversation.last_activity_at = now;
        true
    }

    /// Removes every conversation idle for strictly longer than `timeout`.
    pub fn sweep_expired(&self, now: DateTime<Utc>, timeout: Duration) -> usize {
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, conversation| !conversation.is_idle_longer_than(now, timeout));
        let removed = before - table.len();

        info!(
            event_name = "session.sweep_completed",
            removed,
            remaining = table.len(),
            "expired conversations swept"
        );

        removed
    }

    pub fn sweep_expired_now(&self) -> usize {
        self.sweep_expired(Utc::now(), self.config.timeout)
    }

    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let needle = query.to_lowercase();
        self.table()
            .values()
            .filter_map(|conversation| {
                let matching_messages = conversation
                    .messages
                    .iter()
                    .filter(|message| message.content.to_lowercase().contains(&needle))
                    .cloned()
                    .collect::<Vec<_>>();

                (!matching_messages.is_empty()).then(|| SearchHit {
                    customer_id: conversation.metadata.customer_id.clone(),
                    matching_messages,
                    last_activity_at: conversation.last_activity_at,
                })
            })
            .collect()
    }

    pub fn stats(&self) -> SessionStats {
        let table = self.table();
        let active_conversations = table.len();
        let total_messages =
            table.values().map(|conversation| conversation.messages.len()).sum::<usize>();
        let average_messages_per_conversation = if active_conversations > 0 {
            total_messages as f64 / active_conversations as f64
        } else {
            0.0
        };

        SessionStats {
            active_conversations,
            total_messages,
            average_messages_per_conversation,
            oldest_created_at: table
                .values()
                .map(|conversation| conversation.metadata.created_at)
                .min(),
            newest_activity: table.values().map(|conversation| conversation.last_activity_at).max(),
        }
    }

    pub fn export_all(&self) -> Vec<ConversationRecord> {
        self.table().values().map(ConversationRecord::from_conversation).collect()
    }

    pub fn import_all(&self, records: Vec<ConversationRecord>) -> usize {
        self.import_all_at(records, Utc::now())
    }

    /// Restores conversations from a backup, replacing any resident
    /// conversation with the same customer id.
    pub fn import_all_at(&self, records: Vec<ConversationRecord>, now: DateTime<Utc>) -> usize {
        let max_history = self.config.max_history;
        let mut table = self.table();
        let mut imported = 0;

        for record in records {
            let conversation = record.into_conversation(now, max_history);
            table.insert(conversation.metadata.customer_id.0.clone(), conversation);
            imported += 1;
        }

        info!(
            event_name = "session.import_completed",
            imported,
            resident = table.len(),
            "conversations imported from backup"
        );

        imported
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}
