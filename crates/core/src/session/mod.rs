//! Per-customer conversation memory.
//!
//! The store keeps one bounded conversation per customer identifier for the
//! lifetime of the process. Expiry only happens through an explicit sweep,
//! so a conversation past its timeout stays readable until the next sweep.

pub mod backup;
pub mod store;

use chrono::Duration;

pub use backup::{ConversationRecord, RecordMessage};
pub use store::{SearchHit, SessionStats, SessionStore};

pub const DEFAULT_MAX_HISTORY: usize = 10;
pub const DEFAULT_TIMEOUT_HOURS: i64 = 24;
pub const DEFAULT_CONTEXT_WINDOW: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Messages retained per conversation; older ones slide out first.
    pub max_history: usize,
    /// Inactivity after which a sweep removes the conversation.
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_history: DEFAULT_MAX_HISTORY, timeout: Duration::hours(DEFAULT_TIMEOUT_HOURS) }
    }
}

impl SessionConfig {
    pub fn new(max_history: usize, timeout: Duration) -> Self {
        Self { max_history, timeout }
    }
}
