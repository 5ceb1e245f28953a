use smsdesk_core::config::{EscalationConfig, DEFAULT_ESCALATION_KEYWORDS};
use smsdesk_core::domain::conversation::{Message, MessageRole};

use crate::sentiment::{Sentiment, SentimentClassifier};

pub const DEFAULT_LENGTH_THRESHOLD: usize = 10;
pub const RECENT_SENTIMENT_WINDOW: usize = 3;
pub const NEGATIVE_MESSAGE_THRESHOLD: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscalationDecision {
    Continue,
    Keyword(String),
    LongConversation(usize),
    NegativeSentiment(usize),
}

impl EscalationDecision {
    pub fn is_escalation(&self) -> bool {
        !matches!(self, Self::Continue)
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Continue => "none",
            Self::Keyword(_) => "keyword",
            Self::LongConversation(_) => "long_conversation",
            Self::NegativeSentiment(_) => "negative_sentiment",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub keywords: Vec<String>,
    pub length_threshold: usize,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_ESCALATION_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            length_threshold: DEFAULT_LENGTH_THRESHOLD,
        }
    }
}

impl From<&EscalationConfig> for EscalationPolicy {
    fn from(config: &EscalationConfig) -> Self {
        Self { keywords: config.keywords.clone(), length_threshold: config.length_threshold }
    }
}

/// Decides whether a human should take over a conversation.
///
/// Rules are checked in order and the first hit wins: an escalation keyword
/// anywhere in the incoming message, a history of `length_threshold` or more
/// messages, or at least two negative customer messages among the last three
/// history entries.
#[derive(Clone, Debug, Default)]
pub struct EscalationAdvisor {
    policy: EscalationPolicy,
    classifier: SentimentClassifier,
}

impl EscalationAdvisor {
    pub fn new(policy: EscalationPolicy, classifier: SentimentClassifier) -> Self {
        let keywords = policy.keywords.iter().map(|keyword| keyword.to_lowercase()).collect();
        Self { policy: EscalationPolicy { keywords, ..policy }, classifier }
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    pub fn should_escalate(&self, message: &str, history: &[Message]) -> bool {
        self.evaluate(message, history).is_escalation()
    }

    pub fn evaluate(&self, message: &str, history: &[Message]) -> EscalationDecision {
        let lowered = message.to_lowercase();
        if let Some(keyword) = self.policy.keywords.iter().find(|keyword| lowered.contains(*keyword))
        {
            return EscalationDecision::Keyword(keyword.clone());
        }

        if history.len() >= self.policy.length_threshold {
            return EscalationDecision::LongConversation(history.len());
        }

        let recent_start = history.len().saturating_sub(RECENT_SENTIMENT_WINDOW);
        let negative_count = history[recent_start..]
            .iter()
            .filter(|message| message.role == MessageRole::Customer)
            .filter(|message| self.classifier.classify(&message.content) == Sentiment::Negative)
            .count();
        if negative_count >= NEGATIVE_MESSAGE_THRESHOLD {
            return EscalationDecision::NegativeSentiment(negative_count);
        }

        EscalationDecision::Continue
    }
}
