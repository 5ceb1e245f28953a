//! Conversation brain of the SMS desk.
//!
//! For each inbound message the runtime:
//! 1. **Escalation** (`escalation`) - keyword, length and sentiment rules
//!    decide whether a human takes over.
//! 2. **Pricing** (`pricing_intent`) - price questions about known products
//!    pull cached storefront facts.
//! 3. **Generation** (`prompt`, `llm`) - a templated prompt goes to the
//!    text-generation backend.
//! 4. **Reply cleanup** (`reply`) - output is flattened to one SMS.
//!
//! The model only phrases replies. Escalation and prices are decided by
//! deterministic code before the model is called.

pub mod escalation;
pub mod llm;
pub mod pricing_intent;
pub mod prompt;
pub mod reply;
pub mod runtime;
pub mod sentiment;

pub use escalation::{EscalationAdvisor, EscalationDecision, EscalationPolicy};
pub use llm::{LlmClient, UnconfiguredLlm};
pub use prompt::{PromptBuilder, PromptError};
pub use reply::{fallback_reply, ReplyFilter, ESCALATION_REPLY};
pub use runtime::{AgentRuntime, TurnOutcome};
pub use sentiment::{Sentiment, SentimentClassifier, SentimentLexicon};
