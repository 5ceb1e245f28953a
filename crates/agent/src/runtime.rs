use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use smsdesk_core::pricing::{PricingCache, PricingResult, ProductCatalog};
use smsdesk_core::redact::redact_phone;
use smsdesk_core::session::{SessionStore, DEFAULT_CONTEXT_WINDOW};
use tracing::{info, warn};

use crate::escalation::{EscalationAdvisor, EscalationDecision};
use crate::llm::LlmClient;
use crate::pricing_intent::detect_pricing_question;
use crate::prompt::PromptBuilder;
use crate::reply::{fallback_reply, ReplyFilter, ESCALATION_REPLY};

/// What happened while handling one inbound message.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub reply: String,
    pub escalation: EscalationDecision,
    pub pricing: Option<PricingResult>,
    pub used_fallback: bool,
}

/// Drives one inbound SMS through escalation, optional pricing lookup,
/// text generation and reply cleanup, then records the turn.
///
/// Handling never fails: a collaborator error degrades to a canned reply.
pub struct AgentRuntime {
    sessions: Arc<SessionStore>,
    pricing: Arc<PricingCache>,
    catalog: Arc<dyn ProductCatalog>,
    llm: Arc<dyn LlmClient>,
    prompts: PromptBuilder,
    advisor: EscalationAdvisor,
    filter: ReplyFilter,
    context_window: usize,
}

impl AgentRuntime {
    pub fn new(
        sessions: Arc<SessionStore>,
        pricing: Arc<PricingCache>,
        catalog: Arc<dyn ProductCatalog>,
        llm: Arc<dyn LlmClient>,
        prompts: PromptBuilder,
    ) -> Self {
        Self {
            sessions,
            pricing,
            catalog,
            llm,
            prompts,
            advisor: EscalationAdvisor::default(),
            filter: ReplyFilter::default(),
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    pub fn with_advisor(mut self, advisor: EscalationAdvisor) -> Self {
        self.advisor = advisor;
        self
    }

    pub fn with_filter(mut self, filter: ReplyFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window.max(1);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn handle_inbound(&self, customer_id: &str, text: &str) -> TurnOutcome {
        let lookup = self.sessions.get_conversation(customer_id);
        let escalation = self.advisor.evaluate(text, lookup.messages());

        if escalation.is_escalation() {
            return self.escalate(customer_id, text, escalation);
        }

        let pricing = self.lookup_pricing(text).await;
        let context = self.sessions.get_context(customer_id, self.context_window);

        let generated = match self.prompts.render(text, &context, pricing.as_ref()) {
            Ok(prompt) => match self.llm.complete(&prompt).await {
                Ok(raw) => Some(self.filter.apply(&raw)).filter(|reply| !reply.is_empty()),
                Err(error) => {
                    warn!(
                        event_name = "agent.generation_failed",
                        customer = %redact_phone(customer_id),
                        error = %error,
                        "text generation failed; sending fallback reply"
                    );
                    None
                }
            },
            Err(error) => {
                warn!(
                    event_name = "agent.prompt_failed",
                    error = %error,
                    "prompt rendering failed; sending fallback reply"
                );
                None
            }
        };

        let used_fallback = generated.is_none();
        let reply = generated.unwrap_or_else(|| fallback_reply().to_string());
        self.sessions.record_turn(customer_id, text, &reply);

        TurnOutcome { reply, escalation, pricing, used_fallback }
    }

    fn escalate(&self, customer_id: &str, text: &str, escalation: EscalationDecision) -> TurnOutcome {
        self.sessions.record_turn(customer_id, text, ESCALATION_REPLY);

        let mut attributes = BTreeMap::new();
        attributes.insert("escalated".to_string(), Value::Bool(true));
        attributes
            .insert("escalation_reason".to_string(), Value::from(escalation.reason_code()));
        if let EscalationDecision::Keyword(keyword) = &escalation {
            attributes.insert("escalation_keyword".to_string(), Value::from(keyword.as_str()));
        }
        self.sessions.update_metadata(customer_id, attributes);

        info!(
            event_name = "agent.escalated",
            customer = %redact_phone(customer_id),
            reason = escalation.reason_code(),
            "conversation handed to a human"
        );

        TurnOutcome {
            reply: ESCALATION_REPLY.to_string(),
            escalation,
            pricing: None,
            used_fallback: false,
        }
    }

    async fn lookup_pricing(&self, text: &str) -> Option<PricingResult> {
        let product_type = detect_pricing_question(text)?;
        match self.pricing.get(&product_type, self.catalog.as_ref()).await {
            Ok(result) => Some(result),
            Err(error) => {
                warn!(
                    event_name = "agent.pricing_unavailable",
                    product_type = %product_type,
                    error = %error,
                    "continuing without pricing facts"
                );
                None
            }
        }
    }
}
