use serde::Serialize;
use smsdesk_core::domain::conversation::Message;
use smsdesk_core::pricing::PricingResult;
use tera::{Context, Tera};
use thiserror::Error;

const SYSTEM_PROMPT_NAME: &str = "sms_system_prompt.txt";

const SYSTEM_PROMPT: &str = r#"You are the customer service assistant for a business, replying over SMS.

Guidelines:
1. Be friendly and professional.
2. Keep replies concise, ideally under 160 characters.
3. Only state facts you were given. If you are unsure, say so and offer to connect the customer with a person.
4. Never invent prices; use the pricing facts below when they are present.

Business context: {{ business_info }}
{% if pricing %}
Pricing facts for {{ pricing.product_type }}: {{ pricing.summary }}
{% for product in pricing.samples %}- {{ product.title }}: {{ product.price }}
{% endfor %}{% endif %}
Customer message: {{ customer_message }}
{% if history %}
Previous conversation:
{% for message in history %}{{ message.role }}: {{ message.content }}
{% endfor %}{% endif %}
Reply:"#;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template error: {0}")]
    Template(String),
}

#[derive(Serialize)]
struct PricingFacts<'a> {
    product_type: &'a str,
    summary: String,
    samples: &'a [smsdesk_core::pricing::SampleProduct],
}

/// Renders the text-generation prompt for one inbound message.
#[derive(Clone, Debug)]
pub struct PromptBuilder {
    tera: Tera,
    business_info: String,
}

impl PromptBuilder {
    pub fn new(business_info: impl Into<String>) -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.add_raw_template(SYSTEM_PROMPT_NAME, SYSTEM_PROMPT)
            .map_err(|error| PromptError::Template(error.to_string()))?;
        Ok(Self { tera, business_info: business_info.into() })
    }

    pub fn business_info(&self) -> &str {
        &self.business_info
    }

    pub fn render(
        &self,
        customer_message: &str,
        history: &[Message],
        pricing: Option<&PricingResult>,
    ) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("business_info", &self.business_info);
        context.insert("customer_message", customer_message);
        context.insert("history", history);
        let facts = pricing.map(|pricing| PricingFacts {
            product_type: &pricing.product_type,
            summary: pricing.summary(),
            samples: &pricing.sample_products,
        });
        context.insert("pricing", &facts);

        self.tera
            .render(SYSTEM_PROMPT_NAME, &context)
            .map_err(|error| PromptError::Template(error.to_string()))
    }
}
