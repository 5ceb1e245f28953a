use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use smsdesk_agent::{llm::LlmClient, prompt::PromptBuilder, runtime::AgentRuntime};
use smsdesk_core::errors::PricingError;
use smsdesk_core::pricing::{PricingCache, ProductCatalog, ProductListing};
use smsdesk_core::session::SessionStore;
use smsdesk_sms::{DeliveryError, DeliveryReceipt, RetryPolicy, SignatureValidator, SmsSender};
use tokio::sync::Mutex;

use crate::auth::ApiToken;
use crate::rate_limit::RateLimiter;
use crate::state::{AppState, ServiceInfo};

pub const AUTH_TOKEN: &str = "test-auth-token";
pub const API_TOKEN: &str = "test-api-token";
pub const PUBLIC_BASE_URL: &str = "https://bot.example.com";

pub struct ScriptedLlm {
    reply: Option<String>,
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.reply.clone().ok_or_else(|| anyhow!("model unavailable"))
    }
}

#[derive(Default)]
pub struct EmptyCatalog;

#[async_trait]
impl ProductCatalog for EmptyCatalog {
    async fn lookup(&self, _product_type: &str) -> Result<Vec<ProductListing>, PricingError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail_with: Option<DeliveryError>,
}

#[async_trait]
impl SmsSender for RecordingSender {
    async fn send(&self, to: &str, body: &str) -> Result<DeliveryReceipt, DeliveryError> {
        self.sent.lock().await.push((to.to_string(), body.to_string()));
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(DeliveryReceipt { sid: "SM-out".to_string(), status: "queued".to_string() }),
        }
    }
}

pub struct TestApp {
    pub state: AppState,
    pub sender: Arc<RecordingSender>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(Some("Thanks for reaching out!"), RecordingSender::default(), false)
    }

    pub fn with_signatures() -> Self {
        Self::build(Some("Thanks for reaching out!"), RecordingSender::default(), true)
    }

    pub fn without_api_token() -> Self {
        let mut app = Self::new();
        app.state.api_token = None;
        app
    }

    pub fn with_rate_limit(max_requests: u32) -> Self {
        let mut app = Self::new();
        app.state.rate_limiter =
            Some(Arc::new(RateLimiter::new(max_requests, Duration::from_secs(900))));
        app
    }

    pub fn with_failing_sender() -> Self {
        let sender = RecordingSender {
            fail_with: Some(DeliveryError::Rejected {
                status: 400,
                message: "invalid To number".to_string(),
            }),
            ..RecordingSender::default()
        };
        Self::build(Some("ok"), sender, false)
    }

    fn build(reply: Option<&str>, sender: RecordingSender, validate: bool) -> Self {
        let sessions = Arc::new(SessionStore::default());
        let prompts = PromptBuilder::new("Custom print shop").expect("prompt template");
        let runtime = AgentRuntime::new(
            sessions.clone(),
            Arc::new(PricingCache::default()),
            Arc::new(EmptyCatalog),
            Arc::new(ScriptedLlm { reply: reply.map(str::to_string) }),
            prompts,
        );
        let sender = Arc::new(sender);

        let state = AppState {
            runtime: Arc::new(runtime),
            sessions,
            sender: sender.clone(),
            retry: RetryPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 },
            signatures: validate
                .then(|| SignatureValidator::new(SecretString::from(AUTH_TOKEN.to_string()))),
            public_base_url: Some(PUBLIC_BASE_URL.to_string()),
            api_token: Some(ApiToken::new(SecretString::from(API_TOKEN.to_string()))),
            rate_limiter: None,
            service: ServiceInfo {
                port: 3000,
                environment: "test".to_string(),
                sms_configured: false,
                llm_configured: false,
            },
        };

        Self { state, sender }
    }
}
