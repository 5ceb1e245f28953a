use std::sync::Arc;

use axum::{middleware, Router};
use secrecy::SecretString;
use smsdesk_agent::{
    escalation::{EscalationAdvisor, EscalationPolicy},
    llm::{LlmClient, UnconfiguredLlm},
    prompt::{PromptBuilder, PromptError},
    runtime::AgentRuntime,
    sentiment::SentimentClassifier,
};
use smsdesk_core::config::AppConfig;
use smsdesk_core::errors::PricingError;
use smsdesk_core::pricing::{PricingCache, ProductCatalog, SynonymCatalog};
use smsdesk_core::session::SessionStore;
use smsdesk_sms::{DeliveryError, NoopSender, RetryPolicy, SignatureValidator, SmsSender};
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::ApiToken;
use crate::gemini::GeminiClient;
use crate::rate_limit::{limit_requests, RateLimiter};
use crate::state::{AppState, ServiceInfo};
use crate::storefront::StorefrontSearch;
use crate::twilio::TwilioSender;
use crate::{api, health, webhook};

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("prompt template failed to compile: {0}")]
    Prompt(#[from] PromptError),
    #[error("storefront client could not be built: {0}")]
    Storefront(#[source] PricingError),
    #[error("sms client could not be built: {0}")]
    Sms(#[source] DeliveryError),
    #[error("text-generation client could not be built: {0}")]
    Llm(String),
}

/// Wires the session store, pricing cache, agent and carrier clients from
/// an already loaded configuration.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let sessions = Arc::new(SessionStore::new(config.conversation.session_config()));
    let pricing =
        Arc::new(PricingCache::new(chrono::Duration::seconds(config.pricing.cache_ttl_secs)));

    let search = StorefrontSearch::new(&config.pricing).map_err(BootstrapError::Storefront)?;
    let catalog: Arc<dyn ProductCatalog> =
        Arc::new(SynonymCatalog::with_default_synonyms(Arc::new(search)));

    let llm = build_llm(&config)?;
    let prompts = PromptBuilder::new(config.business.info.clone())?;
    let advisor = EscalationAdvisor::new(
        EscalationPolicy::from(&config.escalation),
        SentimentClassifier::default(),
    );
    let runtime = AgentRuntime::new(sessions.clone(), pricing, catalog, llm, prompts)
        .with_advisor(advisor)
        .with_context_window(config.conversation.context_window);

    let sender = build_sender(&config)?;
    let signatures = build_signature_validator(&config);
    let api_token = build_api_token(&config);
    let rate_limiter = RateLimiter::from_config(&config.server.rate_limit).map(Arc::new);

    let state = AppState {
        runtime: Arc::new(runtime),
        sessions,
        sender,
        retry: RetryPolicy::default(),
        signatures,
        public_base_url: config.sms.public_base_url.clone(),
        api_token,
        rate_limiter,
        service: ServiceInfo {
            port: config.server.port,
            environment: config.business.environment.clone(),
            sms_configured: config.sms.is_configured(),
            llm_configured: config.llm.is_configured(),
        },
    };

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        sms_configured = state.service.sms_configured,
        llm_configured = state.service.llm_configured,
        signature_checks = state.signatures.is_some(),
        api_enabled = state.api_token.is_some(),
        rate_limited = state.rate_limiter.is_some(),
        "application bootstrap complete"
    );

    Ok(Application { config, state })
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new().merge(webhook::router()).merge(health::router());
    if let Some(token) = state.api_token.clone() {
        app = app.merge(api::router(token));
    }
    if let Some(limiter) = state.rate_limiter.clone() {
        app = app.layer(middleware::from_fn_with_state(limiter, limit_requests));
    }
    app.with_state(state)
}

fn build_llm(config: &AppConfig) -> Result<Arc<dyn LlmClient>, BootstrapError> {
    match config.llm.api_key.clone().filter(|_| config.llm.is_configured()) {
        Some(api_key) => {
            let client = GeminiClient::new(&config.llm, api_key)
                .map_err(|error| BootstrapError::Llm(error.to_string()))?;
            info!(
                event_name = "system.bootstrap.llm_configured",
                correlation_id = "bootstrap",
                endpoint = %client.endpoint(),
                "text generation enabled"
            );
            Ok(Arc::new(client))
        }
        None => {
            warn!(
                event_name = "system.bootstrap.llm_missing",
                correlation_id = "bootstrap",
                "llm.api_key is not set; every reply will be a canned fallback"
            );
            Ok(Arc::new(UnconfiguredLlm))
        }
    }
}

fn build_sender(config: &AppConfig) -> Result<Arc<dyn SmsSender>, BootstrapError> {
    match TwilioSender::from_config(&config.sms).map_err(BootstrapError::Sms)? {
        Some(sender) => Ok(Arc::new(sender)),
        None => {
            warn!(
                event_name = "system.bootstrap.sms_missing",
                correlation_id = "bootstrap",
                "sms credentials are incomplete; replies will be logged, not sent"
            );
            Ok(Arc::new(NoopSender))
        }
    }
}

fn build_api_token(config: &AppConfig) -> Option<ApiToken> {
    if !config.server.api_enabled() {
        warn!(
            event_name = "system.bootstrap.api_disabled",
            correlation_id = "bootstrap",
            "server.api_token is not set; conversation api is not mounted"
        );
        return None;
    }
    config.server.api_token.clone().map(ApiToken::new)
}

/// With checks enabled and no auth token, every webhook is rejected.
fn build_signature_validator(config: &AppConfig) -> Option<SignatureValidator> {
    if !config.sms.validate_signatures {
        warn!(
            event_name = "system.bootstrap.signature_checks_disabled",
            correlation_id = "bootstrap",
            "webhook signature validation is disabled"
        );
        return None;
    }

    let token = config.sms.auth_token.clone().unwrap_or_else(|| SecretString::from(String::new()));
    Some(SignatureValidator::new(token))
}
