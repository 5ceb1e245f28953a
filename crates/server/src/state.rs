use std::sync::Arc;

use smsdesk_agent::runtime::AgentRuntime;
use smsdesk_core::session::SessionStore;
use smsdesk_sms::{RetryPolicy, SignatureValidator, SmsSender};

use crate::auth::ApiToken;
use crate::rate_limit::RateLimiter;

/// Shared handles for every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
    pub sessions: Arc<SessionStore>,
    pub sender: Arc<dyn SmsSender>,
    pub retry: RetryPolicy,
    /// `None` disables webhook signature checks.
    pub signatures: Option<SignatureValidator>,
    pub public_base_url: Option<String>,
    /// `None` leaves the conversation API unmounted.
    pub api_token: Option<ApiToken>,
    /// `None` disables request rate limiting.
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub service: ServiceInfo,
}

/// Static facts reported by `/status`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceInfo {
    pub port: u16,
    pub environment: String,
    pub sms_configured: bool,
    pub llm_configured: bool,
}
