use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionConfig;

pub const DEFAULT_CONFIG_FILE: &str = "smsdesk.toml";

pub const DEFAULT_ESCALATION_KEYWORDS: &[&str] = &[
    "speak to someone",
    "talk to human",
    "real person",
    "agent",
    "representative",
    "manager",
    "supervisor",
    "complaint",
    "refund",
    "cancel",
    "billing issue",
    "technical problem",
    "emergency",
    "urgent",
];

/// Environment variables consulted for each config key, highest priority
/// first. The unprefixed names are accepted for existing deployments.
pub const ENV_BINDINGS: &[(&str, &[&str])] = &[
    ("sms.account_sid", &["SMSDESK_SMS_ACCOUNT_SID", "TWILIO_ACCOUNT_SID"]),
    ("sms.auth_token", &["SMSDESK_SMS_AUTH_TOKEN", "TWILIO_AUTH_TOKEN"]),
    ("sms.from_number", &["SMSDESK_SMS_FROM_NUMBER", "TWILIO_PHONE_NUMBER"]),
    ("sms.validate_signatures", &["SMSDESK_SMS_VALIDATE_SIGNATURES"]),
    ("sms.public_base_url", &["SMSDESK_SMS_PUBLIC_BASE_URL"]),
    ("llm.api_key", &["SMSDESK_LLM_API_KEY", "GEMINI_API_KEY"]),
    ("llm.model", &["SMSDESK_LLM_MODEL"]),
    ("llm.base_url", &["SMSDESK_LLM_BASE_URL"]),
    ("llm.timeout_secs", &["SMSDESK_LLM_TIMEOUT_SECS"]),
    ("conversation.max_history", &["SMSDESK_CONVERSATION_MAX_HISTORY", "MAX_CONVERSATION_HISTORY"]),
    (
        "conversation.timeout_hours",
        &["SMSDESK_CONVERSATION_TIMEOUT_HOURS", "CONVERSATION_TIMEOUT_HOURS"],
    ),
    ("conversation.context_window", &["SMSDESK_CONVERSATION_CONTEXT_WINDOW"]),
    ("conversation.sweep_interval_secs", &["SMSDESK_CONVERSATION_SWEEP_INTERVAL_SECS"]),
    ("escalation.keywords", &["SMSDESK_ESCALATION_KEYWORDS"]),
    ("escalation.length_threshold", &["SMSDESK_ESCALATION_LENGTH_THRESHOLD"]),
    ("pricing.storefront_url", &["SMSDESK_PRICING_STOREFRONT_URL"]),
    ("pricing.cache_ttl_secs", &["SMSDESK_PRICING_CACHE_TTL_SECS"]),
    ("pricing.search_timeout_secs", &["SMSDESK_PRICING_SEARCH_TIMEOUT_SECS"]),
    ("pricing.max_results", &["SMSDESK_PRICING_MAX_RESULTS"]),
    ("business.info", &["SMSDESK_BUSINESS_INFO"]),
    ("business.environment", &["SMSDESK_BUSINESS_ENVIRONMENT", "NODE_ENV"]),
    ("server.bind_address", &["SMSDESK_SERVER_BIND_ADDRESS"]),
    ("server.port", &["SMSDESK_SERVER_PORT", "PORT"]),
    ("server.graceful_shutdown_secs", &["SMSDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
    ("server.api_token", &["SMSDESK_SERVER_API_TOKEN"]),
    ("server.rate_limit.enabled", &["SMSDESK_SERVER_RATE_LIMIT_ENABLED"]),
    ("server.rate_limit.max_requests", &["SMSDESK_SERVER_RATE_LIMIT_MAX_REQUESTS"]),
    ("server.rate_limit.window_secs", &["SMSDESK_SERVER_RATE_LIMIT_WINDOW_SECS"]),
    (
        "server.rate_limit.trust_forwarded_for",
        &["SMSDESK_SERVER_RATE_LIMIT_TRUST_FORWARDED_FOR"],
    ),
    ("logging.level", &["SMSDESK_LOGGING_LEVEL", "SMSDESK_LOG_LEVEL"]),
    ("logging.format", &["SMSDESK_LOGGING_FORMAT", "SMSDESK_LOG_FORMAT"]),
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub sms: SmsConfig,
    pub llm: LlmConfig,
    pub conversation: ConversationConfig,
    pub escalation: EscalationConfig,
    pub pricing: PricingConfig,
    pub business: BusinessConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SmsConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<SecretString>,
    pub from_number: Option<String>,
    pub validate_signatures: bool,
    /// Externally visible origin used when recomputing webhook signatures,
    /// e.g. `https://bot.example.com`. Falls back to the request `Host`.
    pub public_base_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub max_history: usize,
    pub timeout_hours: i64,
    pub context_window: usize,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EscalationConfig {
    pub keywords: Vec<String>,
    pub length_threshold: usize,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub storefront_url: String,
    pub cache_ttl_secs: i64,
    pub search_timeout_secs: u64,
    pub max_results: usize,
}

#[derive(Clone, Debug)]
pub struct BusinessConfig {
    pub info: String,
    pub environment: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    /// Bearer token for `/api/v1`. The conversation API is not mounted
    /// without one.
    pub api_token: Option<SecretString>,
    pub rate_limit: RateLimitConfig,
}

/// Fixed-window request limit applied per client address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_secs: u64,
    /// Key clients by the first `X-Forwarded-For` hop instead of the socket
    /// peer. Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub llm_model: Option<String>,
    pub storefront_url: Option<String>,
    pub validate_signatures: Option<bool>,
    pub max_history: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sms: SmsConfig {
                account_sid: None,
                auth_token: None,
                from_number: None,
                validate_signatures: true,
                public_base_url: None,
            },
            llm: LlmConfig {
                api_key: None,
                model: "gemini-1.5-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                timeout_secs: 30,
            },
            conversation: ConversationConfig {
                max_history: 10,
                timeout_hours: 24,
                context_window: 6,
                sweep_interval_secs: 3600,
            },
            escalation: EscalationConfig {
                keywords: DEFAULT_ESCALATION_KEYWORDS.iter().map(|k| k.to_string()).collect(),
                length_threshold: 10,
            },
            pricing: PricingConfig {
                storefront_url: "https://thecustomhub.com".to_string(),
                cache_ttl_secs: 300,
                search_timeout_secs: 10,
                max_results: 5,
            },
            business: BusinessConfig {
                info: "General customer service".to_string(),
                environment: "development".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
                api_token: None,
                rate_limit: RateLimitConfig {
                    enabled: true,
                    max_requests: 100,
                    window_secs: 900,
                    trust_forwarded_for: false,
                },
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl SmsConfig {
    /// Outbound delivery needs the account, the token and a sender number.
    pub fn is_configured(&self) -> bool {
        let has_token =
            self.auth_token.as_ref().is_some_and(|token| !token.expose_secret().trim().is_empty());
        self.account_sid.is_some() && has_token && self.from_number.is_some()
    }
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

impl ServerConfig {
    pub fn api_enabled(&self) -> bool {
        self.api_token.as_ref().is_some_and(|token| !token.expose_secret().trim().is_empty())
    }
}

impl ConversationConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.max_history, Duration::hours(self.timeout_hours))
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = discover_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(sms) = patch.sms {
            if let Some(account_sid) = sms.account_sid {
                self.sms.account_sid = Some(account_sid);
            }
            if let Some(auth_token) = sms.auth_token {
                self.sms.auth_token = Some(secret_value(auth_token));
            }
            if let Some(from_number) = sms.from_number {
                self.sms.from_number = Some(from_number);
            }
            if let Some(validate_signatures) = sms.validate_signatures {
                self.sms.validate_signatures = validate_signatures;
            }
            if let Some(public_base_url) = sms.public_base_url {
                self.sms.public_base_url = Some(public_base_url);
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(max_history) = conversation.max_history {
                self.conversation.max_history = max_history;
            }
            if let Some(timeout_hours) = conversation.timeout_hours {
                self.conversation.timeout_hours = timeout_hours;
            }
            if let Some(context_window) = conversation.context_window {
                self.conversation.context_window = context_window;
            }
            if let Some(sweep_interval_secs) = conversation.sweep_interval_secs {
                self.conversation.sweep_interval_secs = sweep_interval_secs;
            }
        }

        if let Some(escalation) = patch.escalation {
            if let Some(keywords) = escalation.keywords {
                self.escalation.keywords = keywords;
            }
            if let Some(length_threshold) = escalation.length_threshold {
                self.escalation.length_threshold = length_threshold;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(storefront_url) = pricing.storefront_url {
                self.pricing.storefront_url = storefront_url;
            }
            if let Some(cache_ttl_secs) = pricing.cache_ttl_secs {
                self.pricing.cache_ttl_secs = cache_ttl_secs;
            }
            if let Some(search_timeout_secs) = pricing.search_timeout_secs {
                self.pricing.search_timeout_secs = search_timeout_secs;
            }
            if let Some(max_results) = pricing.max_results {
                self.pricing.max_results = max_results;
            }
        }

        if let Some(business) = patch.business {
            if let Some(info) = business.info {
                self.business.info = info;
            }
            if let Some(environment) = business.environment {
                self.business.environment = environment;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(api_token) = server.api_token {
                self.server.api_token = Some(secret_value(api_token));
            }
            if let Some(rate_limit) = server.rate_limit {
                let target = &mut self.server.rate_limit;
                if let Some(enabled) = rate_limit.enabled {
                    target.enabled = enabled;
                }
                if let Some(max_requests) = rate_limit.max_requests {
                    target.max_requests = max_requests;
                }
                if let Some(window_secs) = rate_limit.window_secs {
                    target.window_secs = window_secs;
                }
                if let Some(trust_forwarded_for) = rate_limit.trust_forwarded_for {
                    target.trust_forwarded_for = trust_forwarded_for;
                }
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = env_value("sms.account_sid") {
            self.sms.account_sid = Some(value);
        }
        if let Some(value) = env_value("sms.auth_token") {
            self.sms.auth_token = Some(secret_value(value));
        }
        if let Some(value) = env_value("sms.from_number") {
            self.sms.from_number = Some(value);
        }
        if let Some(value) = env_value("sms.validate_signatures") {
            self.sms.validate_signatures = parse_env("sms.validate_signatures", &value)?;
        }
        if let Some(value) = env_value("sms.public_base_url") {
            self.sms.public_base_url = Some(value);
        }

        if let Some(value) = env_value("llm.api_key") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = env_value("llm.model") {
            self.llm.model = value;
        }
        if let Some(value) = env_value("llm.base_url") {
            self.llm.base_url = value;
        }
        if let Some(value) = env_value("llm.timeout_secs") {
            self.llm.timeout_secs = parse_env("llm.timeout_secs", &value)?;
        }

        if let Some(value) = env_value("conversation.max_history") {
            self.conversation.max_history = parse_env("conversation.max_history", &value)?;
        }
        if let Some(value) = env_value("conversation.timeout_hours") {
            self.conversation.timeout_hours = parse_env("conversation.timeout_hours", &value)?;
        }
        if let Some(value) = env_value("conversation.context_window") {
            self.conversation.context_window = parse_env("conversation.context_window", &value)?;
        }
        if let Some(value) = env_value("conversation.sweep_interval_secs") {
            self.conversation.sweep_interval_secs =
                parse_env("conversation.sweep_interval_secs", &value)?;
        }

        if let Some(value) = env_value("escalation.keywords") {
            self.escalation.keywords = value
                .split(',')
                .map(str::trim)
                .filter(|keyword| !keyword.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = env_value("escalation.length_threshold") {
            self.escalation.length_threshold = parse_env("escalation.length_threshold", &value)?;
        }

        if let Some(value) = env_value("pricing.storefront_url") {
            self.pricing.storefront_url = value;
        }
        if let Some(value) = env_value("pricing.cache_ttl_secs") {
            self.pricing.cache_ttl_secs = parse_env("pricing.cache_ttl_secs", &value)?;
        }
        if let Some(value) = env_value("pricing.search_timeout_secs") {
            self.pricing.search_timeout_secs = parse_env("pricing.search_timeout_secs", &value)?;
        }
        if let Some(value) = env_value("pricing.max_results") {
            self.pricing.max_results = parse_env("pricing.max_results", &value)?;
        }

        if let Some(value) = env_value("business.info") {
            self.business.info = value;
        }
        if let Some(value) = env_value("business.environment") {
            self.business.environment = value;
        }

        if let Some(value) = env_value("server.bind_address") {
            self.server.bind_address = value;
        }
        if let Some(value) = env_value("server.port") {
            self.server.port = parse_env("server.port", &value)?;
        }
        if let Some(value) = env_value("server.graceful_shutdown_secs") {
            self.server.graceful_shutdown_secs =
                parse_env("server.graceful_shutdown_secs", &value)?;
        }
        if let Some(value) = env_value("server.api_token") {
            self.server.api_token = Some(secret_value(value));
        }
        if let Some(value) = env_value("server.rate_limit.enabled") {
            self.server.rate_limit.enabled = parse_env("server.rate_limit.enabled", &value)?;
        }
        if let Some(value) = env_value("server.rate_limit.max_requests") {
            self.server.rate_limit.max_requests =
                parse_env("server.rate_limit.max_requests", &value)?;
        }
        if let Some(value) = env_value("server.rate_limit.window_secs") {
            self.server.rate_limit.window_secs =
                parse_env("server.rate_limit.window_secs", &value)?;
        }
        if let Some(value) = env_value("server.rate_limit.trust_forwarded_for") {
            self.server.rate_limit.trust_forwarded_for =
                parse_env("server.rate_limit.trust_forwarded_for", &value)?;
        }

        if let Some(value) = env_value("logging.level") {
            self.logging.level = value;
        }
        if let Some(value) = env_value("logging.format") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(storefront_url) = overrides.storefront_url {
            self.pricing.storefront_url = storefront_url;
        }
        if let Some(validate_signatures) = overrides.validate_signatures {
            self.sms.validate_signatures = validate_signatures;
        }
        if let Some(max_history) = overrides.max_history {
            self.conversation.max_history = max_history;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_sms(&self.sms)?;
        validate_llm(&self.llm)?;
        validate_conversation(&self.conversation)?;
        validate_escalation(&self.escalation)?;
        validate_pricing(&self.pricing)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Environment variables that may set `key_path`, in lookup order.
pub fn env_keys(key_path: &str) -> &'static [&'static str] {
    ENV_BINDINGS
        .iter()
        .find(|(path, _)| *path == key_path)
        .map(|(_, keys)| *keys)
        .unwrap_or(&[])
}

/// The config file `load` would read: the explicit path when it exists,
/// otherwise `smsdesk.toml` or `config/smsdesk.toml` in the working directory.
pub fn discover_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_sms(sms: &SmsConfig) -> Result<(), ConfigError> {
    if let Some(account_sid) = &sms.account_sid {
        if !account_sid.starts_with("AC") || account_sid.len() != 34 {
            return Err(ConfigError::Validation(
                "sms.account_sid must start with `AC` and be 34 characters long. Find it on the Twilio console dashboard".to_string(),
            ));
        }
    }

    if let Some(from_number) = &sms.from_number {
        if !is_e164(from_number) {
            return Err(ConfigError::Validation(format!(
                "sms.from_number `{from_number}` must be in E.164 format (e.g. +15551234567)"
            )));
        }
    }

    if let Some(base_url) = &sms.public_base_url {
        if !is_http_url(base_url) {
            return Err(ConfigError::Validation(
                "sms.public_base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if sms.validate_signatures && sms.account_sid.is_some() && sms.auth_token.is_none() {
        return Err(ConfigError::Validation(
            "sms.auth_token is required to validate webhook signatures (set sms.validate_signatures = false to skip)".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if conversation.max_history < 2 {
        return Err(ConfigError::Validation(
            "conversation.max_history must be at least 2 (one customer and one assistant message)"
                .to_string(),
        ));
    }

    if conversation.context_window == 0 {
        return Err(ConfigError::Validation(
            "conversation.context_window must be greater than zero".to_string(),
        ));
    }

    if conversation.timeout_hours < 1 {
        return Err(ConfigError::Validation(
            "conversation.timeout_hours must be at least 1".to_string(),
        ));
    }

    if conversation.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "conversation.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_escalation(escalation: &EscalationConfig) -> Result<(), ConfigError> {
    if escalation.keywords.iter().any(|keyword| keyword.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "escalation.keywords must not contain blank entries".to_string(),
        ));
    }

    if escalation.length_threshold == 0 {
        return Err(ConfigError::Validation(
            "escalation.length_threshold must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if !is_http_url(&pricing.storefront_url) {
        return Err(ConfigError::Validation(
            "pricing.storefront_url must start with http:// or https://".to_string(),
        ));
    }

    if pricing.cache_ttl_secs <= 0 {
        return Err(ConfigError::Validation(
            "pricing.cache_ttl_secs must be greater than zero".to_string(),
        ));
    }

    if pricing.search_timeout_secs == 0 || pricing.search_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "pricing.search_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if pricing.max_results == 0 {
        return Err(ConfigError::Validation(
            "pricing.max_results must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if server.api_token.as_ref().is_some_and(|token| token.expose_secret().trim().is_empty()) {
        return Err(ConfigError::Validation(
            "server.api_token must not be blank (remove it to disable the conversation API)"
                .to_string(),
        ));
    }

    let rate_limit = &server.rate_limit;
    if rate_limit.enabled && (rate_limit.max_requests == 0 || rate_limit.window_secs == 0) {
        return Err(ConfigError::Validation(
            "server.rate_limit.max_requests and server.rate_limit.window_secs must be greater than zero"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn is_e164(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('+') else {
        return false;
    };
    (2..=15).contains(&digits.len())
        && digits.chars().all(|ch| ch.is_ascii_digit())
        && !digits.starts_with('0')
}

fn env_value(key_path: &str) -> Option<String> {
    env_keys(key_path).iter().find_map(|key| read_env(key))
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key_path: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: env_keys(key_path).first().copied().unwrap_or(key_path).to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    sms: Option<SmsPatch>,
    llm: Option<LlmPatch>,
    conversation: Option<ConversationPatch>,
    escalation: Option<EscalationPatch>,
    pricing: Option<PricingPatch>,
    business: Option<BusinessPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SmsPatch {
    account_sid: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
    validate_signatures: Option<bool>,
    public_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    max_history: Option<usize>,
    timeout_hours: Option<i64>,
    context_window: Option<usize>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EscalationPatch {
    keywords: Option<Vec<String>>,
    length_threshold: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    storefront_url: Option<String>,
    cache_ttl_secs: Option<i64>,
    search_timeout_secs: Option<u64>,
    max_results: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct BusinessPatch {
    info: Option<String>,
    environment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    api_token: Option<String>,
    rate_limit: Option<RateLimitPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct RateLimitPatch {
    enabled: Option<bool>,
    max_requests: Option<u32>,
    window_secs: Option<u64>,
    trust_forwarded_for: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
