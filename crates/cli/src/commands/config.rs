use std::env;
use std::fs;
use std::path::Path;

use secrecy::ExposeSecret;
use smsdesk_core::config::{discover_config_path, env_keys, AppConfig, LoadOptions};
use smsdesk_core::redact::{redact_phone, redact_secret};
use toml::Value;

use super::{CommandResult, EXIT_CONFIG};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::text(EXIT_CONFIG, format!("config validation failed: {error}"))
        }
    };

    let config_file_path = discover_config_path(None);
    CommandResult::text(0, render(&config, config_file_path.as_deref()))
}

/// One `- key = value (source: ...)` line per setting. Secrets are masked.
pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value) in effective_values(config) {
        let source = field_source(key_path, config_file_doc.as_ref(), config_file_path);
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    let unset = || "<unset>".to_string();

    vec![
        ("sms.account_sid", config.sms.account_sid.as_deref().map(redact_secret).unwrap_or_else(unset)),
        (
            "sms.auth_token",
            config.sms.auth_token.as_ref().map(|_| "<redacted>".to_string()).unwrap_or_else(unset),
        ),
        ("sms.from_number", config.sms.from_number.as_deref().map(redact_phone).unwrap_or_else(unset)),
        ("sms.validate_signatures", config.sms.validate_signatures.to_string()),
        ("sms.public_base_url", config.sms.public_base_url.clone().unwrap_or_else(unset)),
        (
            "llm.api_key",
            config
                .llm
                .api_key
                .as_ref()
                .map(|key| redact_secret(key.expose_secret()))
                .unwrap_or_else(unset),
        ),
        ("llm.model", config.llm.model.clone()),
        ("llm.base_url", config.llm.base_url.clone()),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string()),
        ("conversation.max_history", config.conversation.max_history.to_string()),
        ("conversation.timeout_hours", config.conversation.timeout_hours.to_string()),
        ("conversation.context_window", config.conversation.context_window.to_string()),
        ("conversation.sweep_interval_secs", config.conversation.sweep_interval_secs.to_string()),
        ("escalation.keywords", format!("{} keywords", config.escalation.keywords.len())),
        ("escalation.length_threshold", config.escalation.length_threshold.to_string()),
        ("pricing.storefront_url", config.pricing.storefront_url.clone()),
        ("pricing.cache_ttl_secs", config.pricing.cache_ttl_secs.to_string()),
        ("pricing.search_timeout_secs", config.pricing.search_timeout_secs.to_string()),
        ("pricing.max_results", config.pricing.max_results.to_string()),
        ("business.info", config.business.info.clone()),
        ("business.environment", config.business.environment.clone()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        (
            "server.api_token",
            config.server.api_token.as_ref().map(|_| "<redacted>".to_string()).unwrap_or_else(unset),
        ),
        ("server.rate_limit.enabled", config.server.rate_limit.enabled.to_string()),
        ("server.rate_limit.max_requests", config.server.rate_limit.max_requests.to_string()),
        ("server.rate_limit.window_secs", config.server.rate_limit.window_secs.to_string()),
        (
            "server.rate_limit.trust_forwarded_for",
            config.server.rate_limit.trust_forwarded_for.to_string(),
        ),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, config_file_doc: Option<&Value>, config_file_path: Option<&Path>) -> String {
    if let Some(env_key) = env_keys(key_path).iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::contains_path;

    #[test]
    fn contains_path_walks_nested_tables() {
        let doc = "[sms]\nfrom_number = \"+15559998888\"\n[server]\nport = 8080\n"
            .parse::<Value>()
            .expect("toml");

        assert!(contains_path(&doc, "sms.from_number"));
        assert!(contains_path(&doc, "server.port"));
        assert!(!contains_path(&doc, "server.bind_address"));
        assert!(!contains_path(&doc, "llm.model"));
    }
}
