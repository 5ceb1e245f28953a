use serde::Serialize;
use smsdesk_core::config::{AppConfig, LoadOptions};

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] = ["sms_credentials", "llm_key", "storefront_url"];

/// Exit code is 0 when every check passes and 1 otherwise.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(LoadOptions::default()));
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::text(exit_code, output);
    }

    CommandResult::text(exit_code, render_human(&report))
}

fn build_report<E: std::fmt::Display>(loaded: Result<AppConfig, E>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_sms_credentials(&config));
            checks.push(check_llm_key(&config));
            checks.push(check_storefront(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_sms_credentials(config: &AppConfig) -> DoctorCheck {
    let sms = &config.sms;
    let missing = [
        ("sms.account_sid", sms.account_sid.is_none()),
        ("sms.auth_token", sms.auth_token.is_none()),
        ("sms.from_number", sms.from_number.is_none()),
    ]
    .into_iter()
    .filter_map(|(key, absent)| absent.then_some(key))
    .collect::<Vec<_>>();

    if !missing.is_empty() {
        return DoctorCheck {
            name: "sms_credentials",
            status: CheckStatus::Fail,
            details: format!("missing {}; replies will not be delivered", missing.join(", ")),
        };
    }

    let signatures = if sms.validate_signatures { "enabled" } else { "disabled" };
    DoctorCheck {
        name: "sms_credentials",
        status: CheckStatus::Pass,
        details: format!("carrier credentials present; webhook signature checks {signatures}"),
    }
}

fn check_llm_key(config: &AppConfig) -> DoctorCheck {
    if config.llm.is_configured() {
        DoctorCheck {
            name: "llm_key",
            status: CheckStatus::Pass,
            details: format!("api key present for model `{}`", config.llm.model),
        }
    } else {
        DoctorCheck {
            name: "llm_key",
            status: CheckStatus::Fail,
            details: "llm.api_key is not set; every reply will be a canned fallback".to_string(),
        }
    }
}

fn check_storefront(config: &AppConfig) -> DoctorCheck {
    DoctorCheck {
        name: "storefront_url",
        status: CheckStatus::Pass,
        details: format!(
            "pricing lookups use `{}` (cache ttl {}s)",
            config.pricing.storefront_url, config.pricing.cache_ttl_secs
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use smsdesk_core::config::AppConfig;

    use super::{build_report, render_human, CheckStatus};

    fn ready_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.sms.account_sid = Some(format!("AC{}", "0".repeat(32)));
        config.sms.auth_token = Some(SecretString::from("token".to_string()));
        config.sms.from_number = Some("+15559998888".to_string());
        config.llm.api_key = Some(SecretString::from("key".to_string()));
        config
    }

    #[test]
    fn fully_configured_desk_passes() {
        let report = build_report::<String>(Ok(ready_config()));

        assert_eq!(report.overall_status, CheckStatus::Pass);
        assert_eq!(report.checks.len(), 4);
    }

    #[test]
    fn missing_credentials_are_named() {
        let report = build_report::<String>(Ok(AppConfig::default()));
        let sms = report.checks.iter().find(|check| check.name == "sms_credentials").expect("sms");

        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert_eq!(sms.status, CheckStatus::Fail);
        assert!(sms.details.contains("sms.account_sid"));
        assert!(render_human(&report).contains("- [fail] llm_key"));
    }

    #[test]
    fn config_failure_skips_dependent_checks() {
        let report = build_report(Err("conversation.max_history must be at least 2"));

        let statuses = report.checks.iter().map(|check| check.status).collect::<Vec<_>>();
        assert_eq!(
            statuses,
            vec![CheckStatus::Fail, CheckStatus::Skipped, CheckStatus::Skipped, CheckStatus::Skipped]
        );
    }
}
