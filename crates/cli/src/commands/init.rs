use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use smsdesk_core::config::DEFAULT_CONFIG_FILE;

use super::CommandResult;

const EXIT_EXISTS: u8 = 3;
const EXIT_IO: u8 = 4;

/// Starter configuration. Secrets stay commented out; they are usually
/// supplied through `TWILIO_*` / `GEMINI_API_KEY` environment variables.
pub const CONFIG_TEMPLATE: &str = r#"# smsdesk configuration
# Environment variables override every value below.

[sms]
# account_sid = "ACxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"
# auth_token = "your-auth-token"
# from_number = "+15555550100"
validate_signatures = true
# public_base_url = "https://bot.example.com"

[llm]
# api_key = "your-api-key"
model = "gemini-1.5-flash"
timeout_secs = 30

[conversation]
max_history = 10
timeout_hours = 24
context_window = 6
sweep_interval_secs = 3600

[escalation]
length_threshold = 10

[pricing]
storefront_url = "https://thecustomhub.com"
cache_ttl_secs = 300
search_timeout_secs = 10
max_results = 5

[business]
info = "General customer service"
environment = "development"

[server]
bind_address = "127.0.0.1"
port = 3000
graceful_shutdown_secs = 15
# api_token = "long-random-string"

[server.rate_limit]
enabled = true
max_requests = 100
window_secs = 900
trust_forwarded_for = false

[logging]
level = "info"
format = "compact"
"#;

pub fn run(path: Option<PathBuf>, force: bool) -> CommandResult {
    let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if path.exists() && !force {
        return CommandResult::failure(
            "init",
            "already_exists",
            format!("`{}` already exists; pass --force to overwrite", path.display()),
            EXIT_EXISTS,
        );
    }

    match write_template(&path) {
        Ok(()) => CommandResult::success("init", format!("wrote `{}`", path.display())),
        Err(error) => CommandResult::failure("init", "io", format!("{error:#}"), EXIT_IO),
    }
}

fn write_template(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create `{}`", parent.display()))?;
    }
    if path.is_dir() {
        bail!("`{}` is a directory", path.display());
    }

    let mut file =
        fs::File::create(path).with_context(|| format!("failed to create `{}`", path.display()))?;
    restrict_permissions(&file, path)?;
    file.write_all(CONFIG_TEMPLATE.as_bytes())
        .with_context(|| format!("failed to write `{}`", path.display()))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File, path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to restrict permissions on `{}`", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File, _path: &Path) -> Result<()> {
    Ok(())
}
