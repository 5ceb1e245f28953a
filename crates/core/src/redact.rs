/// Masks a phone number for logs, keeping the leading `+` and last four digits.
pub fn redact_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let char_count = trimmed.chars().count();
    if char_count <= 4 {
        return "*".repeat(char_count);
    }

    let visible_tail = trimmed.chars().skip(char_count - 4).collect::<String>();
    let prefix = if trimmed.starts_with('+') { "+" } else { "" };
    let masked = char_count - 4 - prefix.len();
    format!("{prefix}{}{visible_tail}", "*".repeat(masked))
}

/// Masks a credential, keeping a short prefix so operators can tell which
/// kind of value is configured.
pub fn redact_secret(raw: &str) -> String {
    if raw.is_empty() {
        return "<empty>".to_string();
    }

    let prefix = raw.chars().take(4).collect::<String>();
    format!("{prefix}***")
}
