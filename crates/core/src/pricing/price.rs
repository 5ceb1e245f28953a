use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

fn dollar_amount() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\s?([\d,]+(?:\.\d+)?)").ok()).as_ref()
}

/// Extracts a positive amount from storefront price text.
///
/// The first `$`-prefixed amount wins (`"From $1,299.50"`); otherwise the
/// whole text is read after dropping `$`, `,` and whitespace. Zero, negative
/// and unreadable prices yield `None`.
pub fn parse_price(text: &str) -> Option<Decimal> {
    let amount = dollar_amount()
        .and_then(|pattern| pattern.captures(text))
        .and_then(|captures| captures.get(1));
    let raw = match amount {
        Some(amount) => amount.as_str().replace(',', ""),
        None => text.chars().filter(|ch| !matches!(ch, '$' | ',') && !ch.is_whitespace()).collect(),
    };

    raw.parse::<Decimal>().ok().filter(|price| *price > Decimal::ZERO)
}
