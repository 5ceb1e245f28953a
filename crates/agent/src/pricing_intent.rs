use std::sync::OnceLock;

use regex::Regex;

const PRICE_CUES: &[&str] = &["price", "pricing", "cost", "how much", "quote", "$"];

/// Product types the storefront is searched for, with the spellings
/// customers use for each. `sweatshirt` precedes `t-shirt` so that
/// "sweatshirt" never reads as a tee.
const PRODUCT_PATTERNS: &[(&str, &str)] = &[
    ("sweatshirt", r"(?i)\bsweat-?shirts?\b"),
    ("t-shirt", r"(?i)\b(?:t-?shirts?|t shirts?|tees?)\b"),
    ("hoodie", r"(?i)\bhood(?:ie|y)s?\b|\bhoodies\b"),
    ("mug", r"(?i)\bmugs?\b"),
];

fn product_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PRODUCT_PATTERNS
            .iter()
            .filter_map(|(product_type, pattern)| {
                Regex::new(pattern).ok().map(|regex| (*product_type, regex))
            })
            .collect()
    })
}

/// Returns the product type a message asks the price of, if any.
///
/// Both a price cue ("how much", "cost", "$", ...) and a known product must
/// appear; a bare product mention is not a pricing question.
pub fn detect_pricing_question(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    if !PRICE_CUES.iter().any(|cue| lowered.contains(cue)) {
        return None;
    }

    product_patterns()
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(product_type, _)| product_type.to_string())
}

#[cfg(test)]
mod tests {
    use super::detect_pricing_question;

    #[test]
    fn price_question_with_known_product_is_detected() {
        assert_eq!(detect_pricing_question("How much is a custom T-shirt?"), Some("t-shirt".into()));
        assert_eq!(detect_pricing_question("what do your mugs cost"), Some("mug".into()));
        assert_eq!(detect_pricing_question("hoodie price pls"), Some("hoodie".into()));
    }

    #[test]
    fn sweatshirt_is_not_mistaken_for_tee() {
        assert_eq!(
            detect_pricing_question("Can I get a quote on 20 sweatshirts"),
            Some("sweatshirt".into())
        );
    }

    #[test]
    fn product_without_price_cue_is_ignored() {
        assert_eq!(detect_pricing_question("Is my hoodie order shipped?"), None);
    }

    #[test]
    fn price_cue_without_product_is_ignored() {
        assert_eq!(detect_pricing_question("How much is shipping?"), None);
    }
}
