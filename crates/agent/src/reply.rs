use rand::seq::SliceRandom;
use regex::Regex;

pub const SMS_CHAR_LIMIT: usize = 160;
const TRUNCATION_MARKER: &str = "...";
const MASK: &str = "***";

pub const DEFAULT_BLOCKED_WORDS: &[&str] = &["fuck", "shit", "damn", "ass"];

pub const ESCALATION_REPLY: &str = "I understand you'd like to speak with a human representative. \
I'm connecting you with our support team now. Someone will be with you shortly.";

const FALLBACK_REPLIES: &[&str] = &[
    "I'm sorry, I'm having trouble processing your request right now. Please try again later.",
    "Thank you for your message. I'm experiencing technical difficulties. Please contact us again in a few minutes.",
    "I apologize, but I'm unable to respond at the moment. Please try again or contact our support team.",
];

/// One of the canned replies sent when text generation is unavailable.
pub fn fallback_reply() -> &'static str {
    FALLBACK_REPLIES.choose(&mut rand::thread_rng()).copied().unwrap_or(FALLBACK_REPLIES[0])
}

pub fn is_fallback_reply(text: &str) -> bool {
    FALLBACK_REPLIES.contains(&text)
}

/// Turns raw model output into a single SMS-sized line.
///
/// Markdown markers are removed, whitespace is collapsed, the text is capped
/// at [`SMS_CHAR_LIMIT`] characters and blocked words are masked. Masking
/// only applies to whole words, so "class" or "assistant" stay intact.
#[derive(Clone, Debug)]
pub struct ReplyFilter {
    blocked: Option<Regex>,
    max_chars: usize,
}

impl Default for ReplyFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_WORDS.iter().copied())
    }
}

impl ReplyFilter {
    pub fn new<I>(blocked_words: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let alternatives = blocked_words
            .into_iter()
            .map(|word| regex::escape(word.as_ref().trim()))
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>();

        let blocked = if alternatives.is_empty() {
            None
        } else {
            Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).ok()
        };

        Self { blocked, max_chars: SMS_CHAR_LIMIT }
    }

    pub fn apply(&self, raw: &str) -> String {
        let stripped = raw.replace(['*', '_', '`', '#'], "");
        let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
        let capped = self.cap(collapsed);

        match &self.blocked {
            Some(pattern) => pattern.replace_all(&capped, MASK).into_owned(),
            None => capped,
        }
    }

    fn cap(&self, text: String) -> String {
        if text.chars().count() <= self.max_chars {
            return text;
        }

        let keep = self.max_chars.saturating_sub(TRUNCATION_MARKER.len());
        let mut truncated = text.chars().take(keep).collect::<String>();
        truncated.push_str(TRUNCATION_MARKER);
        truncated
    }
}
