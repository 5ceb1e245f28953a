use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

const POSITIVE_WORDS: &[&str] =
    &["good", "great", "excellent", "amazing", "wonderful", "happy", "satisfied", "love", "like"];

const NEGATIVE_WORDS: &[&str] = &[
    "bad",
    "terrible",
    "awful",
    "horrible",
    "angry",
    "frustrated",
    "disappointed",
    "hate",
    "dislike",
];

/// Word lists consulted by [`SentimentClassifier`]. Entries are matched
/// against whole lower-cased tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentimentLexicon {
    positive: BTreeSet<String>,
    negative: BTreeSet<String>,
}

impl Default for SentimentLexicon {
    fn default() -> Self {
        Self::new(POSITIVE_WORDS.iter().copied(), NEGATIVE_WORDS.iter().copied())
    }
}

impl SentimentLexicon {
    pub fn new<P, N>(positive: P, negative: N) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        Self {
            positive: positive.into_iter().map(|word| word.as_ref().to_lowercase()).collect(),
            negative: negative.into_iter().map(|word| word.as_ref().to_lowercase()).collect(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SentimentClassifier {
    lexicon: SentimentLexicon,
}

impl SentimentClassifier {
    pub fn new(lexicon: SentimentLexicon) -> Self {
        Self { lexicon }
    }

    /// Counts whitespace-separated tokens found in each list. The larger
    /// count wins; ties, including no hits at all, are neutral.
    pub fn classify(&self, text: &str) -> Sentiment {
        let (positive, negative) =
            text.split_whitespace().map(str::to_lowercase).fold((0usize, 0usize), |counts, token| {
                (
                    counts.0 + usize::from(self.lexicon.positive.contains(&token)),
                    counts.1 + usize::from(self.lexicon.negative.contains(&token)),
                )
            });

        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Sentiment, SentimentClassifier, SentimentLexicon};

    #[test]
    fn stock_lexicon_classifies_common_messages() {
        let classifier = SentimentClassifier::default();

        assert_eq!(classifier.classify("I love this service"), Sentiment::Positive);
        assert_eq!(classifier.classify("This is terrible"), Sentiment::Negative);
        assert_eq!(classifier.classify("What time is it"), Sentiment::Neutral);
    }

    #[test]
    fn tokens_are_case_insensitive() {
        let classifier = SentimentClassifier::default();
        assert_eq!(classifier.classify("AWFUL experience"), Sentiment::Negative);
    }

    #[test]
    fn equal_counts_are_neutral() {
        let classifier = SentimentClassifier::default();
        assert_eq!(classifier.classify("good product bad shipping"), Sentiment::Neutral);
    }

    #[test]
    fn punctuation_attached_to_a_word_prevents_a_match() {
        let classifier = SentimentClassifier::default();
        assert_eq!(classifier.classify("terrible!"), Sentiment::Neutral);
    }

    #[test]
    fn injected_lexicon_replaces_stock_lists() {
        let classifier = SentimentClassifier::new(SentimentLexicon::new(["stellar"], ["meh"]));

        assert_eq!(classifier.classify("stellar work"), Sentiment::Positive);
        assert_eq!(classifier.classify("love it"), Sentiment::Neutral);
        assert_eq!(classifier.classify("Meh"), Sentiment::Negative);
    }
}
