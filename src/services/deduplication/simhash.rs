//! 64-bit SimHash fingerprinting.
//!
//! Text is normalized (lowercase, non-alphanumerics to spaces, whitespace
//! collapsed), split into words, then word bigrams and trigrams are added.
//! Each token is hashed with SHA-256 (first 8 bytes, big-endian) and votes
//! on every bit with its n-gram weight. Bit `i` is set iff its tally is
//! positive.

use super::config::DeduplicationConfig;
use crate::models::{ContentItem, Signature};
use sha2::{Digest, Sha256};

/// Computes SimHash signatures.
///
/// # Example
///
/// ```rust
/// use quizpool::services::deduplication::Fingerprinter;
///
/// let fp = Fingerprinter::default();
/// let a = fp.fingerprint_text("What is the capital of France?");
/// let b = fp.fingerprint_text("what is the capital of  FRANCE");
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprinter {
    max_tokens: usize,
    weights: [i64; 3],
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::from_config(&DeduplicationConfig::default())
    }
}

impl Fingerprinter {
    /// Creates a fingerprinter from dedup settings.
    #[must_use]
    pub const fn from_config(config: &DeduplicationConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            weights: [
                config.word_weight,
                config.bigram_weight,
                config.trigram_weight,
            ],
        }
    }

    /// Fingerprints an item from its category, topic, body and choices.
    ///
    /// The id, answer and difficulty do not contribute, so two items that
    /// differ only in those collide.
    #[must_use]
    pub fn fingerprint(&self, item: &ContentItem) -> Signature {
        let mut text = String::with_capacity(item.body.len() + 64);
        text.push_str(&item.category);
        text.push(' ');
        text.push_str(&item.topic);
        text.push(' ');
        text.push_str(&item.body);
        for choice in &item.choices {
            text.push(' ');
            text.push_str(choice);
        }
        self.fingerprint_text(&text)
    }

    /// Fingerprints arbitrary text.
    #[must_use]
    pub fn fingerprint_text(&self, text: &str) -> Signature {
        let normalized = normalize(text);
        let mut tally = [0i64; 64];

        for (token, weight) in self.tokens(&normalized) {
            let hash = token_hash(&token);
            for (bit, slot) in tally.iter_mut().enumerate() {
                if (hash >> bit) & 1 == 1 {
                    *slot += weight;
                } else {
                    *slot -= weight;
                }
            }
        }

        let value = tally
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0)
            .fold(0u64, |acc, (bit, _)| acc | (1 << bit));
        Signature::new(value)
    }

    /// Weighted token list for normalized text, capped at `max_tokens`.
    ///
    /// Words come first, then bigrams, then trigrams, so the cap drops the
    /// longest n-grams before any single word.
    #[must_use]
    pub fn tokens(&self, normalized: &str) -> Vec<(String, i64)> {
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let mut tokens = Vec::with_capacity(self.max_tokens.min(words.len() * 3));

        for (order, weight) in self.weights.iter().enumerate() {
            let n = order + 1;
            for window in words.windows(n) {
                if tokens.len() >= self.max_tokens {
                    return tokens;
                }
                tokens.push((window.join(" "), *weight));
            }
        }
        tokens
    }
}

/// Lowercases, maps every non-alphanumeric char to a space and collapses
/// runs of whitespace.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn token_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DifficultyLevel, Provenance};
    use test_case::test_case;

    #[test_case("Hello, World!", "hello world"; "punctuation")]
    #[test_case("  many   spaces\there\n", "many spaces here"; "whitespace")]
    #[test_case("Ünïcode Straße", "ünïcode straße"; "unicode lowercase")]
    #[test_case("x=1+2", "x 1 2"; "symbols")]
    #[test_case("", ""; "empty")]
    fn test_normalize(input: &str, expected: &str) {
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_token_order_and_cap() {
        let fp = Fingerprinter::default();
        let tokens: Vec<String> = fp
            .tokens("a b c d")
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(
            tokens,
            vec!["a", "b", "c", "d", "a b", "b c", "c d", "a b c", "b c d"]
        );

        let capped = Fingerprinter::from_config(&DeduplicationConfig::default().with_max_tokens(5));
        assert_eq!(capped.tokens("a b c d").len(), 5);
    }

    #[test]
    fn test_token_hash_is_sha256_prefix() {
        let digest = Sha256::digest(b"abc");
        let expected = u64::from_be_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]);
        assert_eq!(token_hash("abc"), expected);
        assert_eq!(token_hash("abc"), 0xba78_16bf_8f01_cfea);
    }

    #[test]
    fn test_single_token_signature_is_its_hash() {
        let fp = Fingerprinter::default();
        assert_eq!(fp.fingerprint_text("abc").value(), token_hash("abc"));
    }

    #[test]
    fn test_empty_text_is_zero() {
        assert_eq!(Fingerprinter::default().fingerprint_text("  ...  ").value(), 0);
    }

    #[test]
    fn test_item_fingerprint_ignores_id_and_answer() {
        let fp = Fingerprinter::default();
        let a = ContentItem::new(
            "history",
            "rome",
            "Who was the first emperor of Rome?",
            "Augustus",
            DifficultyLevel::Basic,
            Provenance::Local,
        );
        let b = a.clone().with_id("other-id");
        let mut c = a.clone();
        c.canonical_answer = "Octavian".to_string();

        assert_eq!(fp.fingerprint(&a), fp.fingerprint(&b));
        assert_eq!(fp.fingerprint(&a), fp.fingerprint(&c));
    }

    #[test]
    fn test_different_texts_are_far_apart() {
        let fp = Fingerprinter::default();
        let a = fp.fingerprint_text("Which planet is known as the red planet in our solar system?");
        let b = fp.fingerprint_text("Name the longest river that flows through Egypt and Sudan.");
        assert!(a.hamming_distance(b) > 2);
    }
}
