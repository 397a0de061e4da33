// Fallback moderation rules.
//
// Used whenever the AI moderator is unavailable or the daily API budget is
// spent. Deliberately a total function: whatever the content looks like,
// it always produces a verdict in the same shape the AI path returns.

use super::moderation_models::Verdict;
use std::collections::HashMap;

const BANNED_WORDS: [&str; 11] = [
    "spam",
    "scam",
    "fake",
    "hate",
    "violence",
    "harassment",
    "inappropriate",
    "offensive",
    "abusive",
    "threat",
    "dangerous",
];

/// How much of the content may be uppercase before it reads as shouting.
const MAX_CAPS_RATIO: f64 = 0.7;
/// Caps check only applies past this length so short acronyms pass.
const CAPS_MIN_LENGTH: usize = 10;
/// A single token repeated more than this flags the content...
const MAX_WORD_REPETITION: usize = 3;
/// ...but only once the content has more tokens than this.
const REPETITION_MIN_WORDS: usize = 5;

/// Classify `content` with static rules. First match wins.
pub fn evaluate(content: &str) -> Verdict {
    let lowered = content.to_lowercase();
    for word in BANNED_WORDS {
        if lowered.contains(word) {
            return Verdict::rejected(
                format!("Content contains potentially inappropriate language: {word}"),
                0.8,
            );
        }
    }

    // Excessive caps (potential spam). Length guard doubles as the
    // divide-by-zero guard for empty content.
    let total_chars = content.chars().count();
    if total_chars > CAPS_MIN_LENGTH {
        let caps = content.chars().filter(|c| c.is_ascii_uppercase()).count();
        if caps as f64 / total_chars as f64 > MAX_CAPS_RATIO {
            return Verdict::rejected(
                "Content appears to be spam (excessive capitalization)",
                0.6,
            );
        }
    }

    // Excessive repetition. Tokens are compared exactly as split, no
    // normalization, mirroring the AI path's notion of a "word".
    let words: Vec<&str> = content.split(' ').collect();
    if words.len() > REPETITION_MIN_WORDS {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for word in &words {
            *counts.entry(word).or_default() += 1;
        }
        let max_repetition = counts.values().copied().max().unwrap_or(0);
        if max_repetition > MAX_WORD_REPETITION {
            return Verdict::rejected(
                "Content appears to be spam (excessive word repetition)",
                0.7,
            );
        }
    }

    Verdict::approved("Content passed basic moderation rules", 0.9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::moderation_models::Decision;

    #[test]
    fn test_clean_message_approved() {
        let verdict = evaluate("This is a clean message.");

        assert_eq!(verdict.decision, Decision::Approved);
        assert_eq!(verdict.confidence, 0.9);
        assert!(verdict.reason.contains("passed"));
    }

    #[test]
    fn test_banned_word_rejected() {
        let verdict = evaluate("buy now, totally not a scam");

        assert_eq!(verdict.decision, Decision::Rejected);
        assert_eq!(verdict.confidence, 0.8);
        assert!(verdict.reason.contains("scam"));
    }

    #[test]
    fn test_banned_word_match_is_case_insensitive() {
        let verdict = evaluate("SPAM SPAM");

        assert_eq!(verdict.decision, Decision::Rejected);
        assert_eq!(verdict.confidence, 0.8);
        assert!(verdict.reason.contains("spam"));
    }

    #[test]
    fn test_excessive_caps_rejected() {
        let verdict = evaluate("AAAAAAAAAAAA");

        assert_eq!(verdict.decision, Decision::Rejected);
        assert_eq!(verdict.confidence, 0.6);
        assert!(verdict.reason.contains("capitalization"));
    }

    #[test]
    fn test_short_caps_allowed() {
        // 10 chars or fewer never trip the caps rule
        let verdict = evaluate("OK FINE");

        assert_eq!(verdict.decision, Decision::Approved);
    }

    #[test]
    fn test_excessive_repetition_rejected() {
        let verdict = evaluate("test test test test test test");

        assert_eq!(verdict.decision, Decision::Rejected);
        assert_eq!(verdict.confidence, 0.7);
        assert!(verdict.reason.contains("repetition"));
    }

    #[test]
    fn test_few_words_skip_repetition_check() {
        // "no no no no" repeats past the threshold but has only 4 tokens
        let verdict = evaluate("no no no no");

        assert_eq!(verdict.decision, Decision::Approved);
    }

    #[test]
    fn test_empty_content_does_not_panic() {
        let verdict = evaluate("");

        assert_eq!(verdict.decision, Decision::Approved);
    }

    #[test]
    fn test_deterministic_and_bounded_confidence() {
        let inputs = ["", "hello", "AAAAAAAAAAAA", "go go go go go go go", "scam"];
        for input in inputs {
            let first = evaluate(input);
            let second = evaluate(input);
            assert_eq!(first, second);
            assert!((0.0..=1.0).contains(&first.confidence));
        }
    }
}
