//! Answer key parsing

use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

use super::normalize::normalize;
use super::Letter;

/// `12. B`, `12) B`, `12 B` or `12B`
static ANSWER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,3})\s*[\.\)]?\s*([A-E])\b").expect("answer token regex")
});

/// Mapping from question id to gold letter, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerKey {
    answers: IndexMap<u32, Letter>,
}

impl AnswerKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answer unless the qid already has one
    ///
    /// Returns `true` when the entry was inserted.
    pub fn insert_first(&mut self, qid: u32, letter: Letter) -> bool {
        if self.answers.contains_key(&qid) {
            return false;
        }
        self.answers.insert(qid, letter);
        true
    }

    pub fn get(&self, qid: u32) -> Option<Letter> {
        self.answers.get(&qid).copied()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn as_map(&self) -> &IndexMap<u32, Letter> {
        &self.answers
    }
}

/// Scan answer-key text for `<number> <letter>` tokens.
///
/// The first letter seen for a qid wins; later tokens with the same number
/// are ignored so that stray text further down cannot replace the answer.
pub fn parse_answer_key(text: &str) -> AnswerKey {
    let text = normalize(text);
    let mut key = AnswerKey::new();

    for caps in ANSWER_TOKEN.captures_iter(&text) {
        let Ok(qid) = caps[1].parse::<u32>() else {
            continue;
        };
        if qid == 0 {
            continue;
        }
        if let Some(letter) = Letter::parse(&caps[2]) {
            if !key.insert_first(qid, letter) {
                tracing::debug!(qid, ignored = %letter, "Duplicate answer-key entry ignored");
            }
        }
    }

    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_layouts() {
        let key = parse_answer_key("1. B\n2) C\n3 D\n4.A");
        assert_eq!(key.len(), 4);
        assert_eq!(key.get(1), Some(Letter::B));
        assert_eq!(key.get(2), Some(Letter::C));
        assert_eq!(key.get(3), Some(Letter::D));
        assert_eq!(key.get(4), Some(Letter::A));
    }

    #[test]
    fn test_first_match_wins() {
        let key = parse_answer_key("5. B ... later unrelated 5 C");
        assert_eq!(key.get(5), Some(Letter::B));
        assert_eq!(key.len(), 1);
    }

    #[test]
    fn test_discovery_order_preserved() {
        let key = parse_answer_key("10 A 2 B 7 C");
        let order: Vec<u32> = key.as_map().keys().copied().collect();
        assert_eq!(order, vec![10, 2, 7]);
    }

    #[test]
    fn test_letters_inside_words_ignored() {
        let key = parse_answer_key("Answer Key 2024 Edition\n1 Because");
        assert!(key.get(1).is_none());
    }

    #[test]
    fn test_lowercase_letters_ignored() {
        let key = parse_answer_key("1. b");
        assert!(key.is_empty());
    }

    #[test]
    fn test_tabular_key() {
        let key = parse_answer_key("Question  Answer\n 1   A\n 2   E\n 3   C");
        assert_eq!(key.get(2), Some(Letter::E));
        assert_eq!(key.len(), 3);
    }
}
