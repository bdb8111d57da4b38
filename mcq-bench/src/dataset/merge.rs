//! Joining parsed questions with the answer key

use std::collections::HashSet;

use super::{AnswerKey, QuestionBlock, QuestionRecord};

/// Merged dataset plus extraction diagnostics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub records: Vec<QuestionRecord>,
    /// Blocks where no choice letter was found
    pub missing_choices: usize,
    /// Blocks whose qid has no entry in the answer key
    pub missing_answers: usize,
    /// Later blocks that reused an already-seen qid (dropped)
    pub duplicate_questions: usize,
}

/// Join question blocks with gold answers by qid.
///
/// Every block produces a record, even without choices or a gold answer;
/// the counters report how many were incomplete.
pub fn merge(blocks: Vec<QuestionBlock>, answers: &AnswerKey) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    let mut seen = HashSet::new();

    for block in blocks {
        if !seen.insert(block.qid) {
            tracing::warn!(qid = block.qid, "Duplicate question number, keeping the first block");
            outcome.duplicate_questions += 1;
            continue;
        }

        if block.choices.is_empty() {
            outcome.missing_choices += 1;
        }

        let gold = answers.get(block.qid);
        if gold.is_none() {
            outcome.missing_answers += 1;
        }

        outcome.records.push(QuestionRecord {
            qid: block.qid,
            stem: block.stem,
            choices: block.choices,
            gold,
        });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{parse_answer_key, parse_question_blocks, Letter};

    #[test]
    fn test_merge_counts_gaps() {
        let blocks = parse_question_blocks(
            "1. First (A) a (B) b\n2. Second has no choices\n3. Third (A) x (B) y (C) z",
        );
        let answers = parse_answer_key("1. B\n3. C");

        let outcome = merge(blocks, &answers);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.missing_choices, 1);
        assert_eq!(outcome.missing_answers, 1);
        assert_eq!(outcome.duplicate_questions, 0);

        assert_eq!(outcome.records[0].gold, Some(Letter::B));
        assert_eq!(outcome.records[1].gold, None);
        assert!(outcome.records[1].choices.is_empty());
        assert_eq!(outcome.records[2].gold, Some(Letter::C));
    }

    #[test]
    fn test_merge_preserves_block_order() {
        let blocks = parse_question_blocks("2. b (A) 1 (B) 2\n1. a (A) 1 (B) 2");
        let outcome = merge(blocks, &AnswerKey::new());
        let qids: Vec<u32> = outcome.records.iter().map(|r| r.qid).collect();
        assert_eq!(qids, vec![2, 1]);
        assert_eq!(outcome.missing_answers, 2);
    }

    #[test]
    fn test_duplicate_qid_keeps_first() {
        let blocks = parse_question_blocks("1. first (A) a (B) b\n1. again (A) c (B) d");
        let outcome = merge(blocks, &AnswerKey::new());
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].stem, "first");
        assert_eq!(outcome.duplicate_questions, 1);
    }

    #[test]
    fn test_merge_of_nothing() {
        let outcome = merge(Vec::new(), &AnswerKey::new());
        assert_eq!(outcome, MergeOutcome::default());
    }
}
