//! Question block parsing
//!
//! Splits a normalized exam document into numbered question blocks and
//! each block into a stem plus lettered choices. Matching is deliberately
//! tolerant: malformed input degrades to partial blocks, never to errors.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::normalize::normalize;
use super::Letter;

/// `12. ` at the start of a line
static QUESTION_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*(\d{1,3})\.\s").expect("question start regex"));
/// `(C) ` inline choice marker
static CHOICE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([A-E])\)\s").expect("choice marker regex"));

/// Minimum number of choice segments for a block to keep its choices
const MIN_CHOICE_SEGMENTS: usize = 2;

/// One parsed question block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBlock {
    pub qid: u32,
    pub stem: String,
    /// Empty for stem-only blocks
    pub choices: BTreeMap<Letter, String>,
}

impl QuestionBlock {
    pub fn stem_only(qid: u32, stem: impl Into<String>) -> Self {
        Self {
            qid,
            stem: stem.into(),
            choices: BTreeMap::new(),
        }
    }
}

/// Strategy for turning document text into question blocks
pub trait BlockParser {
    fn parse_blocks(&self, text: &str) -> Vec<QuestionBlock>;
}

/// Regular-expression block parser for `N. stem (A) ... (B) ...` layouts
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexBlockParser;

impl BlockParser for RegexBlockParser {
    fn parse_blocks(&self, text: &str) -> Vec<QuestionBlock> {
        split_numbered_blocks(text)
            .into_iter()
            .map(|(qid, body)| split_choices(qid, &body))
            .collect()
    }
}

/// Parse question blocks with the default regex strategy
pub fn parse_question_blocks(text: &str) -> Vec<QuestionBlock> {
    RegexBlockParser.parse_blocks(text)
}

/// Split text at numbered labels, returning `(qid, body)` in document order.
///
/// Labels are only recognized at line starts; `0.` is not a label.
fn split_numbered_blocks(text: &str) -> Vec<(u32, String)> {
    // Leading newline so a label on the very first line is anchored too
    let text = format!("\n{}", text);

    let starts: Vec<(u32, usize, usize)> = QUESTION_START
        .captures_iter(&text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let qid: u32 = caps[1].parse().ok()?;
            (qid >= 1).then_some((qid, whole.start(), whole.end()))
        })
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &(qid, _, body_start))| {
            let body_end = starts
                .get(i + 1)
                .map(|&(_, next_start, _)| next_start)
                .unwrap_or(text.len());
            (qid, text[body_start..body_end].to_string())
        })
        .collect()
}

/// Split one block body into stem and choices.
///
/// Letters are taken in the order they appear; a repeated letter replaces
/// the earlier text. Fewer than two markers leaves a stem-only block.
fn split_choices(qid: u32, body: &str) -> QuestionBlock {
    let markers: Vec<(Letter, usize, usize)> = CHOICE_MARKER
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let letter = Letter::parse(&caps[1])?;
            Some((letter, whole.start(), whole.end()))
        })
        .collect();

    if markers.len() < MIN_CHOICE_SEGMENTS {
        return QuestionBlock::stem_only(qid, normalize(body));
    }

    let stem = normalize(&body[..markers[0].1]);
    let mut choices = BTreeMap::new();
    for (i, &(letter, _, text_start)) in markers.iter().enumerate() {
        let text_end = markers
            .get(i + 1)
            .map(|&(_, next_start, _)| next_start)
            .unwrap_or(body.len());
        choices.insert(letter, normalize(&body[text_start..text_end]));
    }

    QuestionBlock { qid, stem, choices }
}
