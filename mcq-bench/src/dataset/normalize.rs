//! Whitespace cleanup for extracted document text

use regex::Regex;
use std::sync::LazyLock;

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("horizontal whitespace regex"));
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank line regex"));

const SOFT_HYPHEN: char = '\u{00AD}';

/// Normalize extracted text.
///
/// Drops soft hyphens, collapses horizontal whitespace runs to one space,
/// collapses three or more newlines to a single blank line and trims the
/// result. Applying it twice gives the same output as applying it once.
pub fn normalize(text: &str) -> String {
    let text = text.replace(SOFT_HYPHEN, "");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}
