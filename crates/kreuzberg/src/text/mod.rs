//! Text utilities shared by extractors and OCR.

pub mod token_reduction;

use once_cell::sync::Lazy;
use regex::Regex;

static HORIZONTAL_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+").expect("horizontal whitespace pattern compiles"));
static EXCESSIVE_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("excessive newlines pattern compiles"));

/// Normalize whitespace in extracted text: runs of spaces/tabs collapse to a
/// single space, three or more consecutive newlines collapse to two.
pub fn normalize_spaces(text: &str) -> String {
    let collapsed = HORIZONTAL_WHITESPACE.replace_all(text, " ");
    let capped = EXCESSIVE_NEWLINES.replace_all(&collapsed, "\n\n");
    capped.trim().to_string()
}
