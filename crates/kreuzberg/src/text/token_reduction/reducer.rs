//! The reduction passes: whitespace/punctuation normalization (light) and
//! stopword removal (moderate), with Markdown-aware line handling and chunked
//! streaming for very large inputs.

use super::config::{ReductionMode, TokenReductionConfig};
use crate::stopwords::StopwordsManager;
use ahash::AHashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static HTML_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("HTML comment pattern compiles"));
static REPEATED_EXCLAMATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"!{2,}").expect("pattern compiles"));
static REPEATED_QUESTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?{2,}").expect("pattern compiles"));
static REPEATED_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").expect("pattern compiles"));
static REPEATED_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",{2,}").expect("pattern compiles"));
static HORIZONTAL_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("pattern compiles"));
static EXCESSIVE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("pattern compiles"));
static ORDERED_LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s").expect("pattern compiles"));
static BULLET_LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*+]\s").expect("pattern compiles"));

/// Inputs larger than this are processed in chunks.
const STREAMING_THRESHOLD: usize = 1_000_000;
/// Approximate chunk size for streaming.
const STREAMING_CHUNK_SIZE: usize = 100_000;
/// How far backward a chunk boundary may be pulled to land on a sentence end.
const BOUNDARY_LOOKBACK: usize = 1_000;

/// Punctuation that re-attaches to the previous kept token when the token
/// carrying it is dropped.
const TERMINAL_PUNCTUATION: &str = ".,;:!?";

pub struct TokenReducer {
    config: TokenReductionConfig,
    stopwords: Option<AHashSet<String>>,
}

impl TokenReducer {
    pub fn new(config: &TokenReductionConfig, language_hint: Option<&str>) -> Self {
        let stopwords = if config.mode == ReductionMode::Moderate {
            let language = language_hint
                .or(config.language_hint.as_deref())
                .unwrap_or("en");
            let manager = StopwordsManager::new(config.custom_stopwords.as_ref());
            manager.get_stopwords(language)
        } else {
            None
        };

        Self {
            config: config.clone(),
            stopwords,
        }
    }

    pub fn reduce(&self, text: &str) -> String {
        if self.config.mode == ReductionMode::Off {
            return text.to_string();
        }
        if text.trim().is_empty() {
            return String::new();
        }

        let normalized: String = if text.is_ascii() {
            text.to_string()
        } else {
            text.nfc().collect()
        };

        match self.config.mode {
            ReductionMode::Off => normalized,
            ReductionMode::Light => self.apply_light(&normalized),
            ReductionMode::Moderate => {
                let light = self.apply_light(&normalized);
                self.apply_moderate(&light)
            }
        }
    }

    fn apply_light(&self, text: &str) -> String {
        if self.config.preserve_markdown {
            stream_if_large(text, |chunk| light_markdown_aware(chunk))
        } else {
            stream_if_large(text, |chunk| light_plain(chunk))
        }
    }

    fn apply_moderate(&self, text: &str) -> String {
        let Some(stopwords) = self.stopwords.as_ref() else {
            // No table for the language and no English fallback either.
            return text.to_string();
        };

        if self.config.preserve_markdown {
            stream_if_large(text, |chunk| remove_stopwords_markdown_aware(chunk, stopwords))
        } else {
            stream_if_large(text, |chunk| remove_stopwords_plain(chunk, stopwords))
        }
    }
}

/// Process text through `f`, chunking inputs past the streaming threshold.
///
/// Chunk boundaries are pulled backward to the nearest sentence end or
/// newline within the lookback window so a sentence is never split.
fn stream_if_large<F: Fn(&str) -> String>(text: &str, f: F) -> String {
    if text.len() <= STREAMING_THRESHOLD {
        return f(text);
    }

    let bytes = text.as_bytes();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + STREAMING_CHUNK_SIZE).min(text.len());
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }

        if end < text.len() {
            let search_floor = start.max(end.saturating_sub(BOUNDARY_LOOKBACK));
            for i in (search_floor..end).rev() {
                if matches!(bytes[i], b'.' | b'!' | b'?' | b'\n') {
                    end = i + 1;
                    break;
                }
            }
        }

        chunks.push(f(&text[start..end]));
        start = end;
    }

    chunks.join(" ").trim().to_string()
}

fn light_plain(text: &str) -> String {
    let mut result = HTML_COMMENT.replace_all(text, "").to_string();

    result = REPEATED_EXCLAMATION.replace_all(&result, "!").to_string();
    result = REPEATED_QUESTION.replace_all(&result, "?").to_string();
    result = REPEATED_PERIOD.replace_all(&result, ".").to_string();
    result = REPEATED_COMMA.replace_all(&result, ",").to_string();

    result = HORIZONTAL_WHITESPACE.replace_all(&result, " ").to_string();
    result = EXCESSIVE_NEWLINES.replace_all(&result, "\n\n").to_string();

    result.trim().to_string()
}

fn light_markdown_aware(text: &str) -> String {
    let mut processed_lines = Vec::new();
    let mut in_code_block = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            processed_lines.push(line.to_string());
            continue;
        }

        if in_code_block || is_markdown_structural_line(line) {
            processed_lines.push(line.to_string());
            continue;
        }

        if line.trim().is_empty() {
            processed_lines.push(line.to_string());
        } else {
            processed_lines.push(light_plain(line));
        }
    }

    cap_blank_lines(&processed_lines).trim().to_string()
}

/// Allow at most two consecutive blank lines outside fenced code blocks.
fn cap_blank_lines(lines: &[String]) -> String {
    let mut kept = Vec::with_capacity(lines.len());
    let mut in_code_block = false;
    let mut consecutive_empty = 0usize;

    for line in lines {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            kept.push(line.clone());
            consecutive_empty = 0;
            continue;
        }

        if in_code_block {
            kept.push(line.clone());
            consecutive_empty = 0;
        } else if line.trim().is_empty() {
            consecutive_empty += 1;
            if consecutive_empty <= 2 {
                kept.push(line.clone());
            }
        } else {
            kept.push(line.clone());
            consecutive_empty = 0;
        }
    }

    kept.join("\n")
}

/// A line that must pass through stopword removal untouched: headers,
/// bullet and ordered list items, and pipe-table rows.
pub(crate) fn is_markdown_structural_line(line: &str) -> bool {
    let stripped = line.trim();

    if stripped.starts_with('#') {
        return true;
    }

    let pipe_count = line.matches('|').count();
    if pipe_count >= 2 && (stripped.starts_with('|') || stripped.ends_with('|') || line.contains(" | ")) {
        return true;
    }

    BULLET_LIST_ITEM.is_match(line) || ORDERED_LIST_ITEM.is_match(line)
}

fn remove_stopwords_markdown_aware(text: &str, stopwords: &AHashSet<String>) -> String {
    let mut processed_lines = Vec::new();
    let mut in_code_block = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            processed_lines.push(line.to_string());
            continue;
        }

        if in_code_block || is_markdown_structural_line(line) {
            processed_lines.push(line.to_string());
            continue;
        }

        if line.trim().is_empty() {
            processed_lines.push(line.to_string());
        } else {
            processed_lines.push(remove_stopwords_plain(line, stopwords));
        }
    }

    let joined = processed_lines.join("\n");
    EXCESSIVE_NEWLINES.replace_all(&joined, "\n\n").trim().to_string()
}

fn remove_stopwords_plain(text: &str, stopwords: &AHashSet<String>) -> String {
    let mut filtered: Vec<String> = Vec::new();

    for word in text.split_whitespace() {
        let char_count = word.chars().count();

        // Short pure-alphabetic tokens are filtered by the lowercase lookup
        // alone; single characters always survive.
        if char_count <= 3 && word.chars().all(char::is_alphabetic) {
            if char_count == 1 || is_all_uppercase(word) || !stopwords.contains(&word.to_lowercase()) {
                filtered.push(word.to_string());
            }
            continue;
        }

        let (_prefix, core, suffix) = split_word_boundaries(word);

        if core.is_empty() {
            filtered.push(word.to_string());
            continue;
        }

        let clean: String = core
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        if clean.is_empty() || clean.chars().count() <= 1 {
            filtered.push(word.to_string());
            continue;
        }

        let keep = !stopwords.contains(&clean)
            || (core.chars().count() > 1 && is_all_uppercase(&core))
            || core.chars().any(|c| c.is_ascii_digit());

        if keep {
            filtered.push(word.to_string());
        } else if suffix.chars().count() == 1
            && TERMINAL_PUNCTUATION.contains(&suffix)
            && !filtered.is_empty()
            && !filtered.last().is_some_and(|last| last.ends_with(&suffix))
        {
            // Keep the sentence boundary the dropped token carried.
            if let Some(last) = filtered.last_mut() {
                last.push_str(&suffix);
            }
        }
    }

    filtered.join(" ")
}

fn is_all_uppercase(word: &str) -> bool {
    word.chars().any(|c| c.is_uppercase()) && !word.chars().any(|c| c.is_lowercase())
}

/// Split a token into `(prefix_punct, core, suffix_punct)` using
/// Unicode-aware boundaries.
fn split_word_boundaries(word: &str) -> (String, String, String) {
    let chars: Vec<char> = word.chars().collect();
    let mut start = 0;
    let mut end = chars.len();

    while start < chars.len() && !chars[start].is_alphanumeric() {
        start += 1;
    }
    while end > start && !chars[end - 1].is_alphanumeric() {
        end -= 1;
    }

    (
        chars[..start].iter().collect(),
        chars[start..end].iter().collect(),
        chars[end..].iter().collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn english_stopwords() -> AHashSet<String> {
        crate::stopwords::StopwordsManager::new(None).get_stopwords("en").unwrap()
    }

    #[test]
    fn test_light_plain_normalizes() {
        let input = "The   quick    brown  fox!!!\n\n\n\nEnd.";
        assert_eq!(light_plain(input), "The quick brown fox!\n\nEnd.");
    }

    #[test]
    fn test_light_strips_html_comments() {
        let input = "before <!-- hidden --> after";
        assert_eq!(light_plain(input), "before after");
    }

    #[test]
    fn test_stopword_removal_basic() {
        let result = remove_stopwords_plain("The quick brown fox jumps over the lazy dog.", &english_stopwords());
        assert!(!result.split_whitespace().any(|w| w.eq_ignore_ascii_case("the")));
        assert!(!result.contains("over"));
        assert!(result.contains("quick"));
        assert!(result.contains("brown"));
        assert!(result.contains("fox"));
        assert!(result.contains("lazy"));
        assert!(result.ends_with("dog."));
    }

    #[test]
    fn test_terminal_punctuation_reattaches() {
        // "it." is dropped; the period moves onto "keep".
        let result = remove_stopwords_plain("keep it. Next", &english_stopwords());
        assert!(result.starts_with("keep."));
    }

    #[test]
    fn test_single_char_tokens_survive() {
        let result = remove_stopwords_plain("a I x", &english_stopwords());
        assert!(result.contains('a'));
        assert!(result.contains('I'));
        assert!(result.contains('x'));
    }

    #[test]
    fn test_digits_survive() {
        let result = remove_stopwords_plain("version 3.14 of the manual", &english_stopwords());
        assert!(result.contains("3.14"));
        assert!(!result.contains("the"));
    }

    #[test]
    fn test_uppercase_tokens_survive() {
        let result = remove_stopwords_plain("THE API and the sdk", &english_stopwords());
        assert!(result.contains("THE"));
        assert!(result.contains("API"));
        assert!(!result.split_whitespace().any(|w| w == "the"));
    }

    #[test]
    fn test_structural_line_detection() {
        assert!(is_markdown_structural_line("# Header"));
        assert!(is_markdown_structural_line("- item"));
        assert!(is_markdown_structural_line("  2. item"));
        assert!(is_markdown_structural_line("| a | b |"));
        assert!(!is_markdown_structural_line("plain sentence"));
    }

    #[test]
    fn test_markdown_lines_preserved() {
        let input = "# The Title\n- the item\nThe plain line here";
        let result = remove_stopwords_markdown_aware(input, &english_stopwords());
        assert!(result.contains("# The Title"));
        assert!(result.contains("- the item"));
        assert!(!result.contains("The plain"));
    }

    #[test]
    fn test_fenced_code_preserved() {
        let input = "```\nthe code is here\n```\nthe prose is here";
        let result = remove_stopwords_markdown_aware(input, &english_stopwords());
        assert!(result.contains("the code is here"));
        assert!(!result.contains("the prose is here"));
    }

    #[test]
    fn test_split_word_boundaries() {
        assert_eq!(
            split_word_boundaries("(hello)!"),
            ("(".to_string(), "hello".to_string(), ")!".to_string())
        );
        assert_eq!(split_word_boundaries("dog."), (String::new(), "dog".to_string(), ".".to_string()));
        assert_eq!(split_word_boundaries("---"), ("---".to_string(), String::new(), String::new()));
    }

    #[test]
    fn test_streaming_snaps_to_sentence_boundary() {
        let sentence = "Some words here. ";
        let big: String = sentence.repeat(70_000);
        let reduced = stream_if_large(&big, |chunk| chunk.trim().to_string());
        assert!(reduced.len() <= big.len());
        assert!(reduced.contains("Some words here."));
    }

    #[test]
    fn test_reducer_off_is_identity() {
        let config = TokenReductionConfig::default();
        let reducer = TokenReducer::new(&config, None);
        let input = "Text   with    runs!!!";
        assert_eq!(reducer.reduce(input), input);
    }

    #[test]
    fn test_reducer_light_shrinks() {
        let config = TokenReductionConfig {
            mode: ReductionMode::Light,
            ..Default::default()
        };
        let reducer = TokenReducer::new(&config, None);
        let input = "Hello   world!!!   How are you???";
        let result = reducer.reduce(input);
        assert!(result.len() < input.len());
        assert!(!result.contains("   "));
        assert!(!result.contains("!!!"));
    }

    #[test]
    fn test_reducer_moderate_removes_stopwords() {
        let config = TokenReductionConfig {
            mode: ReductionMode::Moderate,
            ..Default::default()
        };
        let reducer = TokenReducer::new(&config, Some("en"));
        let result = reducer.reduce("The quick brown fox is jumping over the lazy dog");
        assert!(result.contains("quick"));
        assert!(result.contains("fox"));
        assert!(!result.split_whitespace().any(|w| w == "the" || w == "is" || w == "over"));
    }

    #[test]
    fn test_reducer_german_via_iso639_3_hint() {
        // Language detection hands the reducer 639-3 codes; "deu" must hit
        // the German table, not the English fallback.
        let config = TokenReductionConfig {
            mode: ReductionMode::Moderate,
            ..Default::default()
        };
        let reducer = TokenReducer::new(&config, Some("deu"));
        let result = reducer.reduce("Der schnelle braune Fuchs springt über den faulen Hund");

        let words: Vec<&str> = result.split_whitespace().collect();
        assert!(!words.iter().any(|w| w.eq_ignore_ascii_case("der")));
        assert!(!words.contains(&"den"));
        assert!(!words.contains(&"über"));
        assert!(words.contains(&"schnelle"));
        assert!(words.contains(&"Fuchs"));
        assert!(words.contains(&"springt"));
    }

    #[test]
    fn test_reducer_unknown_language_falls_back_to_english() {
        let config = TokenReductionConfig {
            mode: ReductionMode::Moderate,
            ..Default::default()
        };
        let reducer = TokenReducer::new(&config, Some("zz"));
        let result = reducer.reduce("the quick test");
        assert!(!result.split_whitespace().any(|w| w == "the"));
        assert!(result.contains("quick"));
    }

    #[test]
    fn test_reducer_custom_stopwords() {
        use std::collections::HashMap;

        let mut custom = HashMap::new();
        custom.insert("en".to_string(), vec!["banana".to_string()]);
        let config = TokenReductionConfig {
            mode: ReductionMode::Moderate,
            custom_stopwords: Some(custom),
            ..Default::default()
        };
        let reducer = TokenReducer::new(&config, Some("en"));
        let result = reducer.reduce("grab that banana quickly please");
        assert!(!result.contains("banana"));
        assert!(result.contains("quickly"));
    }

    #[test]
    fn test_blank_input_reduces_to_empty() {
        let config = TokenReductionConfig {
            mode: ReductionMode::Light,
            ..Default::default()
        };
        let reducer = TokenReducer::new(&config, None);
        assert_eq!(reducer.reduce("   "), "");
    }
}
