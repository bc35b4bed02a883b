//! Stopword tables for token reduction and keyword extraction.
//!
//! Stopword lists live in `stopwords/<lang>_stopwords.json` (a JSON array of
//! lowercase strings) and are embedded at compile time, so lookups never touch
//! the filesystem. [`StopwordsManager`] merges user-supplied custom words on
//! top of the embedded defaults and falls back to English for unknown
//! languages.

use ahash::{AHashMap, AHashSet};
use once_cell::sync::Lazy;
use std::collections::HashMap;

macro_rules! embed_stopwords {
    ($map:expr, $($lang:literal),* $(,)?) => {
        $(
            {
                const JSON: &str = include_str!(concat!("../../stopwords/", $lang, "_stopwords.json"));
                match serde_json::from_str::<Vec<String>>(JSON) {
                    Ok(words) => {
                        let set: AHashSet<String> = words.into_iter().collect();
                        $map.insert($lang.to_string(), set);
                    }
                    Err(e) => {
                        panic!(
                            "Failed to parse embedded stopwords for language '{}': {}",
                            $lang, e
                        );
                    }
                }
            }
        )*
    };
}

/// Embedded stopword tables keyed by lowercase ISO 639-1 code.
pub static STOPWORDS: Lazy<AHashMap<String, AHashSet<String>>> = Lazy::new(|| {
    let mut map = AHashMap::new();
    embed_stopwords!(map, "en", "de", "fr", "es");
    map
});

/// Map an ISO 639-3 code to the 639-1 code the tables are keyed by.
///
/// Language detection and the OCR backends speak 639-3 ("deu", "fra");
/// the stopword tables use 639-1 ("de", "fr").
fn iso639_3_to_1(code: &str) -> Option<&'static str> {
    Some(match code {
        "eng" => "en",
        "deu" | "ger" => "de",
        "fra" | "fre" => "fr",
        "spa" => "es",
        "ita" => "it",
        "por" => "pt",
        "nld" | "dut" => "nl",
        "rus" => "ru",
        "pol" => "pl",
        "swe" => "sv",
        "dan" => "da",
        "fin" => "fi",
        "nor" | "nob" => "no",
        "ces" | "cze" => "cs",
        "hun" => "hu",
        "ron" | "rum" => "ro",
        "tur" => "tr",
        "ukr" => "uk",
        "ell" | "gre" => "el",
        "heb" => "he",
        "ara" => "ar",
        "hin" => "hi",
        "jpn" => "ja",
        "kor" => "ko",
        "cmn" | "zho" | "chi" => "zh",
        "vie" => "vi",
        "tha" => "th",
        _ => return None,
    })
}

/// Normalize a language key: lowercase, strip any locale suffix, and fold
/// ISO 639-3 codes down to the 639-1 table keys.
///
/// Keys containing path separators or `..` are rejected outright; the
/// on-disk resource naming scheme (`<lang>_stopwords.json`) must never be
/// reachable through caller-controlled traversal.
fn normalize_language(language: &str) -> Option<String> {
    if language.contains('/') || language.contains('\\') || language.contains("..") {
        return None;
    }

    let lowered = language.to_lowercase();
    let base = lowered.split(['-', '_']).next().unwrap_or(&lowered);
    if base.is_empty() {
        return None;
    }

    let base = if base.chars().count() == 3 {
        iso639_3_to_1(base).unwrap_or(base)
    } else {
        base
    };
    Some(base.to_string())
}

/// Look up the embedded stopword set for a language.
pub fn get_stopwords(language: &str) -> Option<&'static AHashSet<String>> {
    let normalized = normalize_language(language)?;
    STOPWORDS.get(&normalized)
}

/// Whether a stopword table exists for the language.
pub fn has_language(language: &str) -> bool {
    get_stopwords(language).is_some()
}

/// Owns stopword resolution for a single reduction run: embedded defaults
/// merged with per-language custom additions.
pub struct StopwordsManager {
    custom: HashMap<String, Vec<String>>,
}

impl StopwordsManager {
    pub fn new(custom_stopwords: Option<&HashMap<String, Vec<String>>>) -> Self {
        Self {
            custom: custom_stopwords.cloned().unwrap_or_default(),
        }
    }

    /// Merged, pre-lowercased stopwords for `language`.
    ///
    /// Unknown languages fall back to English; if English itself were missing
    /// the caller gets `None` and must leave text unchanged.
    pub fn get_stopwords(&self, language: &str) -> Option<AHashSet<String>> {
        let lang = if has_language(language) { language } else { "en" };
        let base = get_stopwords(lang)?;

        let mut merged: AHashSet<String> = base.iter().map(|w| w.to_lowercase()).collect();
        if let Some(normalized) = normalize_language(language)
            && let Some(extra) = self.custom.get(&normalized).or_else(|| self.custom.get(language))
        {
            for word in extra {
                merged.insert(word.to_lowercase());
            }
        }
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_contains_common_words() {
        let words = get_stopwords("en").unwrap();
        assert!(words.contains("the"));
        assert!(words.contains("over"));
        assert!(words.contains("is"));
        assert!(!words.contains("fox"));
    }

    #[test]
    fn test_case_and_locale_normalization() {
        assert!(get_stopwords("EN").is_some());
        assert!(get_stopwords("en-US").is_some());
        assert!(get_stopwords("de_DE").is_some());
    }

    #[test]
    fn test_iso639_3_codes_resolve() {
        // Language detection emits 639-3; the tables are keyed by 639-1.
        let german = get_stopwords("deu").unwrap();
        assert!(german.contains("und"));
        assert!(german.contains("der"));

        let french = get_stopwords("fra").unwrap();
        assert!(french.contains("les"));

        assert!(get_stopwords("ENG").unwrap().contains("the"));
        assert!(has_language("spa"));
    }

    #[test]
    fn test_unknown_iso639_3_code_falls_through() {
        // Three-letter codes with no 639-1 mapping stay as-is and miss.
        assert!(get_stopwords("xyz").is_none());
        assert!(!has_language("qqq"));
    }

    #[test]
    fn test_manager_resolves_iso639_3() {
        let manager = StopwordsManager::new(None);
        let german = manager.get_stopwords("deu").unwrap();
        assert!(german.contains("und"), "639-3 'deu' must reach the German table, not the English fallback");
        assert!(!german.contains("the"));
    }

    #[test]
    fn test_unknown_language() {
        assert!(get_stopwords("zz").is_none());
        assert!(!has_language("zz"));
    }

    #[test]
    fn test_path_traversal_rejected() {
        assert!(get_stopwords("../en").is_none());
        assert!(get_stopwords("en/../de").is_none());
        assert!(get_stopwords("de\\x").is_none());
    }

    #[test]
    fn test_manager_merges_custom_words() {
        let mut custom = HashMap::new();
        custom.insert("en".to_string(), vec!["Foobar".to_string()]);
        let manager = StopwordsManager::new(Some(&custom));

        let merged = manager.get_stopwords("en").unwrap();
        assert!(merged.contains("foobar"));
        assert!(merged.contains("the"));
    }

    #[test]
    fn test_manager_falls_back_to_english() {
        let manager = StopwordsManager::new(None);
        let merged = manager.get_stopwords("zz").unwrap();
        assert!(merged.contains("the"));
    }
}
