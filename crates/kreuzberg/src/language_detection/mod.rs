//! Language detection over extracted content.

use crate::Result;
use crate::core::config::LanguageDetectionConfig;
use whatlang::detect;

/// Character window used when scoring multiple languages.
const MULTI_DETECT_CHUNK_SIZE: usize = 200;

/// Detect the language(s) of `text`.
///
/// Returns ISO 639-3 codes ordered by prevalence, or `None` when nothing
/// clears the confidence threshold.
pub fn detect_languages(text: &str, config: &LanguageDetectionConfig) -> Result<Option<Vec<String>>> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    if !config.detect_multiple {
        return Ok(detect_single(text, config.min_confidence));
    }
    Ok(detect_multiple(text, config.min_confidence))
}

fn detect_single(text: &str, min_confidence: f64) -> Option<Vec<String>> {
    let info = detect(text)?;
    if info.confidence() >= min_confidence {
        Some(vec![info.lang().code().to_string()])
    } else {
        None
    }
}

fn detect_multiple(text: &str, min_confidence: f64) -> Option<Vec<String>> {
    let chars: Vec<char> = text.chars().collect();
    let mut counts: std::collections::HashMap<whatlang::Lang, usize> = std::collections::HashMap::new();

    for chunk in chars.chunks(MULTI_DETECT_CHUNK_SIZE) {
        let piece: String = chunk.iter().collect();
        if let Some(info) = detect(&piece) {
            if info.confidence() >= min_confidence {
                *counts.entry(info.lang()).or_insert(0) += 1;
            }
        }
    }

    if counts.is_empty() {
        return detect_single(text, min_confidence);
    }

    let mut ranked: Vec<(whatlang::Lang, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    Some(ranked.into_iter().map(|(lang, _)| lang.code().to_string()).collect())
}
