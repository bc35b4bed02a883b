//! Keyword extraction using RAKE over the embedded stopword tables.

use crate::Result;
use crate::stopwords;
use rake::{Rake, StopWords};
use std::collections::HashSet;

/// Extract up to `keyword_count` keywords from `content`.
///
/// Scores are min-max normalized into `[0, 1]`, best first. Languages
/// without a stopword table fall back to English; RAKE needs stopwords as
/// phrase delimiters, so an empty table would yield nothing useful.
pub fn extract_keywords(content: &str, keyword_count: usize, language: Option<&str>) -> Result<Vec<(String, f64)>> {
    if content.trim().is_empty() || keyword_count == 0 {
        return Ok(Vec::new());
    }

    let lang = language.unwrap_or("en");
    let words = stopwords::get_stopwords(lang)
        .or_else(|| stopwords::get_stopwords("en"))
        .map(|set| set.iter().cloned().collect::<HashSet<String>>())
        .unwrap_or_default();

    let rake = Rake::new(StopWords::from(words));
    let scored = rake.run(content);

    if scored.is_empty() {
        return Ok(Vec::new());
    }

    let min_score = scored.iter().map(|k| k.score).fold(f64::INFINITY, f64::min);
    let max_score = scored.iter().map(|k| k.score).fold(f64::NEG_INFINITY, f64::max);

    let mut keywords: Vec<(String, f64)> = scored
        .into_iter()
        .map(|k| {
            let normalized = if max_score > min_score {
                ((k.score - min_score) / (max_score - min_score)).clamp(0.0, 1.0)
            } else {
                1.0
            };
            (k.keyword, normalized)
        })
        .collect();

    keywords.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    keywords.truncate(keyword_count);
    Ok(keywords)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Machine learning is a branch of artificial intelligence that focuses on \
                          building systems that learn from data. Deep learning uses neural networks \
                          with many layers. Natural language processing enables computers to \
                          understand human language.";

    #[test]
    fn test_extracts_salient_phrases() {
        let keywords = extract_keywords(SAMPLE, 10, Some("en")).unwrap();
        assert!(!keywords.is_empty());

        let joined: String = keywords.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>().join(" ");
        assert!(joined.contains("learning") || joined.contains("language"));
    }

    #[test]
    fn test_scores_normalized_and_sorted() {
        let keywords = extract_keywords(SAMPLE, 10, Some("en")).unwrap();
        for window in keywords.windows(2) {
            assert!(window[0].1 >= window[1].1);
        }
        for (_, score) in &keywords {
            assert!((0.0..=1.0).contains(score));
        }
    }

    #[test]
    fn test_respects_keyword_count() {
        let keywords = extract_keywords(SAMPLE, 3, Some("en")).unwrap();
        assert!(keywords.len() <= 3);
    }

    #[test]
    fn test_empty_content() {
        assert!(extract_keywords("", 10, None).unwrap().is_empty());
        assert!(extract_keywords("   ", 10, None).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_language_falls_back() {
        let keywords = extract_keywords(SAMPLE, 5, Some("zz")).unwrap();
        assert!(!keywords.is_empty());
    }
}
