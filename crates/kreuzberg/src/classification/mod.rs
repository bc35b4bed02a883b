//! Document type classification.
//!
//! A fixed pattern dictionary scores the document as one of invoice,
//! receipt, contract, report, or form. Text mode scores the content string;
//! vision mode scores OCR layout words and grants a bonus to matches in the
//! header region (top 30% of the page). The translation collaborator is not
//! bundled, so scoring operates on the lowercased source text.

use crate::core::config::{ClassificationMode, ExtractionConfig, OcrConfig};
use crate::error::Result;
use crate::ocr::OcrProcessor;
use crate::ocr::types::{OutputFormat, TesseractConfig};
use crate::types::{ExtractionResult, TsvWord};
use std::path::Path;

/// Per-type indicator phrases, matched against lowercased text.
const DOCUMENT_CLASSIFIERS: &[(&str, &[&str])] = &[
    ("invoice", &["invoice", "bill to", "invoice number", "total amount", "tax id"]),
    ("receipt", &["receipt", "cash receipt", "payment", "subtotal", "total due"]),
    (
        "contract",
        &["agreement", "contract", "party a", "party b", "terms and conditions", "signature"],
    ),
    ("report", &["report", "summary", "analysis", "findings", "conclusion"]),
    ("form", &["form", "fill out", "signature", "date", "submit"]),
];

/// Bonus for a pattern hit inside the header region.
const HEADER_REGION_BONUS: f64 = 0.5;
/// Fraction of page height treated as the header region.
const HEADER_REGION_RATIO: f64 = 0.3;

fn text_to_classify(result: &ExtractionResult) -> String {
    let mut text = result.content.clone();
    for value in result.metadata.additional.values() {
        if let Some(s) = value.as_str() {
            text.push(' ');
            text.push_str(s);
        }
    }
    // The translation collaborator is unavailable; score the source text.
    text.to_lowercase()
}

fn pick_best(scores: &[(&str, f64)], threshold: f64) -> Option<(String, f64)> {
    let total: f64 = scores.iter().map(|(_, s)| s).sum();
    if total == 0.0 {
        return None;
    }

    let (best_type, best_score) = scores
        .iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    let confidence = best_score / total;

    if confidence >= threshold {
        Some((best_type.to_string(), confidence))
    } else {
        None
    }
}

/// Score lowercased text against the pattern dictionary.
pub fn classify_document(result: &ExtractionResult, config: &ExtractionConfig) -> Option<(String, f64)> {
    let text = text_to_classify(result);

    let scores: Vec<(&str, f64)> = DOCUMENT_CLASSIFIERS
        .iter()
        .map(|(doc_type, patterns)| {
            let hits = patterns.iter().filter(|p| text.contains(*p)).count();
            (*doc_type, hits as f64)
        })
        .collect();

    pick_best(&scores, config.document_type_confidence_threshold)
}

/// Score OCR layout words, rewarding matches that start in the header
/// region.
pub fn classify_document_from_layout(
    words: &[TsvWord],
    result: &ExtractionResult,
    config: &ExtractionConfig,
) -> Option<(String, f64)> {
    if words.is_empty() {
        return None;
    }

    // Joined word text with byte spans back to the source word.
    let mut joined = String::new();
    let mut spans: Vec<(usize, usize, usize)> = Vec::with_capacity(words.len());
    for (index, word) in words.iter().enumerate() {
        if !joined.is_empty() {
            joined.push(' ');
        }
        let start = joined.len();
        joined.push_str(&word.text.to_lowercase());
        spans.push((start, joined.len(), index));
    }

    for value in result.metadata.additional.values() {
        if let Some(s) = value.as_str() {
            joined.push(' ');
            joined.push_str(&s.to_lowercase());
        }
    }

    let max_top = words.iter().map(|w| w.top).max().unwrap_or(0) as f64;
    let max_height = words.iter().map(|w| w.height).max().unwrap_or(0) as f64;
    let page_height = if max_top + max_height > 0.0 { max_top + max_height } else { 1000.0 };
    let header_limit = page_height * HEADER_REGION_RATIO;

    let word_at_offset = |offset: usize| -> Option<&TsvWord> {
        spans
            .iter()
            .find(|(start, end, _)| offset >= *start && offset < *end)
            .map(|(_, _, index)| &words[*index])
    };

    let scores: Vec<(&str, f64)> = DOCUMENT_CLASSIFIERS
        .iter()
        .map(|(doc_type, patterns)| {
            let mut score = 0.0;
            for pattern in *patterns {
                if let Some(position) = joined.find(pattern) {
                    score += 1.0;
                    if let Some(word) = word_at_offset(position) {
                        if (word.top as f64) < header_limit {
                            score += HEADER_REGION_BONUS;
                        }
                    }
                }
            }
            (*doc_type, score)
        })
        .collect();

    pick_best(&scores, config.document_type_confidence_threshold)
}

/// Run the configured classification mode and fill the result fields.
pub async fn auto_detect_document_type(
    result: &mut ExtractionResult,
    config: &ExtractionConfig,
    file_path: Option<&Path>,
) -> Result<()> {
    let classification = if config.document_classification_mode == ClassificationMode::Vision
        && let Some(path) = file_path
    {
        let layout_config = OcrConfig::Tesseract(TesseractConfig {
            output_format: OutputFormat::Tsv,
            enable_table_detection: false,
            ..Default::default()
        });
        let layout_result = OcrProcessor::global().process_file(path, &layout_config).await?;
        let words = layout_result.layout.unwrap_or_default();
        classify_document_from_layout(&words, result, config)
    } else if let Some(words) = result.layout.clone().filter(|w| !w.is_empty()) {
        classify_document_from_layout(&words, result, config)
    } else {
        classify_document(result, config)
    };

    match classification {
        Some((doc_type, confidence)) => {
            result.document_type = Some(doc_type);
            result.document_type_confidence = Some(confidence);
        }
        None => {
            result.document_type = None;
            result.document_type_confidence = None;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_threshold(threshold: f64) -> ExtractionConfig {
        ExtractionConfig {
            auto_detect_document_type: true,
            document_type_confidence_threshold: threshold,
            ..Default::default()
        }
    }

    #[test]
    fn test_invoice_classification() {
        let result = ExtractionResult::new(
            "INVOICE\nInvoice Number: 42\nBill To: ACME Corp\nTotal Amount: $100\nTax ID: 123",
            "text/plain",
        );
        let (doc_type, confidence) = classify_document(&result, &config_with_threshold(0.5)).unwrap();
        assert_eq!(doc_type, "invoice");
        assert!(confidence >= 0.5);
    }

    #[test]
    fn test_no_patterns_no_classification() {
        let result = ExtractionResult::new("completely unrelated prose about gardening", "text/plain");
        assert!(classify_document(&result, &config_with_threshold(0.5)).is_none());
    }

    #[test]
    fn test_threshold_rejects_weak_match() {
        // "signature" and "date" hit both contract and form; confidence for
        // either stays below a strict threshold.
        let result = ExtractionResult::new("signature date", "text/plain");
        assert!(classify_document(&result, &config_with_threshold(0.9)).is_none());
    }

    #[test]
    fn test_confidences_normalized() {
        let result = ExtractionResult::new("invoice number and total amount, but also a report summary", "text/plain");
        let config = config_with_threshold(0.0);
        let (_, confidence) = classify_document(&result, &config).unwrap();
        assert!(confidence > 0.0 && confidence <= 1.0);
    }

    fn layout_word(text: &str, left: i32, top: i32) -> TsvWord {
        TsvWord {
            level: 5,
            page_num: 1,
            block_num: 1,
            par_num: 1,
            line_num: 1,
            word_num: 0,
            left,
            top,
            width: 50,
            height: 20,
            conf: 90.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_layout_header_bonus() {
        // "invoice" in the header region earns the bonus; the same word at
        // the bottom of the page does not.
        let header_words = vec![layout_word("Invoice", 10, 10), layout_word("filler", 10, 900)];
        let footer_words = vec![layout_word("filler", 10, 10), layout_word("Invoice", 10, 900)];
        let result = ExtractionResult::new("", "text/plain");
        let config = config_with_threshold(0.0);

        let (_, header_conf) = classify_document_from_layout(&header_words, &result, &config).unwrap();
        let (_, footer_conf) = classify_document_from_layout(&footer_words, &result, &config).unwrap();
        assert_eq!(header_conf, footer_conf, "single-type matches normalize to 1.0 either way");

        // The bonus shows up against a competing type.
        let mixed_header = vec![
            layout_word("Invoice", 10, 10),
            layout_word("report", 10, 900),
            layout_word("filler", 10, 901),
        ];
        let (best, confidence) = classify_document_from_layout(&mixed_header, &result, &config).unwrap();
        assert_eq!(best, "invoice");
        assert!(confidence > 0.5);
    }

    #[test]
    fn test_layout_empty_words() {
        let result = ExtractionResult::new("", "text/plain");
        assert!(classify_document_from_layout(&[], &result, &config_with_threshold(0.0)).is_none());
    }

    #[tokio::test]
    async fn test_auto_detect_text_mode() {
        let mut result = ExtractionResult::new("invoice number 7, bill to someone, total amount due", "text/plain");
        let config = config_with_threshold(0.5);
        auto_detect_document_type(&mut result, &config, None).await.unwrap();
        assert_eq!(result.document_type.as_deref(), Some("invoice"));
        assert!(result.document_type_confidence.unwrap() >= 0.5);
    }
}
