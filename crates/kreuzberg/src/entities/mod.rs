//! Entity extraction.
//!
//! Pattern-based extraction over built-in types (email, URL, phone, date,
//! money) plus caller-supplied `(entity_type, regex)` pairs. Spans are byte
//! offsets into the content. Model-based NER is an external collaborator and
//! is not bundled.

use crate::error::{KreuzbergError, Result};
use crate::types::Entity;
use once_cell::sync::Lazy;
use regex::Regex;

static BUILTIN_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("EMAIL", r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}"),
        ("URL", r"https?://[^\s<>\)\]]+"),
        ("PHONE", r"\+?\d[\d\s().-]{7,}\d"),
        ("DATE", r"\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}/\d{1,2}/\d{2,4}\b"),
        ("MONEY", r"[$€£¥]\s?\d[\d,]*(?:\.\d+)?|\b\d[\d,]*(?:\.\d+)?\s?(?:USD|EUR|GBP)\b"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("built-in entity pattern compiles")))
    .collect()
});

/// Extract entities from `content`.
///
/// Custom patterns run after the built-ins; overlapping matches are all
/// reported, in span order.
pub fn extract_entities(content: &str, custom_patterns: Option<&[(String, String)]>) -> Result<Vec<Entity>> {
    let mut entities = Vec::new();

    for (entity_type, pattern) in BUILTIN_PATTERNS.iter() {
        collect_matches(content, entity_type, pattern, &mut entities);
    }

    if let Some(patterns) = custom_patterns {
        for (entity_type, pattern) in patterns {
            let compiled = Regex::new(pattern).map_err(|e| {
                KreuzbergError::validation(format!("Invalid custom entity pattern for '{}': {}", entity_type, e))
            })?;
            collect_matches(content, entity_type, &compiled, &mut entities);
        }
    }

    entities.sort_by_key(|e| (e.start, e.end));
    Ok(entities)
}

fn collect_matches(content: &str, entity_type: &str, pattern: &Regex, entities: &mut Vec<Entity>) {
    for found in pattern.find_iter(content) {
        entities.push(Entity {
            entity_type: entity_type.to_string(),
            text: found.as_str().to_string(),
            start: found.start(),
            end: found.end(),
        });
    }
}
