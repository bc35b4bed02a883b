//! Token reduction: shrink extracted text for model consumption while
//! preserving meaning and document structure.
//!
//! Three modes: `off` (identity), `light` (whitespace and punctuation
//! normalization, HTML comment stripping, NFC), `moderate` (light plus
//! stopword removal). With `preserve_markdown`, structural lines pass through
//! verbatim. Inputs over one million characters are processed in chunks with
//! boundaries snapped to sentence ends.

mod config;
mod reducer;

pub use config::{ReductionMode, TokenReductionConfig};
pub use reducer::TokenReducer;

use crate::Result;
use crate::types::TokenReductionStats;

/// Reduce `text` according to `config`.
///
/// `language_hint` (e.g. from language detection) overrides the config hint
/// for stopword selection; both default to English.
pub fn reduce_tokens(text: &str, config: &TokenReductionConfig, language_hint: Option<&str>) -> Result<String> {
    let reducer = TokenReducer::new(config, language_hint);
    Ok(reducer.reduce(text))
}

/// Compare original and reduced text.
///
/// Ratios are `(original - reduced) / original`, 0 when the original is
/// empty. Tokens are whitespace-delimited.
pub fn get_reduction_stats(original: &str, reduced: &str) -> TokenReductionStats {
    let original_characters = original.chars().count();
    let reduced_characters = reduced.chars().count();
    let original_tokens = original.split_whitespace().count();
    let reduced_tokens = reduced.split_whitespace().count();

    let character_reduction_ratio = if original_characters > 0 {
        (original_characters as f64 - reduced_characters as f64) / original_characters as f64
    } else {
        0.0
    };
    let token_reduction_ratio = if original_tokens > 0 {
        (original_tokens as f64 - reduced_tokens as f64) / original_tokens as f64
    } else {
        0.0
    };

    TokenReductionStats {
        character_reduction_ratio,
        token_reduction_ratio,
        original_characters,
        reduced_characters,
        original_tokens,
        reduced_tokens,
    }
}
