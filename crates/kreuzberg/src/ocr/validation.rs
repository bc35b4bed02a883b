//! Language and version gates for the Tesseract backend.

use super::error::OcrError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Minimum supported Tesseract major version.
pub const MINIMAL_SUPPORTED_TESSERACT_VERSION: u32 = 5;

/// Language codes shipped with Tesseract 5 traineddata.
pub static TESSERACT_SUPPORTED_LANGUAGES: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    BTreeSet::from([
        "afr", "amh", "ara", "asm", "aze", "aze_cyrl", "bel", "ben", "bod", "bos", "bre", "bul", "cat", "ceb", "ces",
        "chi_sim", "chi_tra", "chr", "cos", "cym", "dan", "dan_frak", "deu", "deu_frak", "deu_latf", "div", "dzo",
        "ell", "eng", "enm", "epo", "equ", "est", "eus", "fao", "fas", "fil", "fin", "fra", "frk", "frm", "fry", "gla",
        "gle", "glg", "grc", "guj", "hat", "heb", "hin", "hrv", "hun", "hye", "iku", "ind", "isl", "ita", "ita_old",
        "jav", "jpn", "kan", "kat", "kat_old", "kaz", "khm", "kir", "kmr", "kor", "kor_vert", "kur", "lao", "lat",
        "lav", "lit", "ltz", "mal", "mar", "mkd", "mlt", "mon", "mri", "msa", "mya", "nep", "nld", "nor", "oci", "ori",
        "osd", "pan", "pol", "por", "pus", "que", "ron", "rus", "san", "sin", "slk", "slk_frak", "slv", "snd", "spa",
        "spa_old", "sqi", "srp", "srp_latn", "sun", "swa", "swe", "syr", "tam", "tat", "tel", "tgk", "tgl", "tha",
        "tir", "ton", "tur", "uig", "ukr", "urd", "uzb", "uzb_cyrl", "vie", "yid", "yor",
    ])
});

/// Normalize a language argument to Tesseract form.
///
/// The input may be any case and may join several codes with `+`. Every part
/// is lowercased and checked against the allow-list; the first unknown part
/// fails with the offending code and the full list.
pub fn validate_language_code(lang_code: &str) -> Result<String, OcrError> {
    let normalized = lang_code.to_lowercase();
    for part in normalized.split('+') {
        if !TESSERACT_SUPPORTED_LANGUAGES.contains(part) {
            let supported: Vec<&str> = TESSERACT_SUPPORTED_LANGUAGES.iter().copied().collect();
            return Err(OcrError::InvalidLanguage(format!(
                "'{}' is not supported by Tesseract. Supported languages: {}",
                part,
                supported.join(",")
            )));
        }
    }
    Ok(normalized)
}

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"tesseract\s+v?(\d+)\.(\d+)\.(\d+)").expect("version pattern compiles"));

/// Parse `tesseract --version` output into `(major, minor, patch)`.
pub fn parse_tesseract_version(output: &str) -> Option<(u32, u32, u32)> {
    let caps = VERSION_PATTERN.captures(output)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    let patch = caps.get(3)?.as_str().parse().ok()?;
    Some((major, minor, patch))
}

pub fn validate_tesseract_version(major: u32) -> Result<(), OcrError> {
    if major < MINIMAL_SUPPORTED_TESSERACT_VERSION {
        return Err(OcrError::UnsupportedVersion(format!(
            "Tesseract {} found; version {} or above is required",
            major, MINIMAL_SUPPORTED_TESSERACT_VERSION
        )));
    }
    Ok(())
}
