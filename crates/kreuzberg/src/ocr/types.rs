use serde::{Deserialize, Serialize};

/// Tesseract page segmentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PsmMode {
    OsdOnly = 0,
    AutoOsd = 1,
    AutoOnly = 2,
    #[default]
    Auto = 3,
    SingleColumn = 4,
    SingleBlockVertText = 5,
    SingleBlock = 6,
    SingleLine = 7,
    SingleWord = 8,
    CircleWord = 9,
    SingleChar = 10,
    SparseText = 11,
    SparseTextOsd = 12,
    RawLine = 13,
}

impl PsmMode {
    pub fn from_u8(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(PsmMode::OsdOnly),
            1 => Ok(PsmMode::AutoOsd),
            2 => Ok(PsmMode::AutoOnly),
            3 => Ok(PsmMode::Auto),
            4 => Ok(PsmMode::SingleColumn),
            5 => Ok(PsmMode::SingleBlockVertText),
            6 => Ok(PsmMode::SingleBlock),
            7 => Ok(PsmMode::SingleLine),
            8 => Ok(PsmMode::SingleWord),
            9 => Ok(PsmMode::CircleWord),
            10 => Ok(PsmMode::SingleChar),
            11 => Ok(PsmMode::SparseText),
            12 => Ok(PsmMode::SparseTextOsd),
            13 => Ok(PsmMode::RawLine),
            _ => Err(format!("Invalid PSM mode value: {}", value)),
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Requested Tesseract output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Tsv,
    Hocr,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Hocr => "hocr",
        }
    }

    /// Extension Tesseract appends to the output base.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Hocr => "hocr",
        }
    }
}

/// Configuration for the subprocess Tesseract backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Language code(s), `+`-joined (e.g. "eng", "eng+deu").
    pub language: String,

    pub psm: PsmMode,

    pub output_format: OutputFormat,

    /// Reconstruct tables from word geometry. Forces TSV output internally.
    pub enable_table_detection: bool,

    /// Words below this confidence are dropped from table reconstruction.
    pub table_min_confidence: f64,

    /// Pixel gap separating column clusters.
    pub table_column_threshold: i32,

    /// Row threshold as a ratio of mean word height.
    pub table_row_threshold_ratio: f64,

    pub use_cache: bool,

    /// Subprocess deadline; the process is killed when exceeded.
    pub timeout_secs: u64,

    // Boolean engine variables passed as `-c key=0|1`.
    pub classify_use_pre_adapted_templates: bool,
    pub language_model_ngram_on: bool,
    pub tessedit_dont_blkrej_good_wds: bool,
    pub tessedit_dont_rowrej_good_wds: bool,
    pub tessedit_enable_dict_correction: bool,
    pub tessedit_use_primary_params_model: bool,
    pub textord_space_size_is_variable: bool,
    pub thresholding_method: bool,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            psm: PsmMode::Auto,
            output_format: OutputFormat::Text,
            enable_table_detection: true,
            table_min_confidence: 30.0,
            table_column_threshold: 20,
            table_row_threshold_ratio: 0.5,
            use_cache: true,
            timeout_secs: 120,
            classify_use_pre_adapted_templates: true,
            language_model_ngram_on: false,
            tessedit_dont_blkrej_good_wds: true,
            tessedit_dont_rowrej_good_wds: true,
            tessedit_enable_dict_correction: true,
            tessedit_use_primary_params_model: true,
            textord_space_size_is_variable: true,
            thresholding_method: false,
        }
    }
}

impl TesseractConfig {
    /// The boolean engine variables as `(name, value)` pairs, in argv order.
    pub fn engine_variables(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("classify_use_pre_adapted_templates", self.classify_use_pre_adapted_templates),
            ("language_model_ngram_on", self.language_model_ngram_on),
            ("tessedit_dont_blkrej_good_wds", self.tessedit_dont_blkrej_good_wds),
            ("tessedit_dont_rowrej_good_wds", self.tessedit_dont_rowrej_good_wds),
            ("tessedit_enable_dict_correction", self.tessedit_enable_dict_correction),
            ("tessedit_use_primary_params_model", self.tessedit_use_primary_params_model),
            ("textord_space_size_is_variable", self.textord_space_size_is_variable),
            ("thresholding_method", self.thresholding_method),
        ]
    }

    /// Sorted key=value items entering the OCR cache key.
    pub fn cache_items(&self) -> Vec<(String, String)> {
        let mut items = vec![
            ("language".to_string(), self.language.clone()),
            ("psm".to_string(), self.psm.as_u8().to_string()),
            ("output_format".to_string(), self.output_format.as_str().to_string()),
            ("enable_table_detection".to_string(), self.enable_table_detection.to_string()),
            ("table_min_confidence".to_string(), self.table_min_confidence.to_string()),
            ("table_column_threshold".to_string(), self.table_column_threshold.to_string()),
            (
                "table_row_threshold_ratio".to_string(),
                self.table_row_threshold_ratio.to_string(),
            ),
        ];
        for (name, value) in self.engine_variables() {
            items.push((name.to_string(), value.to_string()));
        }
        items.sort();
        items
    }
}

/// Configuration accepted by the EasyOCR backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EasyOcrConfig {
    pub language: String,
    pub use_gpu: bool,
}

impl Default for EasyOcrConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            use_gpu: false,
        }
    }
}

/// Configuration accepted by the PaddleOCR backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddleOcrConfig {
    pub language: String,
    pub use_gpu: bool,
}

impl Default for PaddleOcrConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            use_gpu: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psm_roundtrip() {
        for value in 0..=13u8 {
            let mode = PsmMode::from_u8(value).unwrap();
            assert_eq!(mode.as_u8(), value);
        }
        assert!(PsmMode::from_u8(14).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = TesseractConfig::default();
        assert_eq!(config.language, "eng");
        assert_eq!(config.psm, PsmMode::Auto);
        assert_eq!(config.table_min_confidence, 30.0);
        assert_eq!(config.table_column_threshold, 20);
        assert_eq!(config.table_row_threshold_ratio, 0.5);
        assert!(config.use_cache);
    }

    #[test]
    fn test_cache_items_sorted_and_sensitive() {
        let a = TesseractConfig::default().cache_items();
        let sorted = {
            let mut copy = a.clone();
            copy.sort();
            copy
        };
        assert_eq!(a, sorted);

        let b = TesseractConfig {
            psm: PsmMode::SingleBlock,
            ..Default::default()
        }
        .cache_items();
        assert_ne!(a, b);
    }

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::Text.extension(), "txt");
        assert_eq!(OutputFormat::Tsv.extension(), "tsv");
        assert_eq!(OutputFormat::Hocr.extension(), "hocr");
    }
}
