use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reduction strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReductionMode {
    #[default]
    Off,
    Light,
    Moderate,
}

impl ReductionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReductionMode::Off => "off",
            ReductionMode::Light => "light",
            ReductionMode::Moderate => "moderate",
        }
    }
}

impl From<&str> for ReductionMode {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "light" => ReductionMode::Light,
            "moderate" => ReductionMode::Moderate,
            _ => ReductionMode::Off,
        }
    }
}

/// Token reduction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TokenReductionConfig {
    #[serde(default)]
    pub mode: ReductionMode,

    /// Pass Markdown structural lines (headers, lists, tables, fenced code)
    /// through verbatim.
    #[serde(default)]
    pub preserve_markdown: bool,

    /// ISO language code used for stopword selection when the pipeline has
    /// not detected one.
    #[serde(default)]
    pub language_hint: Option<String>,

    /// Extra stopwords per language, merged over the embedded tables.
    #[serde(default)]
    pub custom_stopwords: Option<HashMap<String, Vec<String>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!(ReductionMode::from("light"), ReductionMode::Light);
        assert_eq!(ReductionMode::from("MODERATE"), ReductionMode::Moderate);
        assert_eq!(ReductionMode::from("off"), ReductionMode::Off);
        assert_eq!(ReductionMode::from("bogus"), ReductionMode::Off);
    }

    #[test]
    fn test_default_is_off() {
        let config = TokenReductionConfig::default();
        assert_eq!(config.mode, ReductionMode::Off);
        assert!(!config.preserve_markdown);
        assert!(config.custom_stopwords.is_none());
    }
}
