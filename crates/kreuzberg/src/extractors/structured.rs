//! Structured-data extractor: JSON and TOML documents flattened to text.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::core::io::safe_decode;
use crate::error::KreuzbergError;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::ExtractionResult;
use async_trait::async_trait;

#[derive(Default)]
pub struct StructuredExtractor;

impl StructuredExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn flatten_value(prefix: &str, value: &serde_json::Value, lines: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() { key.clone() } else { format!("{}.{}", prefix, key) };
                flatten_value(&path, child, lines);
            }
        }
        serde_json::Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_value(&format!("{}[{}]", prefix, index), child, lines);
            }
        }
        serde_json::Value::String(s) => lines.push(format!("{}: {}", prefix, s)),
        other => lines.push(format!("{}: {}", prefix, other)),
    }
}

impl Plugin for StructuredExtractor {
    fn name(&self) -> &str {
        "structured-extractor"
    }
}

#[async_trait]
impl DocumentExtractor for StructuredExtractor {
    async fn extract_bytes(&self, content: &[u8], mime_type: &str, _config: &ExtractionConfig) -> Result<ExtractionResult> {
        let text = safe_decode(content);

        let value: serde_json::Value = match mime_type {
            "application/toml" => toml::from_str(&text)
                .map_err(|e| KreuzbergError::parsing(format!("Invalid TOML document: {}", e)))?,
            _ => serde_json::from_str(&text)
                .map_err(|e| KreuzbergError::parsing(format!("Invalid JSON document: {}", e)))?,
        };

        let mut lines = Vec::new();
        flatten_value("", &value, &mut lines);

        let mut result = ExtractionResult::new(lines.join("\n"), "text/plain");
        result
            .metadata
            .additional
            .insert("field_count".to_string(), serde_json::json!(lines.len()));
        Ok(result)
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["application/json", "application/toml"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_flattened() {
        let extractor = StructuredExtractor::new();
        let config = ExtractionConfig::default();
        let json = br#"{"title": "Report", "meta": {"pages": 3}, "tags": ["a", "b"]}"#;
        let result = extractor.extract_bytes(json, "application/json", &config).await.unwrap();

        assert!(result.content.contains("title: Report"));
        assert!(result.content.contains("meta.pages: 3"));
        assert!(result.content.contains("tags[0]: a"));
        assert_eq!(result.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_toml_flattened() {
        let extractor = StructuredExtractor::new();
        let config = ExtractionConfig::default();
        let toml_doc = b"title = \"Config\"\n[server]\nport = 8080\n";
        let result = extractor.extract_bytes(toml_doc, "application/toml", &config).await.unwrap();

        assert!(result.content.contains("title: Config"));
        assert!(result.content.contains("server.port: 8080"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_parsing_error() {
        let extractor = StructuredExtractor::new();
        let config = ExtractionConfig::default();
        let result = extractor.extract_bytes(b"{broken", "application/json", &config).await;
        assert!(matches!(result, Err(KreuzbergError::Parsing { .. })));
    }
}
