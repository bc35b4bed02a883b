//! End-to-end extraction flows over the public API.

use kreuzberg::{ExtractionConfig, KreuzbergError, extract_bytes, extract_bytes_sync, extract_file};
use std::fs::File;
use std::io::Write;
use tempfile::tempdir;

fn no_cache_config() -> ExtractionConfig {
    ExtractionConfig {
        use_cache: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_plain_text_round_trip() {
    let result = extract_bytes(b"Hello world.", "text/plain", &ExtractionConfig::default()).await.unwrap();

    assert_eq!(result.content, "Hello world.");
    assert_eq!(result.mime_type, "text/plain");
    assert!(result.chunks.is_empty());
}

#[tokio::test]
async fn test_markdown_file_extraction() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.md");
    File::create(&path).unwrap().write_all(b"# Notes\n\nSome body text.\n").unwrap();

    let result = extract_file(&path, None, &no_cache_config()).await.unwrap();
    assert_eq!(result.mime_type, "text/markdown");
    assert!(result.content.contains("# Notes"));
}

#[tokio::test]
async fn test_json_extraction() {
    let result = extract_bytes(
        br#"{"title": "Quarterly Report", "pages": 12}"#,
        "application/json",
        &no_cache_config(),
    )
    .await
    .unwrap();

    assert!(result.content.contains("title: Quarterly Report"));
    assert!(result.content.contains("pages: 12"));
}

#[tokio::test]
async fn test_unknown_type_raw_decode() {
    let result = extract_bytes(b"opaque payload", "application/x-mystery", &no_cache_config()).await.unwrap();
    assert_eq!(result.content, "opaque payload");
    assert_eq!(result.mime_type, "text/plain");
}

#[tokio::test]
async fn test_invalid_mime_rejected() {
    let result = extract_bytes(b"x", "garbage", &no_cache_config()).await;
    assert!(matches!(result, Err(KreuzbergError::Validation { .. })));
}

#[tokio::test]
async fn test_missing_file_is_validation_error() {
    let result = extract_file("/definitely/not/here.txt", None, &no_cache_config()).await;
    assert!(matches!(result, Err(KreuzbergError::Validation { .. })));
}

#[tokio::test]
async fn test_determinism_without_cache() {
    let config = no_cache_config();
    let payload = b"Determinism check content.";

    let first = extract_bytes(payload, "text/plain", &config).await.unwrap();
    let second = extract_bytes(payload, "text/plain", &config).await.unwrap();
    assert_eq!(first.content, second.content);
}

#[tokio::test]
async fn test_determinism_with_cache() {
    // Unique content so previous test runs cannot interfere.
    let payload = format!(
        "cached determinism {} {:?}",
        std::process::id(),
        std::time::SystemTime::now()
    );
    let config = ExtractionConfig::default();

    let first = extract_bytes(payload.as_bytes(), "text/plain", &config).await.unwrap();
    let second = extract_bytes(payload.as_bytes(), "text/plain", &config).await.unwrap();
    assert_eq!(first.content, second.content);
    assert_eq!(first.content, payload);
}

#[test]
fn test_sync_surface_matches_async() {
    let result = extract_bytes_sync(b"sync payload", "text/plain", &no_cache_config()).unwrap();
    assert_eq!(result.content, "sync payload");
}

#[tokio::test]
async fn test_feature_stages_end_to_end() {
    let config = ExtractionConfig {
        use_cache: false,
        chunk_content: true,
        max_chars: 80,
        max_overlap: 10,
        extract_entities: true,
        extract_keywords: true,
        keyword_count: 5,
        auto_detect_language: true,
        ..Default::default()
    };

    let content = "Contact support@example.com about machine learning models. \
                   The quarterly analysis covers natural language processing systems. "
        .repeat(3);
    let result = extract_bytes(content.as_bytes(), "text/plain", &config).await.unwrap();

    assert!(result.chunks.len() > 1);
    assert!(result.entities.as_ref().unwrap().iter().any(|e| e.entity_type == "EMAIL"));
    assert!(!result.keywords.as_ref().unwrap().is_empty());
    assert_eq!(result.detected_languages.as_ref().unwrap()[0], "eng");
    assert!(result.metadata.processing_errors.is_empty());
}

#[tokio::test]
async fn test_document_classification_end_to_end() {
    let config = ExtractionConfig {
        use_cache: false,
        auto_detect_document_type: true,
        document_type_confidence_threshold: 0.5,
        ..Default::default()
    };

    let invoice = b"INVOICE\nInvoice Number: INV-001\nBill To: Example GmbH\nTotal Amount: 99.00 EUR\nTax ID: DE123";
    let result = extract_bytes(invoice, "text/plain", &config).await.unwrap();

    assert_eq!(result.document_type.as_deref(), Some("invoice"));
    assert!(result.document_type_confidence.unwrap() >= 0.5);
}

#[tokio::test]
async fn test_empty_input() {
    let result = extract_bytes(b"", "text/plain", &no_cache_config()).await.unwrap();
    assert_eq!(result.content, "");
}
