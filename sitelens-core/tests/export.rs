//! Integration tests for the quotation exporter

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use sitelens_core::export::{
    DocumentRenderer, ExportFormat, RenderedDocument, ReportExporter, TextRenderer,
    DOCX_CONTENT_TYPE, TEXT_CONTENT_TYPE,
};
use sitelens_core::{Error, QuotationResult, Result};
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn load_quotation() -> QuotationResult {
    let json = std::fs::read_to_string(fixture_path("quotation.json")).unwrap();
    serde_json::from_str(&json).unwrap()
}

fn export_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 2, 9, 30, 0).unwrap()
}

/// Primary renderer that always fails
struct FailingRenderer;

impl DocumentRenderer for FailingRenderer {
    fn render(&self, _: &QuotationResult, _: DateTime<Utc>) -> Result<RenderedDocument> {
        Err(Error::Export("document engine crashed".to_string()))
    }
}

#[test]
fn test_primary_export_writes_docx() {
    let dir = TempDir::new().unwrap();
    let exporter = ReportExporter::new(dir.path());

    let file = exporter.export_at(&load_quotation(), export_time()).unwrap();

    assert!(!file.fell_back);
    assert_eq!(file.format, ExportFormat::Docx);
    assert_eq!(file.content_type, DOCX_CONTENT_TYPE);
    assert_eq!(
        file.path,
        dir.path().join("construction-quotation-2025-03-02.docx")
    );
    let bytes = std::fs::read(&file.path).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn test_forced_primary_failure_falls_back_to_text() {
    let dir = TempDir::new().unwrap();
    let exporter = ReportExporter::with_renderers(
        Box::new(FailingRenderer),
        Box::new(TextRenderer),
        dir.path(),
    );

    let now = export_time();
    let file = exporter.export_at(&load_quotation(), now).unwrap();

    assert!(file.fell_back);
    assert_eq!(file.format, ExportFormat::Text);
    assert_eq!(file.content_type, TEXT_CONTENT_TYPE);
    assert_eq!(
        file.path.file_name().unwrap().to_string_lossy(),
        format!("construction-quotation-{}.txt", now.timestamp_millis())
    );

    let text = std::fs::read_to_string(&file.path).unwrap();
    assert!(text.contains("Single-storey extension with an unfinished concrete slab."));
    assert!(text.contains("Quantity: 10 bags"));
    assert!(text.contains("Unit Price: $8.50"));
    assert!(text.contains("TOTAL MATERIAL COST: $85.00"));
    assert!(text.contains("1. What is the slab thickness?"));
}

#[test]
fn test_creates_missing_output_dir() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("quotes").join("2025");
    let exporter = ReportExporter::new(&out);

    let file = exporter.export_at(&load_quotation(), export_time()).unwrap();
    assert!(file.path.starts_with(&out));
    assert!(file.path.exists());
}

#[test]
fn test_unwritable_output_falls_back_then_propagates() {
    let dir = TempDir::new().unwrap();
    // A regular file where the output directory should be
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, "not a directory").unwrap();

    let exporter = ReportExporter::new(&blocked);
    let err = exporter.export_at(&load_quotation(), export_time()).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
