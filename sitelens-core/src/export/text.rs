//! Plain-text quotation renderer, used when the Word document cannot be built.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use super::{export_error, DocumentRenderer, ExportFormat, RenderedDocument, DOCUMENT_TITLE};
use crate::error::Result;
use crate::format::{format_currency, format_quantity};
use crate::types::QuotationResult;

/// Renders every quotation field as plain text, without tables
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl TextRenderer {
    pub fn file_name(now: DateTime<Utc>) -> String {
        format!("construction-quotation-{}.txt", now.timestamp_millis())
    }

    pub fn render_text(quotation: &QuotationResult) -> Result<String> {
        let mut out = String::new();
        write_text(&mut out, quotation).map_err(export_error)?;
        Ok(out)
    }
}

impl DocumentRenderer for TextRenderer {
    fn render(&self, quotation: &QuotationResult, now: DateTime<Utc>) -> Result<RenderedDocument> {
        Ok(RenderedDocument {
            file_name: Self::file_name(now),
            format: ExportFormat::Text,
            bytes: Self::render_text(quotation)?.into_bytes(),
        })
    }
}

fn write_text(out: &mut String, q: &QuotationResult) -> std::fmt::Result {
    writeln!(out, "{}", DOCUMENT_TITLE)?;
    writeln!(out, "Generated: {}", q.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out)?;

    writeln!(out, "VIDEO ANALYSIS SUMMARY:")?;
    writeln!(out, "{}", q.video_summary)?;
    writeln!(out)?;

    writeln!(out, "MATERIAL BREAKDOWN:")?;
    for (i, material) in q.materials.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "{}. {}", i + 1, material.name)?;
        writeln!(
            out,
            "  Quantity: {}",
            format_quantity(material.quantity, &material.unit)
        )?;
        writeln!(out, "  Unit Price: ${}", format_currency(material.unit_price))?;
        writeln!(out, "  Total: ${}", format_currency(material.total_price))?;
        writeln!(out, "  Source: {}", material.price_source)?;
        writeln!(out, "  Updated: {}", material.last_updated.format("%Y-%m-%d"))?;
        writeln!(out, "  Confidence: {}%", material.confidence)?;
        writeln!(out, "  Description: {}", material.description)?;
    }
    writeln!(out)?;

    writeln!(
        out,
        "TOTAL MATERIAL COST: ${}",
        format_currency(q.total_cost)
    )?;

    if !q.clarification_queries.is_empty() {
        writeln!(out)?;
        writeln!(out, "CLARIFICATION QUERIES PERFORMED:")?;
        for (i, query) in q.clarification_queries.iter().enumerate() {
            writeln!(out, "{}. {}", i + 1, query)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Material;
    use chrono::TimeZone;

    fn cement_quote(queries: Vec<String>) -> QuotationResult {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        QuotationResult {
            timestamp: at,
            video_summary: "Small bathroom, tiled floor".to_string(),
            materials: vec![Material {
                name: "Cement".to_string(),
                description: "Portland, 50kg".to_string(),
                quantity: 10.0,
                unit: "bags".to_string(),
                unit_price: 8.5,
                total_price: 85.0,
                price_source: "Local supplier".to_string(),
                last_updated: at,
                confidence: 90.0,
            }],
            total_cost: 85.0,
            clarification_queries: queries,
        }
    }

    #[test]
    fn test_text_carries_all_fields() {
        let text = TextRenderer::render_text(&cement_quote(Vec::new())).unwrap();
        assert!(text.starts_with(DOCUMENT_TITLE));
        assert!(text.contains("Small bathroom, tiled floor"));
        assert!(text.contains("Quantity: 10 bags"));
        assert!(text.contains("Unit Price: $8.50"));
        assert!(text.contains("Total: $85.00"));
        assert!(text.contains("Source: Local supplier"));
        assert!(text.contains("Updated: 2025-03-01"));
        assert!(text.contains("Confidence: 90%"));
        assert!(text.contains("TOTAL MATERIAL COST: $85.00"));
        assert!(!text.contains("CLARIFICATION QUERIES PERFORMED"));
    }

    #[test]
    fn test_text_lists_clarification_queries() {
        let text = TextRenderer::render_text(&cement_quote(vec![
            "How tall is the wall?".to_string(),
            "Is the floor level?".to_string(),
        ]))
        .unwrap();
        assert!(text.contains("CLARIFICATION QUERIES PERFORMED:\n1. How tall is the wall?\n2. Is the floor level?"));
    }

    #[test]
    fn test_file_name_uses_epoch_millis() {
        let now = Utc.timestamp_millis_opt(1_740_823_200_123).unwrap();
        assert_eq!(
            TextRenderer::file_name(now),
            "construction-quotation-1740823200123.txt"
        );
    }
}
