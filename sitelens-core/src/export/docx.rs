//! Word document renderer (docx-rs)

use std::io::Cursor;

use chrono::{DateTime, Utc};
use docx_rs::{AlignmentType, Docx, Paragraph, Run, Table, TableCell, TableRow};

use super::{export_error, DocumentRenderer, ExportFormat, RenderedDocument, DOCUMENT_TITLE};
use crate::error::Result;
use crate::format::{format_currency, format_quantity};
use crate::types::{Material, QuotationResult};

const TITLE_COLOR: &str = "2E86AB";
const HEADING_COLOR: &str = "1B4F72";

const TABLE_HEADERS: [&str; 5] = ["#", "Material", "Quantity", "Unit Price ($)", "Total ($)"];

/// Primary renderer: titled document with a tabular material breakdown
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxRenderer;

impl DocxRenderer {
    /// Date-stamped name, e.g. `construction-quotation-2025-03-01.docx`
    pub fn file_name(now: DateTime<Utc>) -> String {
        format!("construction-quotation-{}.docx", now.format("%Y-%m-%d"))
    }

    fn build(quotation: &QuotationResult) -> Docx {
        let mut docx = Docx::new()
            .add_paragraph(
                Paragraph::new()
                    .add_run(
                        Run::new()
                            .add_text(DOCUMENT_TITLE)
                            .bold()
                            .size(32)
                            .color(TITLE_COLOR),
                    )
                    .align(AlignmentType::Center),
            )
            .add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text("Generated: ").bold())
                    .add_run(
                        Run::new().add_text(
                            quotation
                                .timestamp
                                .format("%Y-%m-%d %H:%M:%S UTC")
                                .to_string(),
                        ),
                    ),
            )
            .add_paragraph(heading("Video Analysis Summary"));

        for line in quotation.video_summary.lines() {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line).size(22)));
        }

        docx.add_paragraph(heading("Material Breakdown"))
            .add_table(material_table(&quotation.materials))
            .add_paragraph(
                Paragraph::new()
                    .add_run(
                        Run::new()
                            .add_text(format!(
                                "TOTAL MATERIAL COST: ${}",
                                format_currency(quotation.total_cost)
                            ))
                            .bold()
                            .size(28)
                            .color(HEADING_COLOR),
                    )
                    .align(AlignmentType::Center),
            )
    }
}

impl DocumentRenderer for DocxRenderer {
    fn render(&self, quotation: &QuotationResult, now: DateTime<Utc>) -> Result<RenderedDocument> {
        let mut buffer = Cursor::new(Vec::new());
        Self::build(quotation)
            .build()
            .pack(&mut buffer)
            .map_err(export_error)?;

        Ok(RenderedDocument {
            file_name: Self::file_name(now),
            format: ExportFormat::Docx,
            bytes: buffer.into_inner(),
        })
    }
}

fn heading(text: &str) -> Paragraph {
    Paragraph::new().add_run(
        Run::new()
            .add_text(text)
            .bold()
            .size(24)
            .color(HEADING_COLOR),
    )
}

fn cell(text: impl Into<String>, bold: bool) -> TableCell {
    let mut run = Run::new().add_text(text.into()).size(20);
    if bold {
        run = run.bold();
    }
    TableCell::new().add_paragraph(Paragraph::new().add_run(run).align(AlignmentType::Center))
}

fn material_table(materials: &[Material]) -> Table {
    let header = TableRow::new(TABLE_HEADERS.iter().map(|h| cell(*h, true)).collect());

    let rows = materials.iter().enumerate().map(|(i, m)| {
        let name_cell = TableCell::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text(m.name.as_str()).bold().size(20)))
            .add_paragraph(
                Paragraph::new().add_run(Run::new().add_text(m.description.as_str()).size(18)),
            );

        TableRow::new(vec![
            cell((i + 1).to_string(), false),
            name_cell,
            cell(format_quantity(m.quantity, &m.unit), false),
            cell(format_currency(m.unit_price), false),
            cell(format_currency(m.total_price), true),
        ])
    });

    Table::new(std::iter::once(header).chain(rows).collect())
}
