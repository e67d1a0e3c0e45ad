//! Quotation export
//!
//! A [`ReportExporter`] holds an ordered pair of renderers sharing one input
//! contract. The primary renderer (Word document) is tried first; any
//! failure while rendering or writing it falls back to the plain-text
//! renderer. A fallback failure is returned to the caller.

mod docx;
mod text;

pub use docx::DocxRenderer;
pub use text::TextRenderer;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::types::QuotationResult;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

pub const DOCUMENT_TITLE: &str = "CONSTRUCTION MATERIAL QUOTATION";

/// Output format of a rendered document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Docx,
    Text,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Docx => DOCX_CONTENT_TYPE,
            ExportFormat::Text => TEXT_CONTENT_TYPE,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Docx => "docx",
            ExportFormat::Text => "txt",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// In-memory document ready to be written
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub file_name: String,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

impl RenderedDocument {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Renders a quotation into a document
pub trait DocumentRenderer: Send + Sync {
    /// `now` drives the output file name
    fn render(&self, quotation: &QuotationResult, now: DateTime<Utc>) -> Result<RenderedDocument>;
}

/// A document written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub content_type: &'static str,
    /// True when the primary renderer failed and the fallback produced this file
    pub fell_back: bool,
}

pub struct ReportExporter {
    primary: Box<dyn DocumentRenderer>,
    fallback: Box<dyn DocumentRenderer>,
    output_dir: PathBuf,
}

impl ReportExporter {
    /// Word document first, plain text as fallback
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_renderers(
            Box::new(DocxRenderer),
            Box::new(TextRenderer),
            output_dir,
        )
    }

    pub fn with_renderers(
        primary: Box<dyn DocumentRenderer>,
        fallback: Box<dyn DocumentRenderer>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            primary,
            fallback,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn export(&self, quotation: &QuotationResult) -> Result<ExportedFile> {
        self.export_at(quotation, Utc::now())
    }

    /// Export with an explicit clock
    pub fn export_at(
        &self,
        quotation: &QuotationResult,
        now: DateTime<Utc>,
    ) -> Result<ExportedFile> {
        match self.write_with(self.primary.as_ref(), quotation, now) {
            Ok(file) => Ok(file),
            Err(e) => {
                tracing::warn!(error = %e, "Primary export failed, falling back to plain text");
                let mut file = self.write_with(self.fallback.as_ref(), quotation, now)?;
                file.fell_back = true;
                Ok(file)
            }
        }
    }

    fn write_with(
        &self,
        renderer: &dyn DocumentRenderer,
        quotation: &QuotationResult,
        now: DateTime<Utc>,
    ) -> Result<ExportedFile> {
        let document = renderer.render(quotation, now)?;

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(&document.file_name);
        std::fs::write(&path, &document.bytes)?;

        tracing::info!(
            path = %path.display(),
            format = %document.format,
            size_bytes = document.bytes.len(),
            "Quotation exported"
        );

        Ok(ExportedFile {
            path,
            format: document.format,
            content_type: document.content_type(),
            fell_back: false,
        })
    }
}

pub(crate) fn export_error(e: impl fmt::Display) -> Error {
    Error::Export(e.to_string())
}
