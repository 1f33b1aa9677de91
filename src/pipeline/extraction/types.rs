use serde::Serialize;

use super::ExtractionError;
use crate::models::{DocumentKind, SourceDocument};

/// Per-kind switches for the document-understanding engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractionProfile {
    pub enable_ocr: bool,
    pub enable_table_structure: bool,
}

/// Normalized, length-capped text of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedText {
    pub kind: DocumentKind,
    pub text: String,
    pub truncated: bool,
}

/// One conversion engine instance, configured for a single profile.
///
/// Instances are short-lived: one per document, dropped right after
/// the text is obtained.
pub trait ConversionEngine {
    /// Convert raw document bytes into layout-aware, Markdown-like text.
    fn convert(&mut self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Produces fresh conversion engines (allows mocking for tests).
pub trait EngineFactory {
    fn acquire(
        &self,
        profile: ExtractionProfile,
    ) -> Result<Box<dyn ConversionEngine>, ExtractionError>;
}

/// OCR engine abstraction (allows mocking for tests).
pub trait OcrEngine {
    /// Recognize text in a PNG-encoded page image.
    fn ocr_png(&self, png_bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Main extraction trait used by the pipeline orchestrator.
pub trait TextExtractor {
    fn extract(&self, doc: SourceDocument) -> Result<ExtractedText, ExtractionError>;
}
