pub mod types;
pub mod profile;
pub mod sanitize;
pub mod layout;
pub mod table_detect;
pub mod pdfium;
pub mod ocr;
pub mod orchestrator;

pub use types::*;
pub use profile::*;
pub use sanitize::*;
pub use orchestrator::*;
pub use pdfium::{probe_library, PdfiumEngineFactory, DEFAULT_RENDER_DPI};
pub use ocr::{MockOcrEngine, TesseractCli, DEFAULT_OCR_LANGUAGE};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF is password-protected or encrypted")]
    PdfEncrypted,

    #[error("Rendering page {page} failed: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Conversion engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),
}
