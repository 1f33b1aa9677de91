use std::io::Write;
use std::process::Command;

use super::types::OcrEngine;
use super::ExtractionError;

/// Default Tesseract language pack for Brazilian documents.
pub const DEFAULT_OCR_LANGUAGE: &str = "por";

/// Tesseract driven through its command-line binary.
///
/// Each page image is written to a temp file and recognized with
/// `tesseract <image> stdout -l <language>`.
pub struct TesseractCli {
    language: String,
}

impl TesseractCli {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new(DEFAULT_OCR_LANGUAGE)
    }
}

impl OcrEngine for TesseractCli {
    fn ocr_png(&self, png_bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut image = tempfile::Builder::new()
            .prefix("raefill-page-")
            .suffix(".png")
            .tempfile()?;
        image.write_all(png_bytes)?;
        image.flush()?;

        let output = Command::new("tesseract")
            .arg(image.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let text = String::from_utf8_lossy(&output.stdout).to_string();
                tracing::debug!(
                    language = %self.language,
                    chars = text.len(),
                    "Tesseract recognized page"
                );
                Ok(text)
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ExtractionError::OcrProcessing(format!(
                    "tesseract failed: {}",
                    stderr.trim()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                ExtractionError::OcrUnavailable("tesseract not found (install tesseract-ocr)".into()),
            ),
            Err(e) => Err(ExtractionError::Io(e)),
        }
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    pub text: String,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_png(&self, _png_bytes: &[u8]) -> Result<String, ExtractionError> {
        Ok(self.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_language_is_portuguese() {
        assert_eq!(TesseractCli::default().language(), "por");
    }

    #[test]
    fn custom_language_kept() {
        assert_eq!(TesseractCli::new("por+eng").language(), "por+eng");
    }

    #[test]
    fn mock_returns_configured_text() {
        let ocr = MockOcrEngine::new("ALVARÁ DE CONSTRUÇÃO");
        assert_eq!(ocr.ocr_png(&[]).unwrap(), "ALVARÁ DE CONSTRUÇÃO");
    }
}
