//! PDF conversion through Google PDFium.
//!
//! Each `PdfiumEngine` is built for one extraction profile and one document.
//! Pages are read from the text layer; in table mode the positioned text
//! segments are regrouped into lines and rendered as Markdown tables. Pages
//! whose text layer is (almost) empty are rasterized and sent to OCR when
//! the profile allows it.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::layout::{group_lines, TextRun};
use super::table_detect::{render_layout, structure_text_tables};
use super::types::{ConversionEngine, EngineFactory, ExtractionProfile, OcrEngine};
use super::ExtractionError;

/// Maximum dimension (width or height) for rendered page images.
const MAX_DIMENSION_PX: u32 = 4096;

/// Default rasterization DPI for OCR.
pub const DEFAULT_RENDER_DPI: u32 = 300;

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// A page with fewer non-whitespace characters than this is treated as
/// scanned.
const MIN_TEXT_LAYER_CHARS: usize = 20;

/// Builds one PDFium-backed engine per document.
pub struct PdfiumEngineFactory {
    library_path: Option<PathBuf>,
    ocr: Arc<dyn OcrEngine + Send + Sync>,
    dpi: u32,
}

impl PdfiumEngineFactory {
    pub fn new(
        library_path: Option<PathBuf>,
        ocr: Arc<dyn OcrEngine + Send + Sync>,
        dpi: u32,
    ) -> Self {
        Self {
            library_path,
            ocr,
            dpi,
        }
    }
}

impl EngineFactory for PdfiumEngineFactory {
    fn acquire(
        &self,
        profile: ExtractionProfile,
    ) -> Result<Box<dyn ConversionEngine>, ExtractionError> {
        let pdfium = load_pdfium(self.library_path.as_deref())?;
        debug!(
            ocr = profile.enable_ocr,
            tables = profile.enable_table_structure,
            "PDFium engine created"
        );
        Ok(Box::new(PdfiumEngine {
            pdfium,
            profile,
            ocr: Arc::clone(&self.ocr),
            dpi: self.dpi,
        }))
    }
}

/// One conversion engine configured for a single profile.
pub struct PdfiumEngine {
    pdfium: Pdfium,
    profile: ExtractionProfile,
    ocr: Arc<dyn OcrEngine + Send + Sync>,
    dpi: u32,
}

impl ConversionEngine for PdfiumEngine {
    fn convert(&mut self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(map_load_error)?;

        let mut pages_text = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let page_text = self.convert_page(&page, index)?;
            pages_text.push(page_text);
        }

        debug!(pages = pages_text.len(), "PDF converted");
        Ok(pages_text.join("\n\n"))
    }
}

impl PdfiumEngine {
    fn convert_page(&self, page: &PdfPage, index: usize) -> Result<String, ExtractionError> {
        let text_page = page.text().map_err(|e| ExtractionError::PdfRendering {
            page: index,
            reason: format!("Text layer unavailable: {e}"),
        })?;

        let native = if self.profile.enable_table_structure {
            let runs: Vec<TextRun> = text_page
                .segments()
                .iter()
                .map(|segment| {
                    let bounds = segment.bounds();
                    TextRun {
                        text: segment.text(),
                        left: bounds.left().value,
                        right: bounds.right().value,
                        top: bounds.top().value,
                        bottom: bounds.bottom().value,
                    }
                })
                .collect();
            render_layout(&group_lines(runs))
        } else {
            text_page.all()
        };

        page_text(
            native,
            self.profile,
            || self.render_page_png(page, index),
            &*self.ocr,
            index,
        )
    }

    fn render_page_png(&self, page: &PdfPage, index: usize) -> Result<Vec<u8>, ExtractionError> {
        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = compute_render_dimensions(width_points, height_points, self.dpi);

        let uncapped_w = (width_points * self.dpi as f32 / POINTS_PER_INCH) as u32;
        if target_w < uncapped_w {
            warn!(
                page = index,
                raw_width = uncapped_w,
                capped_width = target_w,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::PdfRendering {
                page: index,
                reason: format!("Rendering failed: {e}"),
            })?;

        let mut cursor = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;

        Ok(cursor.into_inner())
    }
}

/// Final text of one page: the text layer as is, or OCR of the rendered
/// page when the profile enables OCR and the text layer is too thin.
/// OCR text is restructured into tables when the profile asks for them.
fn page_text<R>(
    native: String,
    profile: ExtractionProfile,
    render: R,
    ocr: &dyn OcrEngine,
    page: usize,
) -> Result<String, ExtractionError>
where
    R: FnOnce() -> Result<Vec<u8>, ExtractionError>,
{
    if !profile.enable_ocr || !needs_ocr(&native) {
        return Ok(native);
    }

    debug!(page, "Text layer empty, falling back to OCR");
    let png = render()?;
    let recognized = ocr.ocr_png(&png)?;

    Ok(if profile.enable_table_structure {
        structure_text_tables(&recognized)
    } else {
        recognized
    })
}

/// True when a page's text layer is too thin to be a digital page.
fn needs_ocr(text: &str) -> bool {
    text.chars().filter(|c| !c.is_whitespace()).count() < MIN_TEXT_LAYER_CHARS
}

/// Check that the PDFium library can be bound, without converting anything.
pub fn probe_library(configured: Option<&Path>) -> Result<(), ExtractionError> {
    load_pdfium(configured).map(|_| ())
}

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. Configured path (file, or directory holding the platform library)
/// 2. `PDFIUM_DYNAMIC_LIB_PATH` env var
/// 3. Alongside the running executable, then `<exe_dir>/lib`
/// 4. System library search paths
fn load_pdfium(configured: Option<&Path>) -> Result<Pdfium, ExtractionError> {
    let explicit = configured
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_DYNAMIC_LIB_PATH").map(PathBuf::from));

    if let Some(path) = explicit {
        let lib_path = if path.is_dir() {
            PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(
                path.to_string_lossy().as_ref(),
            ))
        } else {
            path
        };
        debug!(path = %lib_path.display(), "Loading PDFium from explicit path");
        let bindings = Pdfium::bind_to_library(&lib_path).map_err(|e| {
            ExtractionError::EngineUnavailable(format!(
                "Failed to load PDFium from {}: {e}",
                lib_path.display()
            ))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            for dir in library_candidates(exe_dir) {
                let lib_path = Pdfium::pdfium_platform_library_name_at_path(
                    dir.to_string_lossy().as_ref(),
                );
                if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                    debug!(dir = %dir.display(), "Loaded PDFium from candidate directory");
                    return Ok(Pdfium::new(bindings));
                }
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        ExtractionError::EngineUnavailable(format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

fn library_candidates(exe_dir: &Path) -> [PathBuf; 2] {
    [exe_dir.to_path_buf(), exe_dir.join("lib")]
}

/// Map PDF load errors, detecting encrypted PDFs.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    let msg = format!("{e}");
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PdfEncrypted
    } else {
        ExtractionError::PdfParsing(format!("Failed to load PDF: {e}"))
    }
}

/// Compute pixel dimensions for rendering, clamped to [1, MAX_DIMENSION_PX]
/// with the aspect ratio preserved.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::models::DocumentKind;
    use crate::pipeline::extraction::{profile_for, MockOcrEngine};

    #[test]
    fn a4_at_300dpi() {
        let (w, h) = compute_render_dimensions(595.0, 842.0, 300);
        assert!(w > 2400 && w < 2550, "A4 width at 300dpi: got {w}");
        assert!(h > 3450 && h < 3600, "A4 height at 300dpi: got {h}");
    }

    #[test]
    fn oversized_page_capped_with_aspect_ratio() {
        let (w, h) = compute_render_dimensions(5000.0, 10000.0, 300);
        assert!(w <= MAX_DIMENSION_PX && h <= MAX_DIMENSION_PX);
        let ratio = h as f32 / w as f32;
        assert!((ratio - 2.0).abs() < 0.15, "Aspect ratio ~2:1, got {ratio}");
    }

    #[test]
    fn zero_sized_page_clamped() {
        let (w, h) = compute_render_dimensions(0.0, 0.0, 300);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn blank_page_needs_ocr() {
        assert!(needs_ocr(""));
        assert!(needs_ocr("  \n  12  \n"));
    }

    #[test]
    fn digital_page_skips_ocr() {
        assert!(!needs_ocr("LAUDO DE AVALIAÇÃO DE IMÓVEL URBANO"));
    }

    const SCHEDULE_SCAN: &str = "Serviço    Peso    Acumulado\nFundações    4,50    100,00\n";

    fn tracked_render(
        rendered: &Cell<bool>,
    ) -> impl FnOnce() -> Result<Vec<u8>, ExtractionError> + '_ {
        move || {
            rendered.set(true);
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    #[test]
    fn thin_page_kept_when_profile_disables_ocr() {
        let rendered = Cell::new(false);
        let ocr = MockOcrEngine::new("não deveria aparecer");
        let text = page_text(
            "  7 ".into(),
            profile_for(DocumentKind::PrimaryReport),
            tracked_render(&rendered),
            &ocr,
            0,
        )
        .unwrap();
        assert_eq!(text, "  7 ");
        assert!(!rendered.get());
    }

    #[test]
    fn digital_page_never_rendered() {
        let rendered = Cell::new(false);
        let ocr = MockOcrEngine::new("não deveria aparecer");
        let native = "ALVARÁ DE CONSTRUÇÃO Nº 1234/2024 - PREFEITURA MUNICIPAL";
        let text = page_text(
            native.into(),
            profile_for(DocumentKind::Permit),
            tracked_render(&rendered),
            &ocr,
            0,
        )
        .unwrap();
        assert_eq!(text, native);
        assert!(!rendered.get());
    }

    #[test]
    fn scanned_permit_returns_raw_ocr_text() {
        let rendered = Cell::new(false);
        let ocr = MockOcrEngine::new(SCHEDULE_SCAN);
        let text = page_text(
            String::new(),
            profile_for(DocumentKind::Permit),
            tracked_render(&rendered),
            &ocr,
            2,
        )
        .unwrap();
        assert!(rendered.get());
        assert_eq!(text, SCHEDULE_SCAN);
    }

    #[test]
    fn scanned_schedule_becomes_markdown_table() {
        let rendered = Cell::new(false);
        let ocr = MockOcrEngine::new(SCHEDULE_SCAN);
        let text = page_text(
            "\n".into(),
            profile_for(DocumentKind::ProgressSchedule),
            tracked_render(&rendered),
            &ocr,
            0,
        )
        .unwrap();
        assert!(rendered.get());
        assert_eq!(
            text,
            "| Serviço | Peso | Acumulado |\n| --- | --- | --- |\n| Fundações | 4,50 | 100,00 |"
        );
    }

    #[test]
    fn render_failure_stops_the_page() {
        let ocr = MockOcrEngine::new("texto");
        let err = page_text(
            String::new(),
            profile_for(DocumentKind::Permit),
            || {
                Err(ExtractionError::PdfRendering {
                    page: 3,
                    reason: "bitmap".into(),
                })
            },
            &ocr,
            3,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionError::PdfRendering { page: 3, .. }));
    }

    #[test]
    fn candidates_start_next_to_executable() {
        let dirs = library_candidates(Path::new("/opt/raefill"));
        assert_eq!(dirs[0], PathBuf::from("/opt/raefill"));
        assert_eq!(dirs[1], PathBuf::from("/opt/raefill/lib"));
    }

    #[test]
    fn missing_explicit_library_is_engine_unavailable() {
        let err = probe_library(Some(Path::new("/nonexistent/libpdfium.so"))).unwrap_err();
        assert!(matches!(err, ExtractionError::EngineUnavailable(_)));
    }
}
