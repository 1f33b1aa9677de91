use std::sync::{Arc, Mutex};

use super::profile::profile_for;
use super::sanitize::{cap_text, normalize_text, DEFAULT_DOCUMENT_CHAR_CAP};
use super::types::{ConversionEngine, EngineFactory, ExtractedText, TextExtractor};
use super::ExtractionError;
use crate::models::{DocumentKind, SourceDocument};

/// Concrete text extractor.
/// Engines come from an injected factory, one per document.
pub struct DocumentExtractor {
    factory: Box<dyn EngineFactory + Send + Sync>,
    max_chars: usize,
}

impl DocumentExtractor {
    pub fn new(factory: Box<dyn EngineFactory + Send + Sync>) -> Self {
        Self {
            factory,
            max_chars: DEFAULT_DOCUMENT_CHAR_CAP,
        }
    }

    /// Override the per-document character cap.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

/// Scoped ownership of one conversion engine.
///
/// The engine is dropped with the lease, on success and on every error path.
struct EngineLease {
    kind: DocumentKind,
    engine: Box<dyn ConversionEngine>,
}

impl EngineLease {
    fn acquire(
        factory: &dyn EngineFactory,
        kind: DocumentKind,
    ) -> Result<Self, ExtractionError> {
        let engine = factory.acquire(profile_for(kind))?;
        tracing::debug!(kind = kind.as_str(), "Conversion engine leased");
        Ok(Self { kind, engine })
    }

    fn convert(&mut self, bytes: &[u8]) -> Result<String, ExtractionError> {
        self.engine.convert(bytes)
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        tracing::debug!(kind = self.kind.as_str(), "Conversion engine released");
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, doc: SourceDocument) -> Result<ExtractedText, ExtractionError> {
        let kind = doc.kind;
        tracing::info!(
            kind = kind.as_str(),
            bytes = doc.bytes.len(),
            "Starting text extraction"
        );

        let raw = {
            let mut lease = EngineLease::acquire(&*self.factory, kind)?;
            lease.convert(&doc.bytes)?
        };
        drop(doc);

        let normalized = normalize_text(&raw);
        let (text, truncated) = cap_text(&normalized, self.max_chars);

        tracing::info!(
            kind = kind.as_str(),
            chars = text.chars().count(),
            truncated,
            "Text extraction complete"
        );

        Ok(ExtractedText {
            kind,
            text,
            truncated,
        })
    }
}

// ── Mocks for testing ─────────────────────────────────────

/// Counts engine lifecycles so tests can check the lease discipline.
#[derive(Debug, Default)]
pub struct EngineLedger {
    pub acquired: usize,
    pub released: usize,
}

/// Mock engine factory returning canned text, or failing on conversion.
pub struct MockEngineFactory {
    text: String,
    fail: bool,
    ledger: Arc<Mutex<EngineLedger>>,
}

impl MockEngineFactory {
    pub fn returning(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fail: false,
            ledger: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            text: String::new(),
            fail: true,
            ledger: Arc::default(),
        }
    }

    pub fn ledger(&self) -> Arc<Mutex<EngineLedger>> {
        Arc::clone(&self.ledger)
    }
}

struct MockEngine {
    text: String,
    fail: bool,
    ledger: Arc<Mutex<EngineLedger>>,
}

impl ConversionEngine for MockEngine {
    fn convert(&mut self, _bytes: &[u8]) -> Result<String, ExtractionError> {
        if self.fail {
            return Err(ExtractionError::PdfParsing("mock conversion failure".into()));
        }
        Ok(self.text.clone())
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.released += 1;
        }
    }
}

impl EngineFactory for MockEngineFactory {
    fn acquire(
        &self,
        _profile: super::types::ExtractionProfile,
    ) -> Result<Box<dyn ConversionEngine>, ExtractionError> {
        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.acquired += 1;
        }
        Ok(Box::new(MockEngine {
            text: self.text.clone(),
            fail: self.fail,
            ledger: Arc::clone(&self.ledger),
        }))
    }
}
