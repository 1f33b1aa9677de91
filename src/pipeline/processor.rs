//! Pipeline orchestrator.
//!
//! Drives one run end to end:
//! extract (per document, in kind order) → assemble → infer → map → serialize.
//!
//! Every engine sits behind a trait, so the orchestrator is fully testable
//! with mock implementations. Stages run strictly one after another; a
//! stage's heavy resources are gone before the next stage starts.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::config::{InferenceBackend, Settings};
use crate::models::{DocumentKind, Submission};
use crate::pipeline::context::assemble;
use crate::pipeline::extraction::{
    DocumentExtractor, ExtractionError, PdfiumEngineFactory, TesseractCli, TextExtractor,
};
use crate::pipeline::mapping::{OutputState, SchemaMapper, TemplateProfile};
use crate::pipeline::structuring::{
    GeminiClient, InferenceError, LlmClient, OllamaClient, RecordExtractor, StructuredExtractor,
};
use crate::pipeline::workbook::{OutputSerializer, WorkbookError};
use crate::registry::ProfessionalRegistry;

// ---------------------------------------------------------------------------
// States and errors
// ---------------------------------------------------------------------------

/// Where a run is. `Failed` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "document", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Extracting(DocumentKind),
    Assembling,
    Inferring,
    Mapping,
    Serialized,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Serialized | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Extracting(kind) => write!(f, "extracting {}", kind.label()),
            Self::Assembling => write!(f, "assembling context"),
            Self::Inferring => write!(f, "inferring"),
            Self::Mapping => write!(f, "mapping"),
            Self::Serialized => write!(f, "serialized"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Run-time causes of a failed run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Professional '{0}' is not in the registry")]
    UnknownProfessional(String),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Workbook serialization failed: {0}")]
    Workbook(#[from] WorkbookError),
}

/// Terminal report of a failed run: the stage it was in and why.
#[derive(Debug, thiserror::Error)]
#[error("Run failed while {stage}: {cause}")]
pub struct PipelineFailure {
    pub stage: PipelineState,
    #[source]
    pub cause: PipelineError,
}

impl PipelineFailure {
    /// One human-readable line for the operator.
    pub fn user_message(&self) -> String {
        match (&self.stage, &self.cause) {
            (_, PipelineError::UnknownProfessional(name)) => {
                format!("Unknown professional '{name}'. Check the registry file.")
            }
            (PipelineState::Extracting(kind), PipelineError::Extraction(e)) => {
                format!("Could not read the {} document: {e}", kind.label())
            }
            (_, PipelineError::Inference(InferenceError::Exhausted { attempts, last })) => {
                format!("The inference service gave no usable answer after {attempts} attempts ({last}).")
            }
            (_, PipelineError::Inference(e)) => format!("Inference failed: {e}"),
            (_, PipelineError::Workbook(e)) => format!("Could not write the workbook: {e}"),
            (stage, cause) => format!("Run failed while {stage}: {cause}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Receives every state transition of a run.
pub trait StageObserver {
    fn transition(&self, from: PipelineState, to: PipelineState);
}

/// Default observer: one log line per transition.
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn transition(&self, from: PipelineState, to: PipelineState) {
        if to == PipelineState::Failed {
            tracing::warn!(%from, "Pipeline failed");
        } else {
            tracing::info!(%from, %to, "Pipeline stage");
        }
    }
}

/// State of one in-flight run.
struct RunTracker<'a> {
    state: PipelineState,
    observer: &'a dyn StageObserver,
}

impl<'a> RunTracker<'a> {
    fn new(observer: &'a dyn StageObserver) -> Self {
        Self {
            state: PipelineState::Idle,
            observer,
        }
    }

    fn advance(&mut self, to: PipelineState) {
        self.observer.transition(self.state, to);
        self.state = to;
    }

    fn fail(&mut self, cause: impl Into<PipelineError>) -> PipelineFailure {
        let stage = self.state;
        self.advance(PipelineState::Failed);
        PipelineFailure {
            stage,
            cause: cause.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    extractor: Box<dyn TextExtractor + Send + Sync>,
    inference: Box<dyn RecordExtractor + Send + Sync>,
    mapper: SchemaMapper,
    observer: Box<dyn StageObserver + Send + Sync>,
}

impl Pipeline {
    pub fn new(
        extractor: Box<dyn TextExtractor + Send + Sync>,
        inference: Box<dyn RecordExtractor + Send + Sync>,
        mapper: SchemaMapper,
    ) -> Self {
        Self {
            extractor,
            inference,
            mapper,
            observer: Box::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn StageObserver + Send + Sync>) -> Self {
        self.observer = observer;
        self
    }

    /// Extract, infer and map. The caller owns serialization.
    pub fn run(
        &self,
        submission: Submission,
        professional_name: &str,
    ) -> Result<OutputState, PipelineFailure> {
        let span = tracing::info_span!("run", run_id = %Uuid::new_v4());
        let _guard = span.enter();
        let mut tracker = RunTracker::new(&*self.observer);
        self.run_tracked(&mut tracker, submission, professional_name)
    }

    /// `run`, then write the output through `serializer`.
    pub fn run_to_artifact(
        &self,
        submission: Submission,
        professional_name: &str,
        serializer: &dyn OutputSerializer,
    ) -> Result<Vec<u8>, PipelineFailure> {
        let span = tracing::info_span!("run", run_id = %Uuid::new_v4());
        let _guard = span.enter();
        let mut tracker = RunTracker::new(&*self.observer);

        let state = self.run_tracked(&mut tracker, submission, professional_name)?;
        let bytes = serializer
            .serialize(&state)
            .map_err(|e| tracker.fail(e))?;
        tracker.advance(PipelineState::Serialized);
        Ok(bytes)
    }

    fn run_tracked(
        &self,
        tracker: &mut RunTracker<'_>,
        submission: Submission,
        professional_name: &str,
    ) -> Result<OutputState, PipelineFailure> {
        let professional = self
            .mapper
            .professional(professional_name)
            .ok_or_else(|| tracker.fail(PipelineError::UnknownProfessional(professional_name.to_string())))?;

        let presence = submission.presence();
        tracing::info!(
            documents = submission.len(),
            professional = %professional.display_name,
            "Pipeline run started"
        );

        let mut texts = Vec::with_capacity(submission.len());
        for doc in submission.into_documents() {
            tracker.advance(PipelineState::Extracting(doc.kind));
            let text = self.extractor.extract(doc).map_err(|e| tracker.fail(e))?;
            texts.push(text);
        }

        tracker.advance(PipelineState::Assembling);
        let context = assemble(texts);

        tracker.advance(PipelineState::Inferring);
        let record = self.inference.infer(&context).map_err(|e| tracker.fail(e))?;
        drop(context);

        tracker.advance(PipelineState::Mapping);
        Ok(self.mapper.map(&record, professional, presence))
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build a `Pipeline` with production implementations.
///
/// - Extraction: PDFium engines, Tesseract CLI for scanned pages
/// - Inference: Gemini or Ollama, per `settings.inference.backend`
/// - Mapping: the profile's schema, bound to the template's sheets
pub fn build_pipeline(
    settings: &Settings,
    profile: TemplateProfile,
    registry: ProfessionalRegistry,
    template_sheets: &[String],
) -> Result<Pipeline, InferenceError> {
    let ocr = Arc::new(TesseractCli::new(&settings.extraction.ocr_language));
    let factory = PdfiumEngineFactory::new(
        settings.extraction.pdfium_library_path.clone(),
        ocr,
        settings.extraction.ocr_dpi,
    );
    let extractor = DocumentExtractor::new(Box::new(factory))
        .with_max_chars(settings.extraction.max_document_chars);

    let inference = &settings.inference;
    let llm: Box<dyn LlmClient + Send + Sync> = match inference.backend {
        InferenceBackend::Gemini => Box::new(GeminiClient::new(
            inference.endpoint(),
            inference.api_key.as_deref().unwrap_or_default(),
            inference.model_name(),
            inference.temperature,
            inference.timeout_secs,
        )?),
        InferenceBackend::Ollama => Box::new(OllamaClient::new(
            inference.endpoint(),
            inference.model_name(),
            inference.temperature,
            inference.timeout_secs,
        )?),
    };
    tracing::info!(backend = %llm.describe(), "Pipeline using inference backend");

    let structured = StructuredExtractor::new(llm, profile.catalogue)
        .with_retry(inference.retry_policy())
        .with_max_context_chars(settings.extraction.max_context_chars);

    let mapper = SchemaMapper::new(profile.schema, registry).bind_to_sheets(template_sheets.iter().cloned());

    Ok(Pipeline::new(
        Box::new(extractor),
        Box::new(structured),
        mapper,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
