//! Start-up probe for the external dependencies a run needs.
//!
//! Runs once before any document is converted, so a missing library or
//! credential is reported up front instead of halfway through a run.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::config::{InferenceBackend, InferenceSettings, Settings};
use crate::models::DocumentKind;
use crate::pipeline::extraction::{kinds_need_ocr, probe_library};
use crate::pipeline::structuring::OllamaClient;

#[derive(Error, Debug)]
pub enum DependencyUnavailable {
    #[error("PDFium library unavailable: {0}")]
    Pdfium(String),

    #[error("Tesseract OCR binary not found on PATH (needed for scanned pages)")]
    Tesseract,

    #[error("No API key configured for the {0} backend (set GEMINI_API_KEY)")]
    MissingCredential(InferenceBackend),

    #[error("Ollama unreachable at {endpoint}: {reason}")]
    OllamaUnreachable { endpoint: String, reason: String },

    #[error("Model '{model}' is not installed in Ollama at {endpoint} (run `ollama pull {model}`)")]
    ModelNotInstalled { model: String, endpoint: String },
}

/// What the probe found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub tesseract: Option<PathBuf>,
    pub backend: String,
}

/// Check what a run over `kinds` will need. Tesseract is only required when
/// one of the submitted documents can fall back to OCR.
pub fn probe<I>(settings: &Settings, kinds: I) -> Result<Capabilities, DependencyUnavailable>
where
    I: IntoIterator<Item = DocumentKind>,
{
    probe_pdfium(settings.extraction.pdfium_library_path.as_deref())?;

    let tesseract = probe_tesseract(kinds)?;

    check_credential(&settings.inference)?;
    check_ollama_model(&settings.inference)?;

    let caps = Capabilities {
        tesseract,
        backend: format!(
            "{}/{}",
            settings.inference.backend,
            settings.inference.model_name()
        ),
    };
    tracing::info!(
        backend = %caps.backend,
        tesseract = ?caps.tesseract,
        "Capability probe passed"
    );
    Ok(caps)
}

fn probe_pdfium(configured: Option<&Path>) -> Result<(), DependencyUnavailable> {
    probe_library(configured).map_err(|e| DependencyUnavailable::Pdfium(e.to_string()))
}

fn probe_tesseract<I>(kinds: I) -> Result<Option<PathBuf>, DependencyUnavailable>
where
    I: IntoIterator<Item = DocumentKind>,
{
    if kinds_need_ocr(kinds) {
        find_tesseract().map(Some)
    } else {
        Ok(None)
    }
}

fn find_tesseract() -> Result<PathBuf, DependencyUnavailable> {
    let candidate = if cfg!(windows) { "tesseract.exe" } else { "tesseract" };
    which::which(candidate).map_err(|_| DependencyUnavailable::Tesseract)
}

/// Gemini needs an API key; a local Ollama does not.
fn check_credential(inference: &InferenceSettings) -> Result<(), DependencyUnavailable> {
    match inference.backend {
        InferenceBackend::Gemini if !inference.has_api_key() => {
            Err(DependencyUnavailable::MissingCredential(InferenceBackend::Gemini))
        }
        _ => Ok(()),
    }
}

/// An Ollama backend must be reachable and already have the model pulled.
fn check_ollama_model(inference: &InferenceSettings) -> Result<(), DependencyUnavailable> {
    if inference.backend != InferenceBackend::Ollama {
        return Ok(());
    }

    let endpoint = inference.endpoint().to_string();
    let unreachable_at = |reason: String| DependencyUnavailable::OllamaUnreachable {
        endpoint: endpoint.clone(),
        reason,
    };

    let client = OllamaClient::new(
        &endpoint,
        inference.model_name(),
        inference.temperature,
        inference.timeout_secs,
    )
    .map_err(|e| unreachable_at(e.to_string()))?;

    match client.is_model_available() {
        Ok(true) => Ok(()),
        Ok(false) => Err(DependencyUnavailable::ModelNotInstalled {
            model: inference.model_name().to_string(),
            endpoint: endpoint.clone(),
        }),
        Err(e) => Err(unreachable_at(e.to_string())),
    }
}
