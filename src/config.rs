use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::extraction::{DEFAULT_DOCUMENT_CHAR_CAP, DEFAULT_OCR_LANGUAGE, DEFAULT_RENDER_DPI};
use crate::pipeline::structuring::{
    RetryPolicy, DEFAULT_CONTEXT_CHAR_CAP, DEFAULT_GEMINI_MODEL, GEMINI_BASE_URL, OLLAMA_BASE_URL,
};

/// Application-level constants
pub const APP_NAME: &str = "raefill";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "raefill=info,warn"
}

/// `<config_dir>/raefill/`, e.g. `~/.config/raefill` on Linux.
pub fn app_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Default settings file location.
pub fn default_settings_path() -> Option<PathBuf> {
    app_config_dir().map(|d| d.join("settings.toml"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: '{value}'")]
    InvalidOverride { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceBackend {
    #[default]
    Gemini,
    Ollama,
}

impl std::str::FromStr for InferenceBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for InferenceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub backend: InferenceBackend,
    /// Backend default when unset.
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            backend: InferenceBackend::default(),
            model: None,
            api_key: None,
            base_url: None,
            timeout_secs: 120,
            temperature: 0.1,
            max_attempts: 3,
            backoff_secs: 2,
        }
    }
}

impl InferenceSettings {
    pub fn model_name(&self) -> &str {
        match (&self.model, self.backend) {
            (Some(m), _) if !m.trim().is_empty() => m,
            (_, InferenceBackend::Gemini) => DEFAULT_GEMINI_MODEL,
            (_, InferenceBackend::Ollama) => DEFAULT_OLLAMA_MODEL,
        }
    }

    pub fn endpoint(&self) -> &str {
        match (&self.base_url, self.backend) {
            (Some(url), _) if !url.trim().is_empty() => url,
            (_, InferenceBackend::Gemini) => GEMINI_BASE_URL,
            (_, InferenceBackend::Ollama) => OLLAMA_BASE_URL,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            backoff: Duration::from_secs(self.backoff_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub max_document_chars: usize,
    pub max_context_chars: usize,
    pub pdfium_library_path: Option<PathBuf>,
    pub ocr_language: String,
    pub ocr_dpi: u32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            max_document_chars: DEFAULT_DOCUMENT_CHAR_CAP,
            max_context_chars: DEFAULT_CONTEXT_CHAR_CAP,
            pdfium_library_path: None,
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            ocr_dpi: DEFAULT_RENDER_DPI,
        }
    }
}

/// Everything a run needs besides its documents.
///
/// File values come first, then environment overrides. Paths left unset
/// fall back to the bundled template profile and `<config_dir>/raefill/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Template profile TOML; the bundled RAE profile when unset.
    pub template_profile: Option<PathBuf>,
    /// Professional registry TOML.
    pub registry: Option<PathBuf>,
    pub inference: InferenceSettings,
    pub extraction: ExtractionSettings,
}

impl Settings {
    /// Load settings from `path`, or from the default location when it
    /// exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_settings_path().filter(|p| p.is_file()) {
                Some(default) => Self::from_file(&default)?,
                None => {
                    tracing::debug!("No settings file, using defaults");
                    Self::default()
                }
            },
        };
        settings.with_env_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Settings loaded");
        Ok(settings)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Supported variables:
    /// - `GEMINI_API_KEY`
    /// - `RAEFILL_INFERENCE_BACKEND`: "gemini" or "ollama"
    /// - `RAEFILL_MODEL`
    /// - `OLLAMA_HOST`: Ollama base URL, only when the backend is Ollama
    /// - `PDFIUM_DYNAMIC_LIB_PATH`
    /// - `RAEFILL_OCR_LANGUAGE`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = var("RAEFILL_INFERENCE_BACKEND") {
            self.inference.backend = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride {
                    key: "RAEFILL_INFERENCE_BACKEND",
                    value,
                })?;
        }
        if let Some(key) = var("GEMINI_API_KEY") {
            self.inference.api_key = Some(key);
        }
        if let Some(model) = var("RAEFILL_MODEL") {
            self.inference.model = Some(model);
        }
        if self.inference.backend == InferenceBackend::Ollama {
            if let Some(host) = var("OLLAMA_HOST") {
                self.inference.base_url = Some(normalize_host(&host));
            }
        }
        if let Some(path) = var("PDFIUM_DYNAMIC_LIB_PATH") {
            self.extraction.pdfium_library_path = Some(PathBuf::from(path));
        }
        if let Some(lang) = var("RAEFILL_OCR_LANGUAGE") {
            self.extraction.ocr_language = lang;
        }
        Ok(self)
    }

    /// Registry path, defaulting to `<config_dir>/raefill/professionals.toml`.
    pub fn registry_path(&self) -> Option<PathBuf> {
        self.registry
            .clone()
            .or_else(|| app_config_dir().map(|d| d.join("professionals.toml")))
    }
}

/// `OLLAMA_HOST` is often given as `host:port` without a scheme.
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}
