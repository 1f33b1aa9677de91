pub mod types;
pub mod fields;
pub mod prompt;
pub mod parser;
pub mod gemini;
pub mod ollama;
pub mod orchestrator;

pub use types::*;
pub use fields::*;
pub use prompt::*;
pub use parser::*;
pub use gemini::*;
pub use ollama::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Inference service unreachable at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    Transport(String),

    #[error("Inference service returned error (status {status}): {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Inference failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<InferenceError>,
    },
}

/// Map a reqwest failure the same way for every backend.
pub(crate) fn transport_error(e: reqwest::Error, base_url: &str, timeout_secs: u64) -> InferenceError {
    if e.is_connect() {
        InferenceError::Connection(base_url.to_string())
    } else if e.is_timeout() {
        InferenceError::Transport(format!("Request timed out after {timeout_secs}s"))
    } else {
        InferenceError::Transport(e.to_string())
    }
}
