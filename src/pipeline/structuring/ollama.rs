use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{InferenceRequest, LlmClient};
use super::{transport_error, InferenceError};

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Ollama HTTP client for local LLM inference.
pub struct OllamaClient {
    base_url: String,
    model: String,
    temperature: f32,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a new OllamaClient pointing at an Ollama instance.
    pub fn new(
        base_url: &str,
        model: &str,
        temperature: f32,
        timeout_secs: u64,
    ) -> Result<Self, InferenceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
            client,
            timeout_secs,
        })
    }

    /// Names of the models pulled into this Ollama instance.
    pub fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| transport_error(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    pub fn is_model_available(&self) -> Result<bool, InferenceError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(&self.model)))
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl LlmClient for OllamaClient {
    fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: &request.context,
            system: &request.instruction,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| transport_error(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

        Ok(parsed.response)
    }

    fn describe(&self) -> String {
        format!("ollama/{}", self.model)
    }
}

/// Mock LLM client for testing.
///
/// Plays back a script of outcomes, one per call; `None` entries fail with a
/// transport error. Once the script is exhausted the last outcome repeats.
pub struct MockLlmClient {
    script: Mutex<Script>,
    calls: AtomicU32,
}

struct Script {
    pending: VecDeque<Option<String>>,
    last: Option<String>,
}

impl MockLlmClient {
    /// Always answers with `response`.
    pub fn new(response: &str) -> Self {
        Self::scripted(vec![Some(response.to_string())])
    }

    /// Fails on every call.
    pub fn failing() -> Self {
        Self::scripted(vec![None])
    }

    pub fn scripted(script: Vec<Option<String>>) -> Self {
        Self {
            script: Mutex::new(Script {
                pending: script.into(),
                last: None,
            }),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, _request: &InferenceRequest) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let outcome = match self.script.lock() {
            Ok(mut script) => {
                if let Some(next) = script.pending.pop_front() {
                    script.last = next;
                }
                script.last.clone()
            }
            Err(_) => None,
        };

        outcome.ok_or_else(|| InferenceError::Transport("mock transport failure".into()))
    }

    fn describe(&self) -> String {
        "mock".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn request() -> InferenceRequest {
        InferenceRequest {
            instruction: "sistema".into(),
            context: "contexto".into(),
        }
    }

    #[test]
    fn mock_client_returns_configured_response() {
        let client = MockLlmClient::new("test response");
        assert_eq!(client.generate(&request()).unwrap(), "test response");
        assert_eq!(client.generate(&request()).unwrap(), "test response");
        assert_eq!(client.calls(), 2);
    }

    #[test]
    fn mock_client_follows_script() {
        let client = MockLlmClient::scripted(vec![None, Some("{}".into())]);
        assert!(client.generate(&request()).is_err());
        assert_eq!(client.generate(&request()).unwrap(), "{}");
        assert_eq!(client.generate(&request()).unwrap(), "{}");
    }

    #[test]
    fn ollama_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", "llama3", 0.1, 60).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.describe(), "ollama/llama3");
    }

    #[test]
    fn generate_sends_json_format_and_system() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "llama3",
                "prompt": "contexto",
                "system": "sistema",
                "stream": false,
                "format": "json"
            })))
            .with_status(200)
            .with_body(r#"{"response":"{\"contratacao\":\"01/02/2024\"}","done":true}"#)
            .create();

        let client = OllamaClient::new(&server.url(), "llama3", 0.1, 5).unwrap();
        let text = client.generate(&request()).unwrap();
        assert_eq!(text, r#"{"contratacao":"01/02/2024"}"#);
        mock.assert();
    }

    #[test]
    fn generate_reports_status() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(404)
            .with_body("model not found")
            .create();

        let client = OllamaClient::new(&server.url(), "llama3", 0.1, 5).unwrap();
        let err = client.generate(&request()).unwrap_err();
        assert!(matches!(err, InferenceError::HttpStatus { status: 404, .. }));
    }

    #[test]
    fn model_availability_uses_tags() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models":[{"name":"llama3:8b"},{"name":"qwen2.5:7b"}]}"#)
            .create();

        let client = OllamaClient::new(&server.url(), "llama3", 0.1, 5).unwrap();
        assert_eq!(client.list_models().unwrap().len(), 2);
        assert!(client.is_model_available().unwrap());
    }
}
