//! Google Gemini `generateContent` client.
//!
//! The instruction travels as `systemInstruction`, the assembled context as
//! the single user turn. `responseMimeType` forces a JSON body.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{InferenceRequest, LlmClient};
use super::{transport_error, InferenceError};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
        timeout_secs: u64,
    ) -> Result<Self, InferenceError> {
        if api_key.trim().is_empty() {
            return Err(InferenceError::MissingCredential(
                "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".into(),
            ));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
            timeout_secs,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

impl LlmClient for GeminiClient {
    fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let body = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: &request.instruction,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: &request.context,
                }],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json",
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
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

        let parsed: GeminiResponse = response
            .json()
            .map_err(|e| InferenceError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(InferenceError::MalformedResponse(format!(
                "Gemini API error: {}",
                error.message
            )));
        }

        let text = parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(InferenceError::MalformedResponse(
                "Gemini returned no candidate text".into(),
            ));
        }
        Ok(text)
    }

    fn describe(&self) -> String {
        format!("gemini/{}", self.model)
    }
}
