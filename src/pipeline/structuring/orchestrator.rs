use std::time::Duration;

use super::fields::FieldCatalogue;
use super::parser::parse_record;
use super::prompt::build_instruction;
use super::types::{InferenceRequest, LlmClient, RecordExtractor, StructuredRecord};
use super::InferenceError;
use crate::pipeline::extraction::cap_text;

/// Default cap on the context sent to the service (characters).
pub const DEFAULT_CONTEXT_CHAR_CAP: usize = 40_000;

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Same attempt bound, no pause. For tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }
}

/// Context → structured record through an LLM backend:
/// cap context → request → parse → retry on any failure.
pub struct StructuredExtractor {
    llm: Box<dyn LlmClient + Send + Sync>,
    catalogue: FieldCatalogue,
    instruction: String,
    retry: RetryPolicy,
    max_context_chars: usize,
}

impl StructuredExtractor {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>, catalogue: FieldCatalogue) -> Self {
        let instruction = build_instruction(&catalogue);
        Self {
            llm,
            catalogue,
            instruction,
            retry: RetryPolicy::default(),
            max_context_chars: DEFAULT_CONTEXT_CHAR_CAP,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_context_chars(mut self, max_context_chars: usize) -> Self {
        self.max_context_chars = max_context_chars;
        self
    }

    /// Run inference with an explicit instruction instead of the catalogue's.
    pub fn infer_with_prompt(
        &self,
        context: &str,
        schema_prompt: &str,
    ) -> Result<StructuredRecord, InferenceError> {
        let (context, truncated) = cap_text(context, self.max_context_chars);
        let request = InferenceRequest {
            instruction: schema_prompt.to_string(),
            context,
        };

        let attempts = self.retry.max_attempts.max(1);
        tracing::info!(
            backend = %self.llm.describe(),
            context_chars = request.context.chars().count(),
            truncated,
            attempts,
            "Starting structured inference"
        );

        let mut last_error = None;
        for attempt in 1..=attempts {
            let outcome = self
                .llm
                .generate(&request)
                .and_then(|body| parse_record(&body, &self.catalogue));

            match outcome {
                Ok(record) => {
                    tracing::info!(attempt, fields = record.len(), "Structured inference succeeded");
                    return Ok(record);
                }
                Err(e) => {
                    tracing::warn!(attempt, max_attempts = attempts, error = %e, "Inference attempt failed");
                    last_error = Some(e);
                    if attempt < attempts && !self.retry.backoff.is_zero() {
                        std::thread::sleep(self.retry.backoff);
                    }
                }
            }
        }

        Err(InferenceError::Exhausted {
            attempts,
            last: Box::new(last_error.unwrap_or_else(|| {
                InferenceError::MalformedResponse("no attempt was made".into())
            })),
        })
    }
}

impl RecordExtractor for StructuredExtractor {
    fn infer(&self, context: &str) -> Result<StructuredRecord, InferenceError> {
        self.infer_with_prompt(context, &self.instruction)
    }
}
