use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::InferenceError;

/// A single value returned by the inference service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(f64),
}

impl Scalar {
    pub fn is_blank(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for Scalar {
    /// Integral numbers render without a fractional part ("5", not "5.0").
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

/// Value of one declared field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

/// Declared field name → value. Built once by the parser, read-only after.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuredRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl StructuredRecord {
    pub fn new(fields: BTreeMap<String, FieldValue>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Scalar value of `name`, if the field holds one.
    pub fn scalar(&self, name: &str) -> Option<&Scalar> {
        match self.fields.get(name) {
            Some(FieldValue::Scalar(s)) => Some(s),
            _ => None,
        }
    }

    /// List value of `name`; empty when absent or scalar.
    pub fn list(&self, name: &str) -> &[Scalar] {
        match self.fields.get(name) {
            Some(FieldValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// What crosses the inference-service boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    pub instruction: String,
    pub context: String,
}

/// LLM backend abstraction (allows mocking).
pub trait LlmClient {
    /// Send one request and return the raw response body text.
    fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError>;

    /// Backend and model, for logs.
    fn describe(&self) -> String;
}

/// Turns an assembled context into a structured record.
pub trait RecordExtractor {
    fn infer(&self, context: &str) -> Result<StructuredRecord, InferenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(Scalar::Number(350000.0).to_string(), "350000");
        assert_eq!(Scalar::Number(12.5).to_string(), "12.5");
    }

    #[test]
    fn blank_text_detected() {
        assert!(Scalar::from("  ").is_blank());
        assert!(!Scalar::from("x").is_blank());
        assert!(!Scalar::Number(0.0).is_blank());
    }

    #[test]
    fn record_accessors() {
        let mut fields = BTreeMap::new();
        fields.insert("valor".to_string(), FieldValue::Scalar(Scalar::Number(1.0)));
        fields.insert(
            "pesos".to_string(),
            FieldValue::List(vec![Scalar::from("1,5"), Scalar::Number(2.0)]),
        );
        let record = StructuredRecord::new(fields);

        assert_eq!(record.scalar("valor"), Some(&Scalar::Number(1.0)));
        assert_eq!(record.list("pesos").len(), 2);
        assert!(record.list("valor").is_empty());
        assert!(record.scalar("ausente").is_none());
        assert_eq!(record.len(), 2);
    }
}
