use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::fields::{FieldCatalogue, FieldKind};
use super::types::{FieldValue, Scalar, StructuredRecord};
use super::InferenceError;

/// Parse the service's response body into a record of the declared fields.
///
/// The body must be one JSON object, optionally wrapped in a ```json fence.
/// Unknown keys are ignored; missing, null or wrongly shaped fields take the
/// default of their declared kind.
pub fn parse_record(
    response: &str,
    catalogue: &FieldCatalogue,
) -> Result<StructuredRecord, InferenceError> {
    let json = strip_code_fence(response);
    if json.is_empty() {
        return Err(InferenceError::MalformedResponse("Empty response body".into()));
    }

    let value: Value = serde_json::from_str(json)
        .map_err(|e| InferenceError::MalformedResponse(format!("Invalid JSON: {e}")))?;

    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(InferenceError::MalformedResponse(format!(
                "Expected a JSON object, got {}",
                json_type_name(&other)
            )))
        }
    };

    Ok(build_record(&object, catalogue))
}

fn build_record(object: &Map<String, Value>, catalogue: &FieldCatalogue) -> StructuredRecord {
    let fields: BTreeMap<String, FieldValue> = catalogue
        .iter()
        .map(|spec| {
            let value = coerce(object.get(&spec.name), spec.kind);
            (spec.name.clone(), value)
        })
        .collect();

    let ignored = object
        .keys()
        .filter(|k| catalogue.get(k).is_none())
        .count();
    if ignored > 0 {
        tracing::debug!(ignored, "Undeclared response keys ignored");
    }

    StructuredRecord::new(fields)
}

fn coerce(value: Option<&Value>, kind: FieldKind) -> FieldValue {
    let Some(value) = value else {
        return kind.default_value();
    };

    match kind {
        FieldKind::Text | FieldKind::Number => match json_scalar(value) {
            Some(scalar) => FieldValue::Scalar(scalar),
            None => kind.default_value(),
        },
        FieldKind::List => match value {
            Value::Array(items) => FieldValue::List(items.iter().filter_map(json_list_item).collect()),
            other => match json_scalar(other) {
                Some(scalar) if !scalar.is_blank() => FieldValue::List(vec![scalar]),
                _ => kind.default_value(),
            },
        },
    }
}

/// Strings and numbers map to scalars; booleans become text.
fn json_scalar(value: &Value) -> Option<Scalar> {
    match value {
        Value::String(s) => Some(Scalar::Text(s.clone())),
        Value::Number(n) => n.as_f64().map(Scalar::Number),
        Value::Bool(b) => Some(Scalar::Text(b.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Nulls keep their slot as blank text so positions stay aligned.
fn json_list_item(value: &Value) -> Option<Scalar> {
    match value {
        Value::Null => Some(Scalar::Text(String::new())),
        other => json_scalar(other),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Remove a surrounding Markdown code fence (```json ... ``` or ``` ... ```).
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.rfind("```")
        .map_or(body, |end| &body[..end])
        .trim()
}
