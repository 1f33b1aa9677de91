//! Numeric normalization for every numeric target cell.
//!
//! Total: anything that cannot be read as a number becomes `0.0`. The
//! separator rule is fixed: when both `.` and `,` appear, `.` is a thousands
//! separator and `,` the decimal mark ("1.234,56"); a lone `,` is decimal.

use crate::pipeline::structuring::Scalar;

/// Borrowed view of the values the normalizer accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericInput<'a> {
    Text(&'a str),
    Number(f64),
    Null,
}

impl<'a> From<&'a str> for NumericInput<'a> {
    fn from(value: &'a str) -> Self {
        NumericInput::Text(value)
    }
}

impl<'a> From<&'a String> for NumericInput<'a> {
    fn from(value: &'a String) -> Self {
        NumericInput::Text(value.as_str())
    }
}

impl From<f64> for NumericInput<'_> {
    fn from(value: f64) -> Self {
        NumericInput::Number(value)
    }
}

impl<'a, T: Into<NumericInput<'a>>> From<Option<T>> for NumericInput<'a> {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(NumericInput::Null)
    }
}

impl<'a> From<&'a Scalar> for NumericInput<'a> {
    fn from(value: &'a Scalar) -> Self {
        match value {
            Scalar::Text(s) => NumericInput::Text(s),
            Scalar::Number(n) => NumericInput::Number(*n),
        }
    }
}

impl<'a> From<&'a serde_json::Value> for NumericInput<'a> {
    fn from(value: &'a serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => NumericInput::Text(s),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(NumericInput::Number)
                .unwrap_or(NumericInput::Null),
            _ => NumericInput::Null,
        }
    }
}

/// Convert a possibly locale-formatted value to `f64`. Never fails.
pub fn to_number<'a>(value: impl Into<NumericInput<'a>>) -> f64 {
    match value.into() {
        NumericInput::Number(n) => n,
        NumericInput::Null => 0.0,
        NumericInput::Text(s) => parse_numeric_text(s),
    }
}

fn parse_numeric_text(raw: &str) -> f64 {
    if raw.is_empty() {
        return 0.0;
    }

    let stripped: String = raw
        .replace("R$", "")
        .replace('%', "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let separators_fixed = if stripped.contains(',') && stripped.contains('.') {
        stripped.replace('.', "").replace(',', ".")
    } else if stripped.contains(',') {
        stripped.replace(',', ".")
    } else {
        stripped
    };

    let digits: String = separators_fixed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    match digits.parse::<f64>() {
        Ok(n) => n,
        Err(_) => {
            tracing::trace!(raw, "Numeric text not parseable, using 0");
            0.0
        }
    }
}
