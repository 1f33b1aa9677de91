use serde::{Deserialize, Serialize};

use super::types::{FieldValue, Scalar};

/// Declared shape of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    List,
}

impl FieldKind {
    /// Value used when the service omits the field or returns the wrong shape.
    pub fn default_value(self) -> FieldValue {
        match self {
            FieldKind::Text => FieldValue::Scalar(Scalar::Text(String::new())),
            FieldKind::Number => FieldValue::Scalar(Scalar::Number(0.0)),
            FieldKind::List => FieldValue::List(Vec::new()),
        }
    }

    /// Short Portuguese description used in the instruction.
    pub fn describe(self) -> &'static str {
        match self {
            FieldKind::Text => "texto",
            FieldKind::Number => "número",
            FieldKind::List => "lista de números",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub hint: String,
}

/// The declared field set the inference service must fill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldCatalogue {
    fields: Vec<FieldSpec>,
}

impl FieldCatalogue {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First name declared more than once, if any.
    pub fn first_duplicate(&self) -> Option<&str> {
        self.fields.iter().enumerate().find_map(|(i, f)| {
            self.fields[..i]
                .iter()
                .any(|earlier| earlier.name == f.name)
                .then_some(f.name.as_str())
        })
    }
}
