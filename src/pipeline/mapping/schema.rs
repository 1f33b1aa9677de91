//! Target schema: where each record field lands in the template workbook.
//!
//! The schema and the field catalogue are loaded together from one TOML
//! template profile, so coordinates can follow template revisions without a
//! rebuild. A default profile for the RAE template is compiled in.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DocumentKind, ProfessionalField};
use crate::pipeline::structuring::{FieldCatalogue, FieldKind, FieldSpec};

/// Largest worksheet column (XFD) and row.
const MAX_COL: u32 = 16_384;
const MAX_ROW: u32 = 1_048_576;

const BUNDLED_PROFILE: &str = include_str!("../../../config/rae_template.toml");

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid cell reference '{0}'")]
    InvalidCell(String),

    #[error("Failed to read template profile {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Template profile parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Field '{0}' declared more than once")]
    DuplicateField(String),

    #[error("Region name '{0}' used more than once")]
    DuplicateRegion(String),

    #[error("{location} references undeclared field '{field}'")]
    UndeclaredField { field: String, location: String },

    #[error("{location} needs a {expected} field, but '{field}' is not one")]
    FieldKindMismatch {
        field: String,
        location: String,
        expected: &'static str,
    },

    #[error("List region '{0}' must have max_slots > 0")]
    EmptyList(String),

    #[error("List region '{0}' has a zero stride")]
    ZeroStride(String),

    #[error("List region '{0}' runs past the last worksheet cell")]
    ListOutOfBounds(String),
}

// ── Cell references ───────────────────────────────────────

/// A1-style cell coordinate, 1-based. Orders row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellRef {
    row: u32,
    col: u32,
}

impl CellRef {
    pub fn new(col: u32, row: u32) -> Option<Self> {
        ((1..=MAX_COL).contains(&col) && (1..=MAX_ROW).contains(&row)).then_some(Self { row, col })
    }

    pub fn col(&self) -> u32 {
        self.col
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    /// The cell `steps` strides away, if still on the sheet.
    pub fn step(&self, stride: Stride, steps: u32) -> Option<Self> {
        let col = stride.cols.checked_mul(steps)?.checked_add(self.col)?;
        let row = stride.rows.checked_mul(steps)?.checked_add(self.row)?;
        Self::new(col, row)
    }

    pub fn column_letters(&self) -> String {
        let mut n = self.col;
        let mut letters = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push(b'A' + rem as u8);
            n = (n - 1) / 26;
        }
        letters.reverse();
        String::from_utf8_lossy(&letters).into_owned()
    }
}

impl FromStr for CellRef {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || SchemaError::InvalidCell(s.to_string());

        let split = raw
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = raw.split_at(split);
        if letters.is_empty()
            || letters.len() > 3
            || !letters.chars().all(|c| c.is_ascii_alphabetic())
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let col = letters
            .to_ascii_uppercase()
            .bytes()
            .fold(0u32, |acc, b| acc * 26 + u32::from(b - b'A' + 1));
        let row: u32 = digits.parse().map_err(|_| invalid())?;

        Self::new(col, row).ok_or_else(invalid)
    }
}

impl TryFrom<String> for CellRef {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CellRef> for String {
    fn from(cell: CellRef) -> Self {
        cell.to_string()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_letters(), self.row)
    }
}

// ── Regions ───────────────────────────────────────────────

/// One scalar cell fed by a record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellBinding {
    pub cell: CellRef,
    pub field: String,
    #[serde(default)]
    pub numeric: bool,
    /// Only written when this document was provided.
    #[serde(default)]
    pub requires: Option<DocumentKind>,
}

/// Named group of scalar cells on one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarRegion {
    pub name: String,
    pub sheet: String,
    #[serde(default)]
    pub cells: Vec<CellBinding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stride {
    #[serde(default)]
    pub rows: u32,
    #[serde(default)]
    pub cols: u32,
}

impl Default for Stride {
    /// One row down per slot.
    fn default() -> Self {
        Self { rows: 1, cols: 0 }
    }
}

impl Stride {
    pub fn is_zero(&self) -> bool {
        self.rows == 0 && self.cols == 0
    }
}

/// What a list region does with slots past the end of the list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Underflow {
    /// Write `0` (fixed-length weight tables).
    ZeroFill,
    /// Leave the template's content (variable-length progress tables).
    #[default]
    LeaveBlank,
}

/// Repeated numeric slots fed by a list field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRegion {
    pub name: String,
    pub sheet: String,
    pub field: String,
    pub start: CellRef,
    #[serde(default)]
    pub stride: Stride,
    pub max_slots: u32,
    #[serde(default)]
    pub underflow: Underflow,
    #[serde(default)]
    pub requires: Option<DocumentKind>,
}

impl ListRegion {
    /// Coordinate of slot `index` (0-based).
    pub fn slot(&self, index: u32) -> Option<CellRef> {
        self.start.step(self.stride, index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalBinding {
    pub cell: CellRef,
    pub field: ProfessionalField,
}

/// Responsible-professional identity block, copied from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalBlock {
    #[serde(default = "default_professional_region")]
    pub name: String,
    pub sheet: String,
    #[serde(default)]
    pub cells: Vec<ProfessionalBinding>,
}

fn default_professional_region() -> String {
    "profissional".to_string()
}

/// Cell whose label reflects whether a document was provided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceBinding {
    pub sheet: String,
    pub cell: CellRef,
    pub document: DocumentKind,
    #[serde(default = "default_present")]
    pub present: String,
    #[serde(default = "default_absent")]
    pub absent: String,
}

fn default_present() -> String {
    "Sim".to_string()
}

fn default_absent() -> String {
    "Não".to_string()
}

/// Every region the mapper writes, optionally bound to the sheets that
/// actually exist in the template workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSchema {
    pub regions: Vec<ScalarRegion>,
    pub lists: Vec<ListRegion>,
    pub professional: Option<ProfessionalBlock>,
    pub presence: Vec<PresenceBinding>,
    available_sheets: Option<BTreeSet<String>>,
}

impl TargetSchema {
    /// Restrict mapping to the given sheet names.
    pub fn bind_to_sheets<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_sheets = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// True when the schema is unbound or the sheet exists in the template.
    pub fn sheet_available(&self, sheet: &str) -> bool {
        self.available_sheets
            .as_ref()
            .map_or(true, |sheets| sheets.contains(sheet))
    }

    /// Every sheet name the schema writes to.
    pub fn sheets(&self) -> BTreeSet<&str> {
        let mut sheets: BTreeSet<&str> = self.regions.iter().map(|r| r.sheet.as_str()).collect();
        sheets.extend(self.lists.iter().map(|l| l.sheet.as_str()));
        sheets.extend(self.professional.iter().map(|p| p.sheet.as_str()));
        sheets.extend(self.presence.iter().map(|p| p.sheet.as_str()));
        sheets
    }
}

// ── Template profile ──────────────────────────────────────

/// Field catalogue plus target schema, validated together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateProfile {
    pub catalogue: FieldCatalogue,
    pub schema: TargetSchema,
}

#[derive(Deserialize)]
struct RawProfile {
    #[serde(default)]
    fields: Vec<FieldSpec>,
    #[serde(default)]
    regions: Vec<ScalarRegion>,
    #[serde(default)]
    lists: Vec<ListRegion>,
    professional: Option<ProfessionalBlock>,
    #[serde(default)]
    presence: Vec<PresenceBinding>,
}

impl TemplateProfile {
    /// The compiled-in RAE template profile.
    pub fn bundled() -> Result<Self, SchemaError> {
        Self::from_toml_str(BUNDLED_PROFILE)
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let profile = Self::from_toml_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            fields = profile.catalogue.len(),
            regions = profile.schema.regions.len(),
            lists = profile.schema.lists.len(),
            "Template profile loaded"
        );
        Ok(profile)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, SchemaError> {
        let raw: RawProfile = toml::from_str(raw)?;
        let profile = Self {
            catalogue: FieldCatalogue::new(raw.fields),
            schema: TargetSchema {
                regions: raw.regions,
                lists: raw.lists,
                professional: raw.professional,
                presence: raw.presence,
                available_sheets: None,
            },
        };
        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if let Some(name) = self.catalogue.first_duplicate() {
            return Err(SchemaError::DuplicateField(name.to_string()));
        }

        let mut names = BTreeSet::new();
        let region_names = self
            .schema
            .regions
            .iter()
            .map(|r| &r.name)
            .chain(self.schema.lists.iter().map(|l| &l.name))
            .chain(self.schema.professional.iter().map(|p| &p.name));
        for name in region_names {
            if !names.insert(name.as_str()) {
                return Err(SchemaError::DuplicateRegion(name.clone()));
            }
        }

        for region in &self.schema.regions {
            for binding in &region.cells {
                let location = format!("Cell {}!{}", region.sheet, binding.cell);
                let kind = self.field_kind(&binding.field, &location)?;
                if kind == FieldKind::List {
                    return Err(SchemaError::FieldKindMismatch {
                        field: binding.field.clone(),
                        location,
                        expected: "text or number",
                    });
                }
            }
        }

        for list in &self.schema.lists {
            let location = format!("List region '{}'", list.name);
            if self.field_kind(&list.field, &location)? != FieldKind::List {
                return Err(SchemaError::FieldKindMismatch {
                    field: list.field.clone(),
                    location,
                    expected: "list",
                });
            }
            if list.max_slots == 0 {
                return Err(SchemaError::EmptyList(list.name.clone()));
            }
            if list.stride.is_zero() {
                return Err(SchemaError::ZeroStride(list.name.clone()));
            }
            if list.slot(list.max_slots - 1).is_none() {
                return Err(SchemaError::ListOutOfBounds(list.name.clone()));
            }
        }

        Ok(())
    }

    fn field_kind(&self, field: &str, location: &str) -> Result<FieldKind, SchemaError> {
        self.catalogue
            .get(field)
            .map(|spec| spec.kind)
            .ok_or_else(|| SchemaError::UndeclaredField {
                field: field.to_string(),
                location: location.to_string(),
            })
    }
}
