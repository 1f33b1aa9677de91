use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use super::schema::CellRef;

/// A value written into one template cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputCell {
    /// Schema region that produced the value.
    pub region: String,
    pub value: CellValue,
}

/// A region left out because its sheet is not in the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingSkipped {
    pub region: String,
    pub sheet: String,
}

impl fmt::Display for MappingSkipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region '{}' skipped: sheet '{}' not in template", self.region, self.sheet)
    }
}

/// Sparse `(sheet, cell) → value` map produced by the mapper.
///
/// Only [`OutputStateBuilder`] can create one; after `build()` it is
/// read-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputState {
    cells: BTreeMap<(String, CellRef), OutputCell>,
    skipped: Vec<MappingSkipped>,
}

impl OutputState {
    pub fn get(&self, sheet: &str, cell: CellRef) -> Option<&OutputCell> {
        self.cells.get(&(sheet.to_string(), cell))
    }

    /// Value at an A1 reference; `None` for unwritten or unparsable cells.
    pub fn value_at(&self, sheet: &str, a1: &str) -> Option<&CellValue> {
        let cell: CellRef = a1.parse().ok()?;
        self.get(sheet, cell).map(|c| &c.value)
    }

    /// Cells in sheet, then row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, CellRef, &OutputCell)> {
        self.cells
            .iter()
            .map(|((sheet, cell), out)| (sheet.as_str(), *cell, out))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn sheets(&self) -> BTreeSet<&str> {
        self.cells.keys().map(|(sheet, _)| sheet.as_str()).collect()
    }

    /// Number of cells written by `region`.
    pub fn region_len(&self, region: &str) -> usize {
        self.cells.values().filter(|c| c.region == region).count()
    }

    pub fn skipped(&self) -> &[MappingSkipped] {
        &self.skipped
    }
}

#[derive(Debug, Default)]
pub struct OutputStateBuilder {
    cells: BTreeMap<(String, CellRef), OutputCell>,
    skipped: Vec<MappingSkipped>,
}

impl OutputStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell. A later write to the same cell wins.
    pub fn set(&mut self, sheet: &str, cell: CellRef, region: &str, value: CellValue) {
        let previous = self.cells.insert(
            (sheet.to_string(), cell),
            OutputCell {
                region: region.to_string(),
                value,
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(
                sheet,
                cell = %cell,
                region,
                previous_region = %previous.region,
                "Cell written twice, keeping last value"
            );
        }
    }

    pub fn skip(&mut self, region: &str, sheet: &str) {
        self.skipped.push(MappingSkipped {
            region: region.to_string(),
            sheet: sheet.to_string(),
        });
    }

    pub fn build(self) -> OutputState {
        OutputState {
            cells: self.cells,
            skipped: self.skipped,
        }
    }
}
