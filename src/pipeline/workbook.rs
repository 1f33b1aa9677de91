//! Output state → template workbook bytes.

use std::io::Cursor;

use thiserror::Error;

use super::mapping::{CellValue, OutputState};

#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("Failed to read template workbook: {0}")]
    Read(String),

    #[error("Failed to write workbook: {0}")]
    Write(String),

    #[error("Cannot read template file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes a finished output state into a concrete artifact.
pub trait OutputSerializer {
    /// Sheet names available in the target, for schema binding.
    fn sheet_names(&self) -> Vec<String>;

    fn serialize(&self, state: &OutputState) -> Result<Vec<u8>, WorkbookError>;
}

/// A macro-enabled template workbook held in memory.
///
/// Every serialization re-reads the template bytes, so the same template
/// can fill any number of runs.
pub struct XlsmTemplate {
    bytes: Vec<u8>,
    sheets: Vec<String>,
}

impl XlsmTemplate {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, WorkbookError> {
        let book = read_book(&bytes)?;
        let sheets = book
            .get_sheet_collection()
            .iter()
            .map(|ws| ws.get_name().to_string())
            .collect();
        Ok(Self { bytes, sheets })
    }

    pub fn load(path: &std::path::Path) -> Result<Self, WorkbookError> {
        let bytes = std::fs::read(path).map_err(|source| WorkbookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let template = Self::from_bytes(bytes)?;
        tracing::info!(
            path = %path.display(),
            sheets = template.sheets.len(),
            "Template workbook loaded"
        );
        Ok(template)
    }
}

fn read_book(bytes: &[u8]) -> Result<umya_spreadsheet::Spreadsheet, WorkbookError> {
    let cursor = Cursor::new(bytes.to_vec());
    umya_spreadsheet::reader::xlsx::read_reader(cursor, true)
        .map_err(|e| WorkbookError::Read(e.to_string()))
}

impl OutputSerializer for XlsmTemplate {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.clone()
    }

    fn serialize(&self, state: &OutputState) -> Result<Vec<u8>, WorkbookError> {
        let mut book = read_book(&self.bytes)?;

        let mut written = 0usize;
        for (sheet, cell, out) in state.iter() {
            let Some(ws) = book.get_sheet_by_name_mut(sheet) else {
                tracing::warn!(sheet, cell = %cell, "Sheet missing from template, cell skipped");
                continue;
            };
            let target = ws.get_cell_mut((cell.col(), cell.row()));
            match &out.value {
                CellValue::Number(n) => {
                    target.set_value_number(*n);
                }
                CellValue::Text(s) => {
                    target.set_value(s.as_str());
                }
            }
            written += 1;
        }

        let mut buf = Cursor::new(Vec::new());
        umya_spreadsheet::writer::xlsx::write_writer(&book, &mut buf)
            .map_err(|e| WorkbookError::Write(e.to_string()))?;

        tracing::info!(cells = written, bytes = buf.get_ref().len(), "Workbook serialized");
        Ok(buf.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mapping::{CellRef, OutputStateBuilder};

    fn template_bytes() -> Vec<u8> {
        let mut book = umya_spreadsheet::new_file();
        book.get_sheet_mut(&0).unwrap().set_name("RAE");
        book.new_sheet("DADOS").unwrap();
        book.get_sheet_by_name_mut("RAE")
            .unwrap()
            .get_cell_mut("B2")
            .set_value("modelo");

        let mut buf = Cursor::new(Vec::new());
        umya_spreadsheet::writer::xlsx::write_writer(&book, &mut buf).unwrap();
        buf.into_inner()
    }

    fn cell(a1: &str) -> CellRef {
        a1.parse().unwrap()
    }

    #[test]
    fn lists_template_sheets() {
        let template = XlsmTemplate::from_bytes(template_bytes()).unwrap();
        assert_eq!(template.sheet_names(), vec!["RAE".to_string(), "DADOS".to_string()]);
    }

    #[test]
    fn rejects_non_workbook_bytes() {
        assert!(matches!(
            XlsmTemplate::from_bytes(b"not a zip".to_vec()),
            Err(WorkbookError::Read(_))
        ));
    }

    #[test]
    fn writes_numbers_and_text() {
        let template = XlsmTemplate::from_bytes(template_bytes()).unwrap();
        let mut builder = OutputStateBuilder::new();
        builder.set("RAE", cell("AH66"), "avaliacao", CellValue::Number(250000.5));
        builder.set("DADOS", cell("D6"), "entrada", CellValue::Text("MARIA".into()));
        builder.set("AUSENTE", cell("A1"), "x", CellValue::Text("ignorado".into()));

        let bytes = template.serialize(&builder.build()).unwrap();
        let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes), true).unwrap();

        let rae = book.get_sheet_by_name("RAE").unwrap();
        assert_eq!(rae.get_value("AH66"), "250000.5");
        assert_eq!(rae.get_value("B2"), "modelo");
        assert_eq!(book.get_sheet_by_name("DADOS").unwrap().get_value("D6"), "MARIA");
        assert!(book.get_sheet_by_name("AUSENTE").is_none());
    }

    #[test]
    fn template_is_reusable() {
        let template = XlsmTemplate::from_bytes(template_bytes()).unwrap();
        let mut first = OutputStateBuilder::new();
        first.set("RAE", cell("C3"), "r", CellValue::Number(1.0));
        template.serialize(&first.build()).unwrap();

        let bytes = template.serialize(&OutputState::default()).unwrap();
        let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes), true).unwrap();
        assert_eq!(book.get_sheet_by_name("RAE").unwrap().get_value("C3"), "");
    }
}
