//! `.xlsx` workbook source backed by calamine.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, DataType, Range, Reader, Xlsx};
use tracing::{debug, error, info};

use crate::contract::{Cell, LoadError, Sheet, WorkbookSource};

pub struct XlsxWorkbook {
    path: PathBuf,
    workbook: Xlsx<BufReader<File>>,
}

impl XlsxWorkbook {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let workbook: Xlsx<_> = open_workbook(path).map_err(|e: calamine::XlsxError| {
            error!(error = %e, path = %path.display(), "[RIPS] Failed to open workbook");
            LoadError::Open {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        info!(path = %path.display(), sheets = ?workbook.sheet_names(), "[RIPS] Opened workbook");
        Ok(Self {
            path: path.to_path_buf(),
            workbook,
        })
    }
}

impl WorkbookSource for XlsxWorkbook {
    fn read_sheet(&mut self, name: &str) -> Result<Sheet, LoadError> {
        if !self.workbook.sheet_names().iter().any(|n| n == name) {
            return Err(LoadError::MissingSheet(name.to_string()));
        }
        let range = self
            .workbook
            .worksheet_range(name)
            .map_err(|e| LoadError::Open {
                path: self.path.display().to_string(),
                message: format!("sheet '{name}': {e}"),
            })?;
        let sheet = sheet_from_range(name, &range);
        debug!(sheet = name, rows = sheet.len(), columns = sheet.columns().len(), "[RIPS] Read sheet");
        Ok(sheet)
    }
}

/// First row is the header. Blank rows stay in place so row numbers in
/// diagnostics match the sheet; loaders skip them.
pub fn sheet_from_range(name: &str, range: &Range<Data>) -> Sheet {
    let mut rows = range.rows();
    let columns = rows
        .next()
        .map(|header| header.iter().map(|d| d.to_string().trim().to_string()).collect())
        .unwrap_or_default();
    let data = rows
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect();
    Sheet::new(name, columns, data)
}

pub fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => data
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Text(data.to_string())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Error(e.to_string()),
    }
}
