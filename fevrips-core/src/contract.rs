//! # contract: the seam between the pipelines and their inputs
//!
//! The RIPS pipeline never opens a workbook itself. It asks a [`WorkbookSource`]
//! for named sheets and works on the in-memory [`Sheet`] it gets back, so the
//! same loader runs against a real `.xlsx` file ([`crate::rips::xlsx::XlsxWorkbook`])
//! or against a mock in tests.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; enable the `test-export-mocks`
//!   feature (on by default) to get `MockWorkbookSource` outside this crate.

use chrono::NaiveDateTime;
use thiserror::Error;

/// One raw value read from a spreadsheet cell, before any field rules apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    /// A cell holding a spreadsheet error such as `#N/A` or `#DIV/0!`.
    Error(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Empty => write!(f, ""),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::DateTime(dt) => write!(f, "{dt}"),
            Cell::Error(e) => write!(f, "#{e}"),
        }
    }
}

/// A named sheet: the header row gives the column names, the remaining rows
/// hold the data in source order. Blank rows are kept so that row indices
/// match the data rows of the source sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Indices of the rows holding at least one value.
    pub fn data_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|c| *c != Cell::Empty))
            .map(|(i, _)| i)
    }

    /// Position of `column` in the header row.
    pub fn column_index(&self, column: &str) -> Result<usize, LoadError> {
        self.columns
            .iter()
            .position(|c| c.trim() == column)
            .ok_or_else(|| LoadError::MissingColumn {
                sheet: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Fails on the first column of `columns` absent from the header row.
    pub fn require_columns(&self, columns: &[&str]) -> Result<(), LoadError> {
        for column in columns {
            self.column_index(column)?;
        }
        Ok(())
    }

    /// Cell at `row` under `column`. Short rows read as [`Cell::Empty`].
    pub fn cell(&self, row: usize, column: &str) -> Result<&Cell, LoadError> {
        static EMPTY: Cell = Cell::Empty;
        let idx = self.column_index(column)?;
        Ok(self
            .rows
            .get(row)
            .and_then(|r| r.get(idx))
            .unwrap_or(&EMPTY))
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open workbook {path}: {message}")]
    Open { path: String, message: String },

    #[error("sheet '{0}' not found in workbook")]
    MissingSheet(String),

    #[error("sheet '{sheet}' has no column '{column}'")]
    MissingColumn { sheet: String, column: String },

    #[error("sheet '{sheet}' row {row}: required value '{column}' is missing")]
    MissingValue {
        sheet: String,
        row: usize,
        column: String,
    },

    #[error("sheet '{sheet}' row {row}: '{column}' is not a valid date: {value}")]
    InvalidDate {
        sheet: String,
        row: usize,
        column: String,
        value: String,
    },

    #[error("sheet '{sheet}' row {row}: identification number {id} appears more than once")]
    DuplicateSubject { sheet: String, row: usize, id: String },
}

/// Source of named sheets for the RIPS pipeline.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
pub trait WorkbookSource {
    /// Read the sheet called `name`, header row included.
    fn read_sheet(&mut self, name: &str) -> Result<Sheet, LoadError>;
}
