//! RIPS pipeline: four-sheet workbook → one JSON document.
//!
//! Runs load → attach → prune → serialise over an in-memory workbook
//! supplied by a [`WorkbookSource`]. File access is limited to [`run`],
//! which opens the `.xlsx` and writes the result.
//!
//! # Error Handling
//! A line item whose subject does not exist is skipped with a warning and
//! listed in the [`AssemblyReport`]. Its other cells are never read.
//! Everything else (missing sheets or columns, bad dates, duplicate
//! subjects, unserialisable values) stops the run with a [`RipsError`].

pub mod assemble;
pub mod coerce;
pub mod load;
pub mod model;
pub mod serialize;
pub mod xlsx;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::config::{RipsConfig, SheetNames};
use crate::contract::{LoadError, WorkbookSource};
pub use assemble::{AssemblyReport, ItemKind, LineItems, Orphan, SubjectCounts};
use coerce::FormatRules;
pub use serialize::{SectionFailure, SerializeError};

#[derive(Debug, Error)]
pub enum RipsError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The serialised document plus what happened while building it.
#[derive(Debug, Clone)]
pub struct RipsOutcome {
    pub document: Value,
    pub report: AssemblyReport,
}

/// Result of a file-to-file run, for the console summary.
#[derive(Debug, Clone)]
pub struct RipsSummary {
    pub output: PathBuf,
    pub report: AssemblyReport,
}

/// Build the RIPS document from the four sheets named in `sheets`.
pub fn generate<W>(source: &mut W, sheets: &SheetNames) -> Result<RipsOutcome, RipsError>
where
    W: WorkbookSource + ?Sized,
{
    let rules = FormatRules::rips();

    let transaction = load::load_transaction(&source.read_sheet(&sheets.header)?, &rules)?;
    let mut subjects = load::load_subjects(&source.read_sheet(&sheets.subjects)?, &rules)?;
    let known: HashSet<String> = subjects
        .iter()
        .map(|s| s.num_documento_identificacion.clone())
        .collect();
    let consultations = load::load_consultations(
        &source.read_sheet(&sheets.consultations)?,
        &transaction,
        &known,
        &rules,
    )?;
    let procedures = load::load_procedures(
        &source.read_sheet(&sheets.procedures)?,
        &transaction,
        &known,
        &rules,
    )?;

    let report = assemble::attach(&mut subjects, consultations, procedures);
    for counts in &report.subjects {
        info!(
            subject = %counts.subject_id,
            consultations = counts.consultations,
            procedures = counts.procedures,
            "[RIPS] Services before cleanup"
        );
    }
    assemble::prune_empty_services(&mut subjects);

    let document = serialize::to_document(&transaction, &subjects)?;
    Ok(RipsOutcome { document, report })
}

/// Write `document` to `path`, creating parent directories as needed.
pub fn write_document(path: &Path, document: &Value) -> Result<(), RipsError> {
    let io_err = |source| RipsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, serialize::render_json(document)).map_err(io_err)?;
    info!(path = %path.display(), "[RIPS] Wrote JSON document");
    Ok(())
}

/// Open the configured workbook, build the document and write it out.
pub fn run(config: &RipsConfig) -> Result<RipsSummary, RipsError> {
    config.trace_loaded();
    let result = xlsx::XlsxWorkbook::open(&config.workbook)
        .map_err(RipsError::from)
        .and_then(|mut workbook| generate(&mut workbook, &config.sheets))
        .and_then(|outcome| {
            write_document(&config.output, &outcome.document)?;
            Ok(RipsSummary {
                output: config.output.clone(),
                report: outcome.report,
            })
        });
    if let Err(e) = &result {
        error!(error = %e, "[RIPS] Generation failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Cell, MockWorkbookSource, Sheet};
    use mockall::predicate::eq;

    fn sheet(name: &str, columns: &[&str], rows: Vec<Vec<Cell>>) -> Sheet {
        Sheet::new(name, columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn missing_sheet_stops_the_run() {
        let mut source = MockWorkbookSource::new();
        source
            .expect_read_sheet()
            .with(eq("TRANSACCION"))
            .return_once(|name| Err(LoadError::MissingSheet(name.to_string())));

        let err = generate(&mut source, &SheetNames::default()).unwrap_err();
        assert_eq!(err.to_string(), "sheet 'TRANSACCION' not found in workbook");
    }

    #[test]
    fn custom_sheet_names_are_requested() {
        let names = SheetNames {
            header: "T".into(),
            subjects: "U".into(),
            consultations: "C".into(),
            procedures: "P".into(),
        };
        let mut source = MockWorkbookSource::new();
        source.expect_read_sheet().returning(|name| {
            Ok(match name {
                "T" => sheet(
                    name,
                    load::TRANSACTION_COLUMNS,
                    vec![vec![Cell::Int(900123456), Cell::Int(1), Cell::Int(110010123401)]],
                ),
                "U" => sheet(name, load::SUBJECT_COLUMNS, vec![]),
                "C" => sheet(name, load::CONSULTATION_COLUMNS, vec![]),
                "P" => sheet(name, load::PROCEDURE_COLUMNS, vec![]),
                other => panic!("unexpected sheet {other}"),
            })
        });

        let outcome = generate(&mut source, &names).unwrap();
        assert_eq!(outcome.document["usuarios"], serde_json::json!([]));
        assert_eq!(outcome.document["numNota"], serde_json::json!("1"));
    }
}
