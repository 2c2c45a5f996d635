//! Explicit column → formatter rules for turning raw cells into RIPS values.
//!
//! Every column read by the loader goes through [`coerce`] with the
//! [`FieldFormat`] its [`FormatRules`] entry names. Missing values are decided
//! in exactly one place, [`is_missing`], before any formatter runs.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::contract::Cell;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

const DATE_TIME_INPUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_INPUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    /// `YYYY-MM-DD`
    DateOnly,
    /// `YYYY-MM-DD HH:MM`
    DateTime,
    /// Identifiers and provider/facility codes: always a string, never a number.
    Text,
    /// Integral numbers become integers, other numbers floats, text stays text.
    Default,
}

/// Column name → [`FieldFormat`]. Columns without an entry use [`FieldFormat::Default`].
#[derive(Debug, Clone, Default)]
pub struct FormatRules {
    rules: HashMap<String, FieldFormat>,
}

impl FormatRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, format: FieldFormat) -> Self {
        self.rules.insert(column.into(), format);
        self
    }

    pub fn format_for(&self, column: &str) -> FieldFormat {
        self.rules
            .get(column)
            .copied()
            .unwrap_or(FieldFormat::Default)
    }

    /// The rules for the four RIPS sheets.
    pub fn rips() -> Self {
        let text_columns = [
            // TRANSACCION
            "numDocumentoIdObligado",
            "numNota",
            "codPrestador",
            // USUARIOS
            "tipoDocumento",
            "numDocumento",
            "codSexo",
            "PaisResidencia",
            "MunicipioResidencia",
            "ZonaResidencia",
            "PaisOrigen",
            // CONSULTAS / PROCEDIMIENTOS
            "IDPaciente",
            "CUPS",
            "finalidadTecnologiaSalud",
            "causaMotivoAtencion",
            "CIE10_Principal",
            "CIE10_relacionado",
            "CIE10_relacionado1",
            "CIE10_relacionado2",
            "CIE10_relacionado3",
            "tipoDiagnosticoPrincipal",
        ];
        text_columns
            .into_iter()
            .fold(Self::new(), |rules, column| rules.with(column, FieldFormat::Text))
            .with("fechaNacimiento", FieldFormat::DateOnly)
            .with("fechaInicioAtencion", FieldFormat::DateTime)
    }
}

/// A normalised field value, ready for serialisation.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
}

impl Scalar {
    /// Text form, `None` for null. Numbers are printed the way [`FieldFormat::Text`] would.
    pub fn into_text(self) -> Option<String> {
        match self {
            Scalar::Null => None,
            Scalar::Text(s) => Some(s),
            Scalar::Int(i) => Some(i.to_string()),
            Scalar::Float(f) => Some(number_text(f)),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_none(),
            Scalar::Text(s) => serializer.serialize_str(s),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) if f.is_nan() => serializer.serialize_none(),
            Scalar::Float(f) if f.is_infinite() => Err(serde::ser::Error::custom(format!(
                "non-finite number {f} cannot be represented"
            ))),
            Scalar::Float(f) => serializer.serialize_f64(*f),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("not a valid date: {0}")]
pub struct InvalidDate(pub String);

/// Text that spells a missing number: `nan`, `NaN`, `NAN`...
pub fn is_nan_text(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("nan")
}

/// The single missing-value test: empty cells, error cells, NaN floats,
/// blank text and the literal text "nan".
pub fn is_missing(cell: &Cell) -> bool {
    match cell {
        Cell::Empty | Cell::Error(_) => true,
        Cell::Float(f) => f.is_nan(),
        Cell::Text(s) => s.trim().is_empty() || is_nan_text(s),
        Cell::Bool(_) | Cell::Int(_) | Cell::DateTime(_) => false,
    }
}

/// Apply `format` to `cell`. Missing cells always come back as [`Scalar::Null`].
pub fn coerce(cell: &Cell, format: FieldFormat) -> Result<Scalar, InvalidDate> {
    if is_missing(cell) {
        return Ok(Scalar::Null);
    }
    let scalar = match format {
        FieldFormat::DateOnly => {
            Scalar::Text(parse_date_time(cell)?.format(DATE_FORMAT).to_string())
        }
        FieldFormat::DateTime => {
            Scalar::Text(parse_date_time(cell)?.format(DATE_TIME_FORMAT).to_string())
        }
        FieldFormat::Text => Scalar::Text(cell_text(cell)),
        FieldFormat::Default => match cell {
            Cell::Int(i) => Scalar::Int(*i),
            Cell::Float(f) if is_integral(*f) => Scalar::Int(*f as i64),
            Cell::Float(f) => Scalar::Float(*f),
            other => Scalar::Text(cell_text(other)),
        },
    };
    Ok(scalar)
}

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Float(f) => number_text(*f),
        Cell::Text(s) => s.trim().to_string(),
        Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        other => other.to_string(),
    }
}

fn is_integral(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15
}

/// `123.0` prints as `123`, so numeric ids read from a sheet keep their shape.
fn number_text(f: f64) -> String {
    if is_integral(f) {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

fn parse_date_time(cell: &Cell) -> Result<NaiveDateTime, InvalidDate> {
    match cell {
        Cell::DateTime(dt) => Ok(*dt),
        Cell::Text(s) => {
            let s = s.trim();
            DATE_TIME_INPUTS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .or_else(|| {
                    DATE_INPUTS
                        .iter()
                        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .ok_or_else(|| InvalidDate(s.to_string()))
        }
        other => Err(InvalidDate(other.to_string())),
    }
}
