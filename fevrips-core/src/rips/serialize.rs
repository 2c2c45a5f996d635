//! RIPS document serialisation.
//!
//! The tree is built with `serde_json`, then passed once through
//! [`normalize_nulls`] so that no "nan" text survives into the output. When
//! the whole document cannot be serialised, each top-level section is tried
//! on its own and the failing ones are named in the error.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use super::coerce::is_nan_text;
use super::model::{Subject, Transaction};

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to serialise RIPS document: {}", describe(.sections))]
    Sections { sections: Vec<SectionFailure> },

    #[error("failed to serialise RIPS document: {0}")]
    Document(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionFailure {
    pub section: &'static str,
    pub message: String,
}

fn describe(sections: &[SectionFailure]) -> String {
    sections
        .iter()
        .map(|s| format!("section '{}': {}", s.section, s.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RipsDocument<'a> {
    num_documento_id_obligado: &'a str,
    num_factura: &'a str,
    tipo_nota: &'a str,
    num_nota: Option<&'a str>,
    usuarios: &'a [Subject],
}

impl RipsDocument<'_> {
    fn sections(&self) -> Vec<(&'static str, Result<Value, serde_json::Error>)> {
        vec![
            ("numDocumentoIdObligado", serde_json::to_value(self.num_documento_id_obligado)),
            ("numFactura", serde_json::to_value(self.num_factura)),
            ("tipoNota", serde_json::to_value(self.tipo_nota)),
            ("numNota", serde_json::to_value(self.num_nota)),
            ("usuarios", serde_json::to_value(self.usuarios)),
        ]
    }
}

/// Build the JSON tree for one batch.
pub fn to_document(transaction: &Transaction, subjects: &[Subject]) -> Result<Value, SerializeError> {
    let document = RipsDocument {
        num_documento_id_obligado: &transaction.num_documento_id_obligado,
        num_factura: "",
        tipo_nota: &transaction.tipo_nota,
        num_nota: transaction.num_nota.as_deref(),
        usuarios: subjects,
    };

    match serde_json::to_value(&document) {
        Ok(mut value) => {
            normalize_nulls(&mut value);
            Ok(value)
        }
        Err(whole) => {
            error!(error = %whole, "[RIPS] Document serialisation failed, checking sections");
            let sections: Vec<SectionFailure> = document
                .sections()
                .into_iter()
                .filter_map(|(section, result)| {
                    result.err().map(|e| SectionFailure {
                        section,
                        message: e.to_string(),
                    })
                })
                .collect();
            for failure in &sections {
                error!(section = failure.section, error = %failure.message, "[RIPS] Section failed to serialise");
            }
            if sections.is_empty() {
                Err(SerializeError::Document(whole))
            } else {
                Err(SerializeError::Sections { sections })
            }
        }
    }
}

/// Replace every string spelling "nan" with null, anywhere in the tree.
pub fn normalize_nulls(value: &mut Value) {
    match value {
        Value::String(s) if is_nan_text(s) => *value = Value::Null,
        Value::Array(items) => items.iter_mut().for_each(normalize_nulls),
        Value::Object(map) => map.values_mut().for_each(normalize_nulls),
        _ => {}
    }
}

/// Two-space indented JSON. Non-ASCII text is written as-is.
pub fn render_json(value: &Value) -> String {
    // A `Value` always serialises.
    serde_json::to_string_pretty(value).unwrap_or_default()
}
