use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::invoice::render::RenderOptions;

/// Names of the four sheets of a RIPS workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetNames {
    pub header: String,
    pub subjects: String,
    pub consultations: String,
    pub procedures: String,
}

impl Default for SheetNames {
    fn default() -> Self {
        Self {
            header: "TRANSACCION".to_string(),
            subjects: "USUARIOS".to_string(),
            consultations: "CONSULTAS".to_string(),
            procedures: "PROCEDIMIENTOS".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RipsConfig {
    pub workbook: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub sheets: SheetNames,
}

impl RipsConfig {
    pub fn trace_loaded(&self) {
        info!(
            workbook = %self.workbook.display(),
            output = %self.output.display(),
            "Loaded RIPS config"
        );
        debug!(?self, "RIPS config loaded (full debug)");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub render: RenderOptions,
}

impl InvoiceConfig {
    pub fn trace_loaded(&self) {
        info!(
            input = %self.input.display(),
            output_dir = %self.output_dir.display(),
            "Loaded invoice config"
        );
        debug!(?self, "Invoice config loaded (full debug)");
    }
}
