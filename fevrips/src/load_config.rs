/// `load_config` module: reads the optional YAML config file and merges it with command line flags.
///
/// The file has one section per pipeline. Every path in it may be omitted, since
/// the matching flag can supply it; [`RipsSection::resolve`] and
/// [`InvoiceSection::resolve`] combine both sources into the core config types,
/// with flags taking precedence.
///
/// ```yaml
/// rips:
///   workbook: ./RIPS.xlsx
///   output: ./out/rips.json
///   sheets:
///     procedures: PROCEDIMIENTOS
/// invoice:
///   input: ./factura.xml
///   output_dir: ./out
///   render:
///     description_max_len: 80
/// ```
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{anyhow, Result};
use fevrips_core::config::{InvoiceConfig, RipsConfig, SheetNames};
use fevrips_core::invoice::RenderOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub rips: RipsSection,
    #[serde(default)]
    pub invoice: InvoiceSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct RipsSection {
    pub workbook: Option<PathBuf>,
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub sheets: SheetNames,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceSection {
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub render: RenderOptions,
}

fn required(value: Option<PathBuf>, flag: &str, key: &str) -> Result<PathBuf> {
    value.ok_or_else(|| anyhow!("missing {key}: pass --{flag} or set it in the config file"))
}

impl RipsSection {
    pub fn resolve(self, workbook: Option<PathBuf>, output: Option<PathBuf>) -> Result<RipsConfig> {
        Ok(RipsConfig {
            workbook: required(workbook.or(self.workbook), "workbook", "rips.workbook")?,
            output: required(output.or(self.output), "output", "rips.output")?,
            sheets: self.sheets,
        })
    }
}

impl InvoiceSection {
    pub fn resolve(
        self,
        input: Option<PathBuf>,
        output_dir: Option<PathBuf>,
    ) -> Result<InvoiceConfig> {
        Ok(InvoiceConfig {
            input: required(input.or(self.input), "input", "invoice.input")?,
            output_dir: required(output_dir.or(self.output_dir), "output-dir", "invoice.output_dir")?,
            render: self.render,
        })
    }
}

/// Loads the YAML config file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// [`load_config`] when a path is given, otherwise an empty config so flags alone apply.
pub fn load_optional(path: Option<PathBuf>) -> Result<CliConfig> {
    match path {
        Some(path) => load_config(path),
        None => {
            info!("No config file given, using command line flags only");
            Ok(CliConfig::default())
        }
    }
}
