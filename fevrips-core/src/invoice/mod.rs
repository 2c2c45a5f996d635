//! Invoice pipeline: wrapped UBL invoice → PDF report.
//!
//! [`process`] is the in-memory core (extract then render). [`run`] adds the
//! file boundary: it reads the configured input, writes the report into the
//! output directory under a timestamped name and returns what the console
//! summary needs.
//!
//! # Error Handling
//! Missing fields never fail a run; they read as placeholders. Markup that
//! does not parse, and amounts that are not numbers, stop it with an
//! [`InvoiceError`].

pub mod extract;
pub mod model;
pub mod money;
pub mod render;

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tracing::{error, info};

use crate::config::InvoiceConfig;
pub use extract::{extract_invoice, unwrap_escaped_block, ExtractError};
use model::{Invoice, PLACEHOLDER};
pub use render::{render_report, RenderError, RenderOptions};

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result of a file-to-file run, for the console summary.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceSummary {
    pub report: PathBuf,
    pub number: String,
    pub issuer: String,
    pub recipient: String,
    /// Formatted payable total, or the placeholder when the invoice has no totals.
    pub payable: String,
}

/// `factura_<number>_<YYYYmmdd_HHMMSS>.pdf`, with anything but letters,
/// digits, `-` and `_` in the number replaced by `_`.
pub fn report_file_name(invoice: &Invoice, generated_at: NaiveDateTime) -> String {
    let number: String = invoice
        .number
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "factura_{number}_{}.pdf",
        generated_at.format("%Y%m%d_%H%M%S")
    )
}

/// Extract the invoice from `text` and render its report.
pub fn process(text: &str, options: &RenderOptions) -> Result<(Invoice, Vec<u8>), InvoiceError> {
    let invoice = extract_invoice(text)?;
    let pdf = render_report(&invoice, options)?;
    Ok((invoice, pdf))
}

fn summarize(invoice: &Invoice, report: PathBuf) -> Result<InvoiceSummary, InvoiceError> {
    let party_name = |party: &Option<model::Party>| {
        party
            .as_ref()
            .map_or_else(|| PLACEHOLDER.to_string(), |p| p.name.clone())
    };
    let payable = match &invoice.totals {
        Some(totals) => money::format_currency("payable total", &totals.payable)?,
        None => PLACEHOLDER.to_string(),
    };
    Ok(InvoiceSummary {
        report,
        number: invoice.number.clone(),
        issuer: party_name(&invoice.issuer),
        recipient: party_name(&invoice.recipient),
        payable,
    })
}

/// Read the configured input, render the report and write it to the output directory.
pub fn run(config: &InvoiceConfig) -> Result<InvoiceSummary, InvoiceError> {
    config.trace_loaded();
    let result = write_report(config);
    if let Err(e) = &result {
        error!(error = %e, input = %config.input.display(), "[INVOICE] Report generation failed");
    }
    result
}

fn write_report(config: &InvoiceConfig) -> Result<InvoiceSummary, InvoiceError> {
    let text = std::fs::read_to_string(&config.input).map_err(|source| InvoiceError::Read {
        path: config.input.clone(),
        source,
    })?;
    let (invoice, pdf) = process(&text, &config.render)?;

    let path = config
        .output_dir
        .join(report_file_name(&invoice, Local::now().naive_local()));
    let write_err = |source| InvoiceError::Write {
        path: path.clone(),
        source,
    };
    std::fs::create_dir_all(&config.output_dir).map_err(write_err)?;
    std::fs::write(&path, &pdf).map_err(write_err)?;
    info!(path = %path.display(), bytes = pdf.len(), "[INVOICE] Wrote PDF report");

    summarize(&invoice, path)
}
