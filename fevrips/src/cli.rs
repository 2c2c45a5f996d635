/// # fevrips CLI Interface (Module)
///
/// Command parsing and orchestration for the `fevrips` binary. All data models,
/// loaders and renderers live in the [`fevrips-core`] crate; this module only
/// merges flags with the config file, calls the pipeline and prints its summary.
///
/// ## Subcommands
/// - `rips`: build the RIPS JSON document from a four-sheet workbook.
/// - `invoice`: render a DIAN electronic invoice as a PDF report.
///
/// Both accept `--config` (or `FEVRIPS_CONFIG`) plus path flags that override
/// the file. Progress and summaries go to stdout; failures are returned as
/// errors and reported by `main`.
///
/// [`fevrips-core`]: ../../fevrips-core/
use crate::load_config::load_optional;
use anyhow::Result;
use clap::{Parser, Subcommand};
use fevrips_core::invoice::{self, InvoiceSummary};
use fevrips_core::rips::{self, RipsSummary};
use std::path::PathBuf;

/// CLI for fevrips: RIPS JSON generation and electronic invoice reports.
#[derive(Parser)]
#[clap(
    name = "fevrips",
    version,
    about = "Build RIPS JSON documents from workbooks and PDF reports from DIAN electronic invoices"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the RIPS JSON document from a four-sheet workbook
    Rips {
        /// Path to the YAML config file
        #[clap(long, env = "FEVRIPS_CONFIG")]
        config: Option<PathBuf>,
        /// Workbook to read, overriding `rips.workbook`
        #[clap(long)]
        workbook: Option<PathBuf>,
        /// JSON file to write, overriding `rips.output`
        #[clap(long)]
        output: Option<PathBuf>,
    },
    /// Render an electronic invoice (bare or in its envelope) as a PDF report
    Invoice {
        /// Path to the YAML config file
        #[clap(long, env = "FEVRIPS_CONFIG")]
        config: Option<PathBuf>,
        /// Invoice XML to read, overriding `invoice.input`
        #[clap(long)]
        input: Option<PathBuf>,
        /// Directory for the report, overriding `invoice.output_dir`
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },
}

/// CLI logic entrypoint for integration tests and main()
pub fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Rips {
            config,
            workbook,
            output,
        } => {
            let config = load_optional(config)?.rips.resolve(workbook, output)?;
            tracing::info!(command = "rips", "Starting RIPS generation");
            match rips::run(&config) {
                Ok(summary) => {
                    print_rips_summary(&summary);
                    tracing::info!(command = "rips", output = %summary.output.display(), "RIPS generation complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "rips", error = %e, "RIPS generation failed");
                    Err(anyhow::Error::new(e).context("RIPS generation failed"))
                }
            }
        }
        Commands::Invoice {
            config,
            input,
            output_dir,
        } => {
            let config = load_optional(config)?.invoice.resolve(input, output_dir)?;
            tracing::info!(command = "invoice", "Starting invoice report");
            match invoice::run(&config) {
                Ok(summary) => {
                    print_invoice_summary(&summary);
                    tracing::info!(command = "invoice", report = %summary.report.display(), "Invoice report complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "invoice", error = %e, "Invoice report failed");
                    Err(anyhow::Error::new(e).context("Invoice report failed"))
                }
            }
        }
    }
}

fn print_rips_summary(summary: &RipsSummary) {
    let report = &summary.report;
    println!("Services per subject before cleanup:");
    for counts in &report.subjects {
        println!(
            "  {}: {} consultations, {} procedures",
            counts.subject_id, counts.consultations, counts.procedures
        );
    }
    for orphan in &report.orphans {
        println!(
            "Warning: skipped {} on row {}: no subject '{}'",
            orphan.kind,
            orphan.source_row,
            orphan.subject_id.as_deref().unwrap_or("")
        );
    }
    println!("RIPS document written to {}", summary.output.display());
    println!(
        "  {} subjects, {} consultations, {} procedures",
        report.subjects.len(),
        report.consultations(),
        report.procedures()
    );
}

fn print_invoice_summary(summary: &InvoiceSummary) {
    println!("PDF report written to {}", summary.report.display());
    println!("  Invoice:   {}", summary.number);
    println!("  Issuer:    {}", summary.issuer);
    println!("  Recipient: {}", summary.recipient);
    println!("  Total:     {}", summary.payable);
}
