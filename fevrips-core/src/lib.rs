#![doc = "fevrips-core: pipelines for RIPS JSON generation and electronic invoice reports."]

//! This crate holds the data models, loaders and renderers behind the `fevrips` CLI.
//! It has two independent pipelines:
//!
//! - [`rips`]: a four-sheet RIPS workbook becomes one JSON document.
//! - [`invoice`]: a DIAN electronic invoice (wrapped in its `AttachedDocument`
//!   envelope or bare) becomes a paginated PDF report.
//!
//! # Usage
//! Call [`rips::run`] or [`invoice::run`] with the matching section of [`config`],
//! or use [`rips::generate`] and [`invoice::process`] directly on in-memory input.

pub mod config;
pub mod contract;
pub mod invoice;
pub mod rips;
