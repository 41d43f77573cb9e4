//! # lodes-flow
//!
//! Classifies LEHD LODES origin-destination commute flows against a study
//! area and aggregates them into join-ready summary tables.
//!
//! ## Usage
//!
//! ```bash
//! lodes-flow run --source tx_od_main_JT00_2021.csv.gz --blocks study_area_blocks.csv
//! ```
//!
//! ## Modules
//!
//! - `app` - Logging setup and fatal error reporting for the binary
//! - `cli` - Argument parsing and command implementations
//! - `config` - TOML/environment configuration
//! - `error` - Coded fatal errors
//! - `flow` - Identifiers, membership, streaming source, classification and aggregation
//! - `pipeline` - Sequential and batch/worker orchestration, partition sinks, outputs
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod pipeline;

pub use error::{FlowError, Result};
