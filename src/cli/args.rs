//! CLI argument structures

use crate::config::PipelineConfig;
use crate::flow::KeyFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Classify LODES commute flows for a study area and build join-ready summaries
#[derive(Parser, Debug)]
#[command(name = "lodes-flow")]
#[command(about = "lodes-flow - classify origin-destination flows against a study area", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Hide the progress spinner
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a flow table and write the summary tables
    #[command(name = "run")]
    Run(RunArgs),

    /// Print the canonical join key for raw identifier values
    #[command(name = "normalize")]
    Normalize {
        /// Raw values, e.g. 480219501001000 or 4.80219501001e14
        #[arg(required = true)]
        values: Vec<String>,

        /// Zero-pad keys to this width
        #[arg(long)]
        key_width: Option<usize>,
    },

    /// Write a default configuration file
    #[command(name = "init-config")]
    InitConfig {
        /// Destination file
        #[arg(default_value = "lodes-flow.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Flags for `run`; each one overrides the config file and environment
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Origin-destination table (*.csv or *.csv.gz)
    #[arg(short = 's', long)]
    pub source: Option<PathBuf>,

    /// Study area block list
    #[arg(short = 'b', long)]
    pub blocks: Option<PathBuf>,

    /// Key column in the block list
    #[arg(long)]
    pub blocks_column: Option<String>,

    #[arg(long)]
    pub home_column: Option<String>,

    #[arg(long)]
    pub work_column: Option<String>,

    /// Column summed into the tables
    #[arg(long)]
    pub measure_column: Option<String>,

    /// Output directory
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Worker count for the parallel engine
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Rows per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Single pass in the main thread
    #[arg(long)]
    pub sequential: bool,

    /// Also write the four classified record subsets
    #[arg(long)]
    pub export_partitions: bool,

    /// Zero-pad join keys to this width
    #[arg(long)]
    pub key_width: Option<usize>,
}

impl RunArgs {
    /// Layer the flags over a loaded configuration
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(source) = &self.source {
            config.source = Some(source.clone());
        }
        if let Some(blocks) = &self.blocks {
            config.membership.path = Some(blocks.clone());
        }
        if let Some(column) = &self.blocks_column {
            config.membership.column = column.clone();
        }
        if let Some(column) = &self.home_column {
            config.columns.home = column.clone();
        }
        if let Some(column) = &self.work_column {
            config.columns.work = column.clone();
        }
        if let Some(column) = &self.measure_column {
            config.columns.measure = column.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(workers) = self.workers {
            config.execution.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.execution.batch_size = batch_size;
        }
        if self.sequential {
            config.execution.parallel = false;
        }
        if self.export_partitions {
            config.export_partitions = true;
        }
        if let Some(width) = self.key_width {
            config.key_format = KeyFormat::ZeroPadded { width };
        }
    }
}
