//! Pipeline configuration
//!
//! Settings come from three layers, later ones winning: a TOML file,
//! `LODES_FLOW_*` environment variables, then command-line flags.

use crate::error::{ErrorCode, FlowError, Result};
use crate::flow::KeyFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod loader;

pub use loader::{load_config, load_config_or_default};

/// Widest zero-padded key accepted; u64 never needs more
pub const MAX_KEY_WIDTH: usize = 20;

/// Names of the home, work and measure columns in the flow table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub home: String,
    pub work: String,
    pub measure: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        // LODES OD column names; S000 is the total job count
        Self {
            home: "h_geocode".to_string(),
            work: "w_geocode".to_string(),
            measure: "S000".to_string(),
        }
    }
}

/// Where the study-area block list comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipConfig {
    pub path: Option<PathBuf>,
    pub column: String,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            path: None,
            column: "GEOID".to_string(),
        }
    }
}

/// Parallelism knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Run the batch/worker engine instead of a single in-thread pass
    pub parallel: bool,
    pub workers: usize,
    /// Rows per batch handed to a worker
    pub batch_size: usize,
    /// Parsed batches allowed to wait for a worker
    pub queue_depth: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            batch_size: 50_000,
            queue_depth: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Flow table (`*_od_*.csv.gz`)
    pub source: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Also write the four classified record subsets with all columns
    pub export_partitions: bool,
    pub max_logged_discards: usize,
    pub columns: ColumnMapping,
    pub membership: MembershipConfig,
    pub key_format: KeyFormat,
    pub execution: ExecutionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: None,
            output_dir: PathBuf::from("lodes_output"),
            export_partitions: false,
            max_logged_discards: crate::flow::DEFAULT_MAX_LOGGED_DISCARDS,
            columns: ColumnMapping::default(),
            membership: MembershipConfig::default(),
            key_format: KeyFormat::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Apply `LODES_FLOW_*` environment overrides
    pub fn merge_env_vars(&mut self) -> Result<()> {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    fn merge_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(workers) = lookup("LODES_FLOW_WORKERS") {
            self.execution.workers = parse_env_number("LODES_FLOW_WORKERS", &workers)?;
        }
        if let Some(batch_size) = lookup("LODES_FLOW_BATCH_SIZE") {
            self.execution.batch_size = parse_env_number("LODES_FLOW_BATCH_SIZE", &batch_size)?;
        }
        if let Some(dir) = lookup("LODES_FLOW_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Check the settings before any input is touched
    pub fn validate(&self) -> Result<()> {
        let columns = [
            ("columns.home", &self.columns.home),
            ("columns.work", &self.columns.work),
            ("columns.measure", &self.columns.measure),
        ];
        for (field, value) in columns {
            if value.trim().is_empty() {
                return Err(invalid(field, "column name must not be empty"));
            }
        }
        if self.columns.home == self.columns.work {
            return Err(invalid(
                "columns.work",
                "home and work columns must be different",
            ));
        }
        if self.membership.column.trim().is_empty() {
            return Err(invalid("membership.column", "column name must not be empty"));
        }
        if self.execution.workers == 0 {
            return Err(invalid("execution.workers", "must be at least 1"));
        }
        if self.execution.batch_size == 0 {
            return Err(invalid("execution.batch_size", "must be at least 1"));
        }
        if self.execution.queue_depth == 0 {
            return Err(invalid("execution.queue_depth", "must be at least 1"));
        }
        validate_key_format(self.key_format)
    }

    /// Source path, required once all layers are merged
    pub fn require_source(&self) -> Result<&PathBuf> {
        self.source.as_ref().ok_or_else(|| {
            FlowError::config_with_code(
                ErrorCode::CONFIG_MISSING_REQUIRED,
                "no flow table given (use --source or `source` in the config file)",
                Some("source".to_string()),
            )
        })
    }

    /// Block list path, required once all layers are merged
    pub fn require_membership_path(&self) -> Result<&PathBuf> {
        self.membership.path.as_ref().ok_or_else(|| {
            FlowError::config_with_code(
                ErrorCode::CONFIG_MISSING_REQUIRED,
                "no study area block list given (use --blocks or `membership.path`)",
                Some("membership.path".to_string()),
            )
        })
    }
}

/// Reject zero-padded widths outside `1..=MAX_KEY_WIDTH`
pub fn validate_key_format(format: KeyFormat) -> Result<()> {
    if let KeyFormat::ZeroPadded { width } = format {
        if width == 0 || width > MAX_KEY_WIDTH {
            return Err(invalid(
                "key_format.width",
                format!("must be between 1 and {}", MAX_KEY_WIDTH),
            ));
        }
    }
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> FlowError {
    FlowError::config_with_code(
        ErrorCode::CONFIG_INVALID_VALUE,
        message,
        Some(field.to_string()),
    )
}

fn parse_env_number(key: &str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| {
        FlowError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            format!("expected a positive integer, got '{}'", value),
            Some(key.to_string()),
        )
    })
}
