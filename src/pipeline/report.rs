//! Machine-readable summary of a run, written as `run_report.json`

use super::output::PipelineOutput;
use super::ExecutionMode;
use crate::error::{ErrorCode, FlowError, Result};
use crate::flow::{Category, CategoryTotals, DiscardTally, Endpoint, StatTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const REPORT_FILE_NAME: &str = "run_report.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: StatTable,
    pub category: Category,
    pub endpoint: Endpoint,
    pub key_field: String,
    pub keys: usize,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub source: Option<PathBuf>,
    pub mode: ExecutionMode,
    pub workers: usize,
    pub study_area_blocks: usize,
    pub rows_read: u64,
    pub records_accepted: u64,
    pub unclassified: u64,
    pub categories: BTreeMap<Category, CategoryTotals>,
    pub discards: DiscardTally,
    pub tables: Vec<TableReport>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn new(
        output: &PipelineOutput,
        source: Option<PathBuf>,
        mode: ExecutionMode,
        workers: usize,
        study_area_blocks: usize,
    ) -> Self {
        let tables = output
            .summaries
            .iter()
            .map(|(table, summary)| TableReport {
                table,
                category: summary.category(),
                endpoint: summary.endpoint(),
                key_field: summary.key_field().to_string(),
                keys: summary.len(),
                total: summary.total(),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            source,
            mode,
            workers,
            study_area_blocks,
            rows_read: output.rows_read,
            records_accepted: output.records_accepted(),
            unclassified: output.unclassified(),
            categories: output.categories.iter().collect(),
            discards: output.discards.clone(),
            tables,
            elapsed_ms: output.elapsed.as_millis() as u64,
        }
    }

    /// Write the report into `dir`, returning the file path
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(REPORT_FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| {
            FlowError::output_with_code(
                ErrorCode::OUTPUT_WRITE_FAILED,
                "cannot write run report",
                Some(path.clone()),
            )
            .with_source(e)
        })?;
        Ok(path)
    }
}
