use crate::error::{ErrorCode, FlowError, Result};
use crate::flow::{CategoryCounts, DiscardTally, StatTable, SummarySet, SummaryTable};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Everything a completed run exposes
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub summaries: SummarySet,
    pub categories: CategoryCounts,
    pub discards: DiscardTally,
    /// Data rows consumed from the source, discards included
    pub rows_read: u64,
    pub elapsed: Duration,
}

impl PipelineOutput {
    pub fn summary(&self, table: StatTable) -> &SummaryTable {
        self.summaries.get(table)
    }

    pub fn records_accepted(&self) -> u64 {
        self.rows_read.saturating_sub(self.discards.total())
    }

    pub fn unclassified(&self) -> u64 {
        self.categories.unclassified
    }

    /// Write `statTable1.csv` .. `statTable5.csv` into `dir`
    pub fn write_tables(&self, dir: &Path, measure: &str) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(|e| {
            FlowError::output_with_code(
                ErrorCode::OUTPUT_WRITE_FAILED,
                "cannot create output directory",
                Some(dir.to_path_buf()),
            )
            .with_source(e)
        })?;

        let mut written = Vec::with_capacity(StatTable::ALL.len());
        for table in StatTable::ALL {
            let path = dir.join(format!("{}.csv", table.name()));
            let file = std::fs::File::create(&path).map_err(|e| {
                FlowError::output_with_code(
                    ErrorCode::OUTPUT_WRITE_FAILED,
                    "cannot create summary file",
                    Some(path.clone()),
                )
                .with_source(e)
            })?;
            write_summary_csv(self.summary(table), file, measure)
                .map_err(|e| e.with_context(path.display()))?;
            debug!("Wrote {} ({} keys)", path.display(), self.summary(table).len());
            written.push(path);
        }
        Ok(written)
    }
}

/// Write one summary as `<key field>,FREQUENCY,SUM_<measure>` rows
pub fn write_summary_csv<W: Write>(table: &SummaryTable, writer: W, measure: &str) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    let sum_column = format!("SUM_{}", measure);
    csv.write_record([table.key_field(), "FREQUENCY", sum_column.as_str()])?;
    for (key, entry) in table.iter() {
        csv.write_record([
            key,
            entry.frequency.to_string().as_str(),
            entry.sum.to_string().as_str(),
        ])?;
    }
    csv.flush().map_err(|e| {
        FlowError::output_with_code(ErrorCode::OUTPUT_WRITE_FAILED, "flush failed", None)
            .with_source(e)
    })?;
    Ok(())
}
