//! Destinations for the classified record subsets

use crate::error::{ErrorCode, FlowError, Result};
use crate::flow::{Category, Classification, FlowRecord};
use csv::StringRecord;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Receives every classified record once per category it belongs to
pub trait PartitionSink {
    fn accept_category(&mut self, category: Category, record: &FlowRecord) -> Result<()>;

    fn accept(&mut self, classification: Classification, record: &FlowRecord) -> Result<()> {
        for category in classification.categories() {
            self.accept_category(*category, record)?;
        }
        Ok(())
    }

    /// When false the pipeline skips retaining records for this sink
    fn wants_records(&self) -> bool {
        true
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards partitions; used when only the summaries are needed
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PartitionSink for NullSink {
    fn accept_category(&mut self, _category: Category, _record: &FlowRecord) -> Result<()> {
        Ok(())
    }

    fn wants_records(&self) -> bool {
        false
    }
}

/// Keeps partitions in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryPartitionSink {
    partitions: BTreeMap<Category, Vec<FlowRecord>>,
}

impl MemoryPartitionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: Category) -> &[FlowRecord] {
        self.partitions
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self, category: Category) -> usize {
        self.get(category).len()
    }

    /// Source row numbers of a partition, sorted
    pub fn rows(&self, category: Category) -> Vec<u64> {
        let mut rows: Vec<u64> = self.get(category).iter().map(|r| r.row).collect();
        rows.sort_unstable();
        rows
    }
}

impl PartitionSink for MemoryPartitionSink {
    fn accept_category(&mut self, category: Category, record: &FlowRecord) -> Result<()> {
        self.partitions
            .entry(category)
            .or_default()
            .push(record.clone());
        Ok(())
    }
}

/// Writes `<category>.csv` for each category, carrying every source column
pub struct CsvPartitionWriter {
    writers: BTreeMap<Category, (PathBuf, csv::Writer<File>)>,
}

impl CsvPartitionWriter {
    pub fn create(dir: &Path, headers: &StringRecord) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            FlowError::output_with_code(
                ErrorCode::OUTPUT_WRITE_FAILED,
                "cannot create output directory",
                Some(dir.to_path_buf()),
            )
            .with_source(e)
        })?;

        let mut writers = BTreeMap::new();
        for category in Category::ALL {
            let path = dir.join(format!("{}.csv", category.as_str()));
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_path(&path)
                .map_err(|e| write_failed(&path, e))?;
            writer
                .write_record(headers)
                .map_err(|e| write_failed(&path, e))?;
            debug!("Opened partition file {}", path.display());
            writers.insert(category, (path, writer));
        }

        Ok(Self { writers })
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.writers.values().map(|(p, _)| p.as_path()).collect()
    }
}

impl PartitionSink for CsvPartitionWriter {
    fn accept_category(&mut self, category: Category, record: &FlowRecord) -> Result<()> {
        if let Some((path, writer)) = self.writers.get_mut(&category) {
            writer
                .write_record(record.fields())
                .map_err(|e| write_failed(path, e))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for (path, writer) in self.writers.values_mut() {
            writer.flush().map_err(|e| {
                FlowError::output_with_code(
                    ErrorCode::OUTPUT_WRITE_FAILED,
                    "flush failed",
                    Some(path.clone()),
                )
                .with_source(e)
            })?;
        }
        Ok(())
    }
}

fn write_failed(path: &Path, err: csv::Error) -> FlowError {
    FlowError::output_with_code(
        ErrorCode::OUTPUT_WRITE_FAILED,
        "cannot write partition file",
        Some(path.to_path_buf()),
    )
    .with_source(err)
}
