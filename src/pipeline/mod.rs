//! Run orchestration
//!
//! A [`Pipeline`] is built from a frozen study area, then consumes one
//! [`FlowSource`] either in the calling thread or on the batch/worker engine.
//! Both strategies produce identical summaries.

use crate::config::PipelineConfig;
use crate::error::{ErrorCode, FlowError, Result};
use crate::flow::{
    DiscardLogger, DiscardTally, FlowClassifier, FlowSource, IdentifierNormalizer, MembershipSet,
    PartialSummaries, SourceRow, StatTable, StudyAreaSelector, SummaryTable,
};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

mod output;
mod parallel;
mod report;
mod sink;

pub use output::{write_summary_csv, PipelineOutput};
pub use report::{RunReport, TableReport, REPORT_FILE_NAME};
pub use sink::{CsvPartitionWriter, MemoryPartitionSink, NullSink, PartitionSink};

use parallel::{classify_batch, spawn_reader, worker_failed, BatchResult, ReaderSettings};

/// Rows between progress updates in sequential mode
const PROGRESS_INTERVAL: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Parallel => write!(f, "parallel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub workers: usize,
    pub batch_size: usize,
    pub queue_depth: usize,
    pub max_logged_discards: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            workers: config.execution.workers.max(1),
            batch_size: config.execution.batch_size.max(1),
            queue_depth: config.execution.queue_depth.max(1),
            max_logged_discards: config.max_logged_discards,
        }
    }
}

pub struct Pipeline {
    classifier: FlowClassifier,
    normalizer: IdentifierNormalizer,
    options: PipelineOptions,
    progress: Option<ProgressBar>,
    output: Option<PipelineOutput>,
}

impl Pipeline {
    pub fn new(
        membership: MembershipSet,
        normalizer: IdentifierNormalizer,
        options: PipelineOptions,
    ) -> Self {
        Self {
            classifier: FlowClassifier::new(Arc::new(membership)),
            normalizer,
            options,
            progress: None,
            output: None,
        }
    }

    /// Validate the configuration and resolve the study area
    ///
    /// Membership is resolved here, so an empty study area fails before the
    /// flow table is opened.
    pub fn from_config(config: &PipelineConfig, selector: &dyn StudyAreaSelector) -> Result<Self> {
        config.validate()?;
        let membership = MembershipSet::from_selector(selector)?;
        Ok(Self::new(
            membership,
            IdentifierNormalizer::new(config.key_format),
            PipelineOptions::from(config),
        ))
    }

    /// Report rows read to a progress bar while running
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn membership(&self) -> &MembershipSet {
        self.classifier.membership()
    }

    pub fn normalizer(&self) -> IdentifierNormalizer {
        self.normalizer
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn has_run(&self) -> bool {
        self.output.is_some()
    }

    /// Results of the last run
    pub fn output(&self) -> Result<&PipelineOutput> {
        self.output.as_ref().ok_or_else(|| {
            FlowError::contract(
                ErrorCode::CONTRACT_NOT_RUN,
                "pipeline results requested before the pipeline has run",
            )
        })
    }

    pub fn summary(&self, table: StatTable) -> Result<&SummaryTable> {
        Ok(self.output()?.summary(table))
    }

    /// Single pass in the calling thread
    pub fn run_sequential<R: Read>(
        &mut self,
        mut source: FlowSource<R>,
        sink: &mut dyn PartitionSink,
    ) -> Result<&PipelineOutput> {
        let started = Instant::now();
        info!(
            "Classifying flows against {} study area blocks (sequential)",
            self.membership().len()
        );

        let mut partial = PartialSummaries::new();
        let mut discards = DiscardTally::new();
        let mut logger = DiscardLogger::new(self.options.max_logged_discards);
        let keep_records = sink.wants_records();
        let mut rows = 0u64;

        for item in &mut source {
            rows += 1;
            match item? {
                SourceRow::Record(record) => {
                    let classification = self.classifier.classify(&record);
                    partial.record(classification, &record)?;
                    if keep_records {
                        sink.accept(classification, &record)?;
                    }
                }
                SourceRow::Discarded(err) => {
                    logger.observe(&err);
                    discards.record(&err);
                }
            }
            if rows % PROGRESS_INTERVAL == 0 {
                if let Some(progress) = &self.progress {
                    progress.set_position(rows);
                }
            }
        }
        sink.finish()?;

        let (summaries, categories) = partial.finish(&self.normalizer);
        Ok(self.complete(PipelineOutput {
            summaries,
            categories,
            discards,
            rows_read: source.rows_read(),
            elapsed: started.elapsed(),
        }))
    }

    /// Batch/worker run: a reader task feeding up to `workers` blocking classifiers
    pub async fn run_parallel<R>(
        &mut self,
        source: FlowSource<R>,
        sink: &mut (dyn PartitionSink + Send),
    ) -> Result<&PipelineOutput>
    where
        R: Read + Send + 'static,
    {
        let started = Instant::now();
        let workers = self.options.workers;
        info!(
            "Classifying flows against {} study area blocks ({} workers, batches of {})",
            self.membership().len(),
            workers,
            self.options.batch_size
        );

        let (mut batches, reader) = spawn_reader(
            source,
            ReaderSettings {
                batch_size: self.options.batch_size,
                queue_depth: self.options.queue_depth,
                max_logged_discards: self.options.max_logged_discards,
                progress: self.progress.clone(),
            },
        );
        let keep_records = sink.wants_records();
        let mut merged = PartialSummaries::new();
        let mut in_flight = FuturesUnordered::new();
        let mut dispatched = 0usize;

        loop {
            tokio::select! {
                Some(done) = in_flight.next(), if !in_flight.is_empty() => {
                    reduce(done, &mut merged, sink)?;
                }
                batch = batches.recv(), if in_flight.len() < workers => match batch {
                    Some(records) => {
                        let classifier = self.classifier.clone();
                        dispatched += 1;
                        in_flight.push(tokio::task::spawn_blocking(move || {
                            classify_batch(&classifier, records, keep_records)
                        }));
                    }
                    None => break,
                },
            }
        }

        // The channel closes when the reader stops; surface its error before
        // waiting on the remaining batches.
        let summary = reader.await.map_err(worker_failed)??;
        while let Some(done) = in_flight.next().await {
            reduce(done, &mut merged, sink)?;
        }
        sink.finish()?;
        debug!("Merged {} batches", dispatched);

        let (summaries, categories) = merged.finish(&self.normalizer);
        Ok(self.complete(PipelineOutput {
            summaries,
            categories,
            discards: summary.discards,
            rows_read: summary.rows_read,
            elapsed: started.elapsed(),
        }))
    }

    fn complete(&mut self, output: PipelineOutput) -> &PipelineOutput {
        info!(
            "Processed {} rows in {:.2?}: {} accepted, {} discarded, {} outside the study area",
            output.rows_read,
            output.elapsed,
            output.records_accepted(),
            output.discards.total(),
            output.unclassified()
        );
        if let Some(progress) = &self.progress {
            progress.set_position(output.rows_read);
        }
        self.output.insert(output)
    }
}

fn reduce(
    done: std::result::Result<Result<BatchResult>, tokio::task::JoinError>,
    merged: &mut PartialSummaries,
    sink: &mut (dyn PartitionSink + Send),
) -> Result<()> {
    let batch = done.map_err(worker_failed)??;
    merged.merge(batch.partial)?;
    for (classification, record) in &batch.classified {
        sink.accept(*classification, record)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnMapping;
    use crate::flow::{Category, LocationId};
    use std::io::Cursor;

    fn source(body: &str) -> FlowSource<Cursor<Vec<u8>>> {
        let data = format!("w_geocode,h_geocode,S000\n{}", body);
        FlowSource::from_reader(
            Cursor::new(data.into_bytes()),
            &ColumnMapping::default(),
            IdentifierNormalizer::default(),
            None,
        )
        .unwrap()
    }

    fn pipeline(options: PipelineOptions) -> Pipeline {
        let membership = MembershipSet::new([100, 200].map(LocationId::new)).unwrap();
        Pipeline::new(membership, IdentifierNormalizer::default(), options)
    }

    #[test]
    fn test_summary_before_run_is_contract_violation() {
        let pipeline = pipeline(PipelineOptions::default());
        let err = pipeline.summary(StatTable::ResidentWork).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONTRACT_NOT_RUN);
        assert!(!pipeline.has_run());
    }

    #[test]
    fn test_sequential_run() {
        let mut pipeline = pipeline(PipelineOptions::default());
        let mut sink = MemoryPartitionSink::new();
        pipeline
            .run_sequential(source("300,100,5\n200,300,7\n200,100,3\n"), &mut sink)
            .unwrap();

        let table2 = pipeline.summary(StatTable::ResidentOutHome).unwrap();
        assert_eq!(table2.get("100"), Some(5));
        assert_eq!(sink.rows(Category::ResidentAll), vec![1, 3]);
        assert_eq!(sink.rows(Category::NonResidentCommuteIn), vec![2]);
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let body: String = (0..200)
            .map(|i| format!("{},{},{}\n", [100, 200, 300, 400][i % 4], [100, 300, 500][i % 3], i))
            .collect();
        let options = PipelineOptions {
            workers: 3,
            batch_size: 7,
            queue_depth: 2,
            max_logged_discards: 0,
        };

        let mut sequential = pipeline(options.clone());
        sequential
            .run_sequential(source(&body), &mut NullSink)
            .unwrap();

        let mut parallel = pipeline(options);
        let mut sink = MemoryPartitionSink::new();
        parallel.run_parallel(source(&body), &mut sink).await.unwrap();

        let expected = sequential.output().unwrap();
        let actual = parallel.output().unwrap();
        assert_eq!(actual.summaries, expected.summaries);
        assert_eq!(actual.categories, expected.categories);
        assert_eq!(actual.rows_read, 200);
        assert_eq!(
            sink.len(Category::ResidentAll) as u64,
            actual.categories.get(Category::ResidentAll).records
        );
    }

    #[tokio::test]
    async fn test_parallel_reader_failure_is_fatal() {
        // Truncated gzip member: header parses, body does not
        let mut bytes = Vec::new();
        {
            use flate2::write::GzEncoder;
            use std::io::Write;
            let mut encoder = GzEncoder::new(&mut bytes, flate2::Compression::default());
            let mut body = String::from("w_geocode,h_geocode,S000\n");
            for i in 0..5000 {
                body.push_str(&format!("{},{},1\n", i, i * 7));
            }
            encoder.write_all(body.as_bytes()).unwrap();
            encoder.finish().unwrap();
        }
        bytes.truncate(bytes.len() / 2);

        let source = FlowSource::from_reader(
            flate2::read::MultiGzDecoder::new(Cursor::new(bytes)),
            &ColumnMapping::default(),
            IdentifierNormalizer::default(),
            None,
        )
        .unwrap();

        let mut pipeline = pipeline(PipelineOptions {
            workers: 2,
            batch_size: 100,
            queue_depth: 1,
            max_logged_discards: 0,
        });
        let err = pipeline
            .run_parallel(source, &mut NullSink)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SOURCE_UNREADABLE);
        assert!(!pipeline.has_run());
    }
}
