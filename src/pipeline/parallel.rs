//! Batch/worker execution
//!
//! One blocking task reads and parses the source into batches, sending them
//! over a bounded channel. Each batch is classified on the blocking pool into
//! its own [`PartialSummaries`]; the coordinator merges partials and feeds
//! the partition sink as batches complete.

use crate::error::{ErrorCode, FlowError, Result};
use crate::flow::{
    Classification, DiscardLogger, DiscardTally, FlowClassifier, FlowRecord, FlowSource,
    PartialSummaries, SourceRow,
};
use indicatif::ProgressBar;
use std::io::Read;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, trace};

pub(super) struct ReaderSummary {
    pub rows_read: u64,
    pub discards: DiscardTally,
}

pub(super) struct BatchResult {
    pub partial: PartialSummaries,
    pub classified: Vec<(Classification, FlowRecord)>,
}

pub(super) struct ReaderSettings {
    pub batch_size: usize,
    pub queue_depth: usize,
    pub max_logged_discards: usize,
    pub progress: Option<ProgressBar>,
}

/// Start the reader on the blocking pool
pub(super) fn spawn_reader<R>(
    source: FlowSource<R>,
    settings: ReaderSettings,
) -> (mpsc::Receiver<Vec<FlowRecord>>, JoinHandle<Result<ReaderSummary>>)
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(settings.queue_depth);

    let handle = tokio::task::spawn_blocking(move || -> Result<ReaderSummary> {
        let mut source = source;
        let mut discards = DiscardTally::new();
        let mut logger = DiscardLogger::new(settings.max_logged_discards);
        let mut batch = Vec::with_capacity(settings.batch_size);
        let mut rows = 0u64;
        let mut sent = 0usize;

        for item in &mut source {
            rows += 1;
            match item? {
                SourceRow::Record(record) => batch.push(record),
                SourceRow::Discarded(err) => {
                    logger.observe(&err);
                    discards.record(&err);
                }
            }

            if batch.len() >= settings.batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(settings.batch_size));
                if tx.blocking_send(full).is_err() {
                    debug!("Coordinator stopped accepting batches; reader exiting");
                    break;
                }
                sent += 1;
                if let Some(progress) = &settings.progress {
                    progress.set_position(rows);
                }
            }
        }

        if !batch.is_empty() && tx.blocking_send(batch).is_ok() {
            sent += 1;
        }
        debug!("Reader finished after {} rows in {} batches", rows, sent);

        Ok(ReaderSummary {
            rows_read: source.rows_read(),
            discards,
        })
    });

    (rx, handle)
}

/// Classify one batch into a fresh partial
pub(super) fn classify_batch(
    classifier: &FlowClassifier,
    records: Vec<FlowRecord>,
    keep_records: bool,
) -> Result<BatchResult> {
    let mut partial = PartialSummaries::new();
    let mut classified = Vec::new();
    trace!("Classifying batch of {} records", records.len());

    for record in records {
        let classification = classifier.classify(&record);
        partial.record(classification, &record)?;
        if keep_records && !classification.is_unrelated() {
            classified.push((classification, record));
        }
    }

    Ok(BatchResult {
        partial,
        classified,
    })
}

pub(super) fn worker_failed(err: JoinError) -> FlowError {
    FlowError::contract(ErrorCode::CONTRACT_WORKER_FAILED, "worker task failed").with_source(err)
}
