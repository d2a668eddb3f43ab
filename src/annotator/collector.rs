//! Ordered result collector
//!
//! Units arrive from the worker pool in completion order. The collector
//! keeps the next sequence index it owes the sink and parks anything that
//! arrives early in a map keyed by sequence index. Each arrival drains the
//! map for as long as the next expected index is present.

use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::config::FailurePolicy;
use super::dispatcher::CompletedUnit;
use super::unit::UnitError;
use super::AnnotateError;
use crate::metrics;
use crate::output::ResultSink;
use crate::shutdown::SharedShutdown;

/// A failed batch passed over under [`FailurePolicy::Skip`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBatch {
    /// Sequence index of the batch
    pub sequence_index: u64,
    /// Input records that produced no output
    pub records: usize,
    /// Why the batch failed
    pub cause: String,
}

/// What the collector emitted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectSummary {
    /// Batches written to the sink
    pub batches_emitted: u64,
    /// Records written to the sink
    pub records_written: u64,
    /// Failed batches skipped, in sequence order
    pub skipped: Vec<SkippedBatch>,
    /// Largest number of units parked waiting for a gap to close
    pub max_buffered: usize,
}

/// Reorders completed units and writes them to a sink in sequence order
pub struct OrderedCollector<'a, S: ResultSink + ?Sized> {
    sink: &'a mut S,
    policy: FailurePolicy,
    shutdown: SharedShutdown,
    next_index: u64,
    pending: BTreeMap<u64, CompletedUnit>,
    summary: CollectSummary,
}

impl<'a, S: ResultSink + ?Sized> OrderedCollector<'a, S> {
    /// Collector writing to `sink`, expecting sequence index 0 first
    pub fn new(sink: &'a mut S, policy: FailurePolicy, shutdown: SharedShutdown) -> Self {
        Self {
            sink,
            policy,
            shutdown,
            next_index: 0,
            pending: BTreeMap::new(),
            summary: CollectSummary::default(),
        }
    }

    /// Next sequence index the sink is waiting for
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Units parked until earlier batches complete
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Take one completed unit and emit everything now in order.
    ///
    /// Under [`FailurePolicy::Halt`] a failed unit at the head of the queue
    /// requests shutdown and returns [`AnnotateError::PipelineHalt`]; nothing
    /// after it is written.
    pub fn accept(&mut self, completed: CompletedUnit) -> Result<(), AnnotateError> {
        let index = completed.unit.sequence_index();
        if index < self.next_index || self.pending.contains_key(&index) {
            return Err(AnnotateError::Worker(format!(
                "batch {index} completed more than once"
            )));
        }

        self.pending.insert(index, completed);
        self.summary.max_buffered = self.summary.max_buffered.max(self.pending.len());
        if index != self.next_index {
            debug!(
                sequence_index = index,
                waiting_for = self.next_index,
                buffered = self.pending.len(),
                "Buffering early batch"
            );
        }

        while let Some(completed) = self.pending.remove(&self.next_index) {
            self.emit(completed)?;
            self.next_index += 1;
        }
        Ok(())
    }

    fn emit(&mut self, completed: CompletedUnit) -> Result<(), AnnotateError> {
        // The window permit inside `completed` is released when this returns
        let unit = completed.unit;
        let sequence_index = unit.sequence_index();
        let batch_len = unit.batch_len();

        match unit.into_outcome() {
            Ok(records) => {
                self.sink.write_records(&records)?;
                self.summary.batches_emitted += 1;
                self.summary.records_written += records.len() as u64;
                metrics::record_variants_written(records.len());
                debug!(sequence_index, records = records.len(), "Batch emitted");
                Ok(())
            }
            Err(err) => self.handle_failure(sequence_index, batch_len, err),
        }
    }

    fn handle_failure(
        &mut self,
        sequence_index: u64,
        batch_len: usize,
        err: UnitError,
    ) -> Result<(), AnnotateError> {
        if let UnitError::Service(cause) = &err {
            if cause.interrupted {
                self.flush_quietly();
                return Err(AnnotateError::Interrupted {
                    reason: self
                        .shutdown
                        .reason()
                        .unwrap_or_else(|| "shutdown requested".to_string()),
                });
            }
        }

        match self.policy {
            FailurePolicy::Halt => {
                error!(sequence_index, "{}", err.report());
                self.shutdown
                    .request_shutdown(format!("batch {sequence_index} failed"));
                self.flush_quietly();
                Err(AnnotateError::PipelineHalt {
                    sequence_index,
                    cause: err.to_string(),
                })
            }
            FailurePolicy::Skip => {
                warn!(
                    sequence_index,
                    records = batch_len,
                    error = %err,
                    "Skipping failed batch; its variants are missing from the output"
                );
                self.summary.skipped.push(SkippedBatch {
                    sequence_index,
                    records: batch_len,
                    cause: err.to_string(),
                });
                Ok(())
            }
        }
    }

    fn flush_quietly(&mut self) {
        if let Err(e) = self.sink.flush() {
            warn!(error = %e, "Failed to flush output before stopping");
        }
    }

    /// Stop the pipeline on an unrecoverable collector error
    fn stop(&self, err: AnnotateError) -> AnnotateError {
        self.shutdown
            .request_shutdown(format!("collector stopped: {err}"));
        err
    }

    /// Consume completed units until the channel closes.
    ///
    /// Ends with an error if any submitted batch never arrived. Every error
    /// path requests shutdown so no further batches are submitted.
    pub async fn run(
        mut self,
        mut completed: mpsc::Receiver<CompletedUnit>,
    ) -> Result<CollectSummary, AnnotateError> {
        while let Some(unit) = completed.recv().await {
            if let Err(e) = self.accept(unit) {
                return Err(self.stop(e));
            }
        }

        if !self.pending.is_empty() {
            let err = AnnotateError::Worker(format!(
                "batch {} never completed; {} later batch(es) not written",
                self.next_index,
                self.pending.len()
            ));
            return Err(self.stop(err));
        }

        if let Err(e) = self.sink.flush() {
            return Err(self.stop(e.into()));
        }
        info!(
            batches = self.summary.batches_emitted,
            records = self.summary.records_written,
            skipped = self.summary.skipped.len(),
            max_buffered = self.summary.max_buffered,
            "Collector finished"
        );
        Ok(self.summary)
    }
}
