//! Pipeline driver: batch builder -> dispatcher -> collector -> sink

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use super::batch::{batches, Batch};
use super::collector::{CollectSummary, OrderedCollector};
use super::config::PipelineConfig;
use super::dispatcher::{DispatchStats, Dispatcher};
use super::AnnotateError;
use crate::output::ResultSink;
use crate::shutdown::{SharedShutdown, ShutdownCoordinator};
use crate::vcf::VcfResult;
use crate::vep::AnnotationService;
use crate::Variant;

/// Outcome of a completed run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSummary {
    /// Batches handed to the worker pool
    pub batches_submitted: u64,
    /// Batches annotated successfully
    pub batches_succeeded: u64,
    /// Batches that failed terminally
    pub batches_failed: u64,
    /// Annotated records written to the sink
    pub records_written: u64,
    /// Sequence indices of failed batches passed over under the skip policy
    pub skipped_batches: Vec<u64>,
    /// Input records lost to skipped batches
    pub records_skipped: u64,
    /// Most batches observed annotating at once
    pub peak_running: usize,
    /// Most completed batches parked waiting for an earlier one
    pub max_buffered: usize,
    /// Wall-clock run time in seconds
    pub elapsed_secs: f64,
}

impl PipelineSummary {
    fn new(stats: DispatchStats, collected: CollectSummary, elapsed: Duration) -> Self {
        let records_skipped = collected.skipped.iter().map(|s| s.records as u64).sum();
        Self {
            batches_submitted: stats.submitted,
            batches_succeeded: stats.succeeded,
            batches_failed: stats.failed,
            records_written: collected.records_written,
            skipped_batches: collected.skipped.iter().map(|s| s.sequence_index).collect(),
            records_skipped,
            peak_running: stats.peak_running,
            max_buffered: collected.max_buffered,
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }
}

/// Annotates a record stream with bounded concurrency and ordered output
pub struct AnnotationPipeline {
    config: PipelineConfig,
    service: Arc<dyn AnnotationService>,
    shutdown: SharedShutdown,
}

impl AnnotationPipeline {
    /// Validate `config` and build a pipeline around `service`
    pub fn new(
        config: PipelineConfig,
        service: Arc<dyn AnnotationService>,
    ) -> Result<Self, AnnotateError> {
        config.validate()?;
        Ok(Self {
            config,
            service,
            shutdown: ShutdownCoordinator::shared(),
        })
    }

    /// Share a shutdown coordinator with the caller (Ctrl+C handler, HTTP client)
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Shutdown coordinator used by this pipeline
    pub fn shutdown(&self) -> &SharedShutdown {
        &self.shutdown
    }

    /// Annotate every record and write the results to `sink` in input order.
    ///
    /// Submission and collection run concurrently on the calling task; only
    /// the annotation requests are spawned. A read error stops submission at
    /// the batch containing the bad record; batches already submitted are
    /// still written before the error is returned. Records already written
    /// stay in the sink whatever the outcome.
    pub async fn run<I, S>(&self, records: I, sink: &mut S) -> Result<PipelineSummary, AnnotateError>
    where
        I: IntoIterator<Item = VcfResult<Variant>>,
        S: ResultSink + ?Sized,
    {
        let started = Instant::now();
        let window = self.config.window();
        info!(
            threads = self.config.threads,
            batch_size = self.config.batch_size,
            window,
            policy = %self.config.failure_policy,
            "Starting annotation pipeline"
        );

        let (tx, rx) = mpsc::channel(window);
        let mut dispatcher = Dispatcher::new(
            &self.config,
            self.service.clone(),
            tx,
            Arc::new(Semaphore::new(window)),
            self.shutdown.clone(),
        );
        let collector =
            OrderedCollector::new(sink, self.config.failure_policy, self.shutdown.clone());
        let batch_size = self.config.batch_size;

        let submit = async move {
            let submitted = submit_all(&mut dispatcher, records, batch_size).await;
            let drained = dispatcher.drain().await;
            (submitted, drained)
        };

        let ((submitted, drained), collected) = tokio::join!(submit, collector.run(rx));

        // The collector's verdict comes first: a halt also interrupts submission
        let collected = collected?;
        submitted?;
        let stats = drained?;

        let summary = PipelineSummary::new(stats, collected, started.elapsed());
        if summary.skipped_batches.is_empty() {
            info!(
                records = summary.records_written,
                batches = summary.batches_submitted,
                elapsed_secs = summary.elapsed_secs,
                "Annotation pipeline finished"
            );
        } else {
            warn!(
                records = summary.records_written,
                skipped = ?summary.skipped_batches,
                "Annotation pipeline finished with skipped batches"
            );
        }
        Ok(summary)
    }
}

async fn submit_all<I>(
    dispatcher: &mut Dispatcher,
    records: I,
    batch_size: usize,
) -> Result<(), AnnotateError>
where
    I: IntoIterator<Item = VcfResult<Variant>>,
{
    for batch in batches(records, batch_size)? {
        let sequence_index = batch.sequence_index;
        let records = batch
            .records
            .into_iter()
            .collect::<VcfResult<Vec<Variant>>>()
            .map_err(|e| {
                warn!(sequence_index, error = %e, "Stopping submission on input error");
                AnnotateError::Input(e)
            })?;
        dispatcher
            .submit(Batch {
                sequence_index,
                records,
            })
            .await?;
    }
    Ok(())
}
