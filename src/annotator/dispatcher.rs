//! Worker pool: bounded concurrent execution of units of work
//!
//! Two semaphores gate submission. The window semaphore caps how many batches
//! are submitted but not yet emitted by the collector; its permit rides along
//! with the finished unit and is released on emission. The slot semaphore
//! caps how many batches are annotating at once; its permit is released by
//! the worker the moment its unit reaches a terminal state. Both are FIFO, so
//! slots are granted in submission order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::batch::Batch;
use super::config::PipelineConfig;
use super::unit::{UnitError, UnitOfWork, UnitStatus};
use super::AnnotateError;
use crate::metrics;
use crate::shutdown::SharedShutdown;
use crate::vep::model::match_records;
use crate::vep::{AnnotationService, VepRecord};
use crate::{AnnotatedVariant, Variant};

/// A terminal unit on its way to the collector
#[derive(Debug)]
pub struct CompletedUnit {
    /// The finished unit
    pub unit: UnitOfWork,
    window: Option<OwnedSemaphorePermit>,
}

impl CompletedUnit {
    /// Wrap a terminal unit without a window permit
    pub fn new(unit: UnitOfWork) -> Self {
        Self { unit, window: None }
    }

    fn with_permit(unit: UnitOfWork, permit: OwnedSemaphorePermit) -> Self {
        Self {
            unit,
            window: Some(permit),
        }
    }
}

/// Receipt for a submitted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitHandle {
    /// Sequence index of the submitted batch
    pub sequence_index: u64,
    /// Records in the batch
    pub batch_len: usize,
}

/// Counters reported by [`Dispatcher::drain`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Batches handed to workers
    pub submitted: u64,
    /// Batches annotated successfully
    pub succeeded: u64,
    /// Batches that failed terminally
    pub failed: u64,
    /// Highest number of batches observed running at once
    pub peak_running: usize,
}

#[derive(Debug, Default)]
struct RunningCounter {
    running: AtomicUsize,
    peak: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl RunningCounter {
    fn enter(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        metrics::set_workers_running(now);
    }

    fn leave(&self, succeeded: bool) {
        let now = self.running.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_workers_running(now);
        if succeeded {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Bounded worker pool for annotation batches
pub struct Dispatcher {
    service: Arc<dyn AnnotationService>,
    slots: Arc<Semaphore>,
    window: Arc<Semaphore>,
    completed: mpsc::Sender<CompletedUnit>,
    shutdown: SharedShutdown,
    tasks: JoinSet<()>,
    counter: Arc<RunningCounter>,
    next_index: u64,
}

impl Dispatcher {
    /// Create a pool with `config.threads` execution slots.
    ///
    /// `window` must be the semaphore whose size matches the capacity of the
    /// `completed` channel, so a worker never blocks forever on send.
    pub fn new(
        config: &PipelineConfig,
        service: Arc<dyn AnnotationService>,
        completed: mpsc::Sender<CompletedUnit>,
        window: Arc<Semaphore>,
        shutdown: SharedShutdown,
    ) -> Self {
        debug!(
            threads = config.threads,
            window = window.available_permits(),
            "Creating dispatcher"
        );
        Self {
            service,
            slots: Arc::new(Semaphore::new(config.threads)),
            window,
            completed,
            shutdown,
            tasks: JoinSet::new(),
            counter: Arc::new(RunningCounter::default()),
            next_index: 0,
        }
    }

    /// Batches currently annotating
    pub fn running(&self) -> usize {
        self.counter.running.load(Ordering::SeqCst)
    }

    /// Hand `batch` to the pool.
    ///
    /// Waits for a window permit and then for a free slot. Returns
    /// [`AnnotateError::Interrupted`] if shutdown is requested while waiting.
    pub async fn submit(&mut self, batch: Batch<Variant>) -> Result<UnitHandle, AnnotateError> {
        if batch.sequence_index != self.next_index {
            return Err(AnnotateError::Worker(format!(
                "batch {} submitted out of order, expected {}",
                batch.sequence_index, self.next_index
            )));
        }

        let window = self.acquire(self.window.clone()).await?;
        let slot = self.acquire(self.slots.clone()).await?;

        let unit = UnitOfWork::new(batch);
        let handle = UnitHandle {
            sequence_index: unit.sequence_index(),
            batch_len: unit.batch_len(),
        };
        self.next_index += 1;

        debug!(
            sequence_index = handle.sequence_index,
            batch_len = handle.batch_len,
            "Submitting batch"
        );

        let service = self.service.clone();
        let completed = self.completed.clone();
        let counter = self.counter.clone();
        self.tasks.spawn(async move {
            counter.enter();
            let unit = execute(unit, service.as_ref()).await;
            // Free the slot before handing off so the next batch can start
            drop(slot);
            counter.leave(unit.status() == UnitStatus::Succeeded);

            let sequence_index = unit.sequence_index();
            if completed
                .send(CompletedUnit::with_permit(unit, window))
                .await
                .is_err()
            {
                debug!(sequence_index, "Collector closed; dropping completed batch");
            }
        });

        Ok(handle)
    }

    async fn acquire(&self, gate: Arc<Semaphore>) -> Result<OwnedSemaphorePermit, AnnotateError> {
        if self.shutdown.is_shutdown_requested() {
            return Err(self.interrupted());
        }
        tokio::select! {
            permit = gate.acquire_owned() => permit
                .map_err(|e| AnnotateError::Worker(format!("semaphore closed: {e}"))),
            _ = self.shutdown.wait_for_shutdown() => Err(self.interrupted()),
        }
    }

    fn interrupted(&self) -> AnnotateError {
        AnnotateError::Interrupted {
            reason: self
                .shutdown
                .reason()
                .unwrap_or_else(|| "shutdown requested".to_string()),
        }
    }

    /// Wait until every submitted unit is terminal and handed off.
    ///
    /// Closes this dispatcher's side of the completion channel, so the
    /// collector sees end-of-stream once the last worker has sent.
    pub async fn drain(mut self) -> Result<DispatchStats, AnnotateError> {
        drop(self.completed);

        let mut join_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task failed");
                join_error.get_or_insert_with(|| e.to_string());
            }
        }

        let stats = DispatchStats {
            submitted: self.next_index,
            succeeded: self.counter.succeeded.load(Ordering::SeqCst) as u64,
            failed: self.counter.failed.load(Ordering::SeqCst) as u64,
            peak_running: self.counter.peak.load(Ordering::SeqCst),
        };
        info!(
            submitted = stats.submitted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            peak_running = stats.peak_running,
            "Dispatcher drained"
        );

        match join_error {
            Some(message) => Err(AnnotateError::Worker(message)),
            None => Ok(stats),
        }
    }
}

/// Run one unit to a terminal state
async fn execute(mut unit: UnitOfWork, service: &dyn AnnotationService) -> UnitOfWork {
    let sequence_index = unit.sequence_index();
    let input = match unit.start() {
        Ok(input) => input,
        Err(e) => {
            // Left non-terminal; the collector treats it as failed
            error!(sequence_index, error = %e, "Could not start batch");
            return unit;
        }
    };

    let regions: Vec<String> = input.iter().map(Variant::vep_region).collect();
    let outcome = match service.annotate(&regions).await {
        Ok(records) => annotate_records(input, &regions, records),
        Err(e) => Err(UnitError::Service(e)),
    };

    let transition = match outcome {
        Ok(records) => {
            debug!(sequence_index, records = records.len(), "Batch annotated");
            metrics::record_batch_outcome(true);
            unit.succeed(records)
        }
        Err(e) => {
            warn!(sequence_index, error = %e, "Batch failed");
            metrics::record_batch_outcome(false);
            unit.fail(e)
        }
    };
    if let Err(e) = transition {
        error!(sequence_index, error = %e, "Unit state transition rejected");
    }
    unit
}

/// Pair VEP records with their variants and build the output rows
fn annotate_records(
    input: Vec<Variant>,
    regions: &[String],
    records: Vec<VepRecord>,
) -> Result<Vec<AnnotatedVariant>, UnitError> {
    let matched = match_records(regions, records).map_err(UnitError::Pairing)?;

    input
        .into_iter()
        .zip(matched)
        .map(|(variant, record)| {
            let (gene, consequence) = match record {
                Some(record) => {
                    let gene = record.gene_for_most_severe_consequence().map(str::to_string);
                    (gene, record.most_severe_consequence)
                }
                None => (None, None),
            };
            let annotated = AnnotatedVariant::new(variant, gene, consequence);
            annotated.validate().map_err(UnitError::Validation)?;
            Ok(annotated)
        })
        .collect()
}
