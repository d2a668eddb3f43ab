//! Batch orchestration and ordered result collection
//!
//! Records flow through four stages:
//!
//! 1. [`batch::batches`] groups the input into fixed-size [`Batch`]es, each
//!    tagged with a 0-based sequence index.
//! 2. [`Dispatcher`] runs at most `threads` batches at once against an
//!    [`AnnotationService`](crate::vep::AnnotationService). A free slot is
//!    handed to the next batch as soon as the current one finishes.
//! 3. [`OrderedCollector`] buffers batches that finish early and writes
//!    results to the sink strictly by sequence index.
//! 4. [`AnnotationPipeline`] wires the three together and reports a
//!    [`PipelineSummary`].
//!
//! Memory is bounded by the reorder window: a batch holds one window permit
//! from submission until the collector has emitted it, so at most
//! `reorder_window` batches are ever submitted but unwritten.

use crate::output::OutputError;
use crate::vcf::VcfError;

pub mod batch;
pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod pipeline;
pub mod unit;

pub use batch::{batches, Batch, Batches};
pub use collector::{CollectSummary, OrderedCollector, SkippedBatch};
pub use config::{FailurePolicy, PipelineConfig, DEFAULT_BATCH_SIZE, DEFAULT_THREADS, MAX_THREADS};
pub use dispatcher::{CompletedUnit, DispatchStats, Dispatcher, UnitHandle};
pub use pipeline::{AnnotationPipeline, PipelineSummary};
pub use unit::{UnitError, UnitOfWork, UnitStatus};

/// Annotation pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    /// Invalid pool size, batch size or window; raised before any work starts
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Input could not be read or parsed
    #[error("input error: {0}")]
    Input(#[from] VcfError),

    /// A failed batch reached the collector under the halt policy
    #[error("pipeline halted at batch {sequence_index}: {cause}")]
    PipelineHalt {
        /// Batch that failed
        sequence_index: u64,
        /// Why it failed
        cause: String,
    },

    /// Sink write failed
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Stop requested before all batches were processed
    #[error("interrupted: {reason}")]
    Interrupted {
        /// The first shutdown reason
        reason: String,
    },

    /// Worker task failed outside the unit's own error handling
    #[error("worker error: {0}")]
    Worker(String),
}

impl AnnotateError {
    /// Sequence index of the batch the error belongs to, if any
    pub fn sequence_index(&self) -> Option<u64> {
        match self {
            AnnotateError::PipelineHalt { sequence_index, .. } => Some(*sequence_index),
            _ => None,
        }
    }
}
