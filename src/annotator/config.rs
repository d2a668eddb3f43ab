//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::AnnotateError;

/// Upper bound on concurrent VEP requests, independent of input size.
/// Ensembl applies per-client rate limits, so more workers only buys 429s.
pub const MAX_THREADS: usize = 32;

/// Default number of concurrent workers
pub const DEFAULT_THREADS: usize = 8;

/// Default variants per VEP request
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default reorder window, as a multiple of the worker count
pub const REORDER_WINDOW_FACTOR: usize = 4;

/// What the collector does with a batch that failed terminally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Stop emitting and fail the run at the first failed batch
    #[default]
    #[serde(rename = "halt")]
    Halt,
    /// Skip the failed batch, report it, and keep going
    #[serde(rename = "skip")]
    Skip,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailurePolicy::Halt => "halt",
            FailurePolicy::Skip => "skip",
        };
        write!(f, "{s}")
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "halt" => Ok(FailurePolicy::Halt),
            "skip" => Ok(FailurePolicy::Skip),
            _ => Err(format!(
                "Invalid failure policy: {s}. Valid options: halt, skip"
            )),
        }
    }
}

/// Configuration value object handed to the pipeline at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent workers (1..=[`MAX_THREADS`])
    pub threads: usize,
    /// Variants per batch (>= 1)
    pub batch_size: usize,
    /// Handling of terminally failed batches
    pub failure_policy: FailurePolicy,
    /// Max batches submitted but not yet emitted; `None` means
    /// `threads * REORDER_WINDOW_FACTOR`
    pub reorder_window: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            batch_size: DEFAULT_BATCH_SIZE,
            failure_policy: FailurePolicy::Halt,
            reorder_window: None,
        }
    }
}

impl PipelineConfig {
    /// Config with the given pool and batch sizes, other fields default
    pub fn new(threads: usize, batch_size: usize) -> Self {
        Self {
            threads,
            batch_size,
            ..Self::default()
        }
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set an explicit reorder window
    pub fn with_reorder_window(mut self, window: usize) -> Self {
        self.reorder_window = Some(window);
        self
    }

    /// Effective reorder window
    pub fn window(&self) -> usize {
        self.reorder_window
            .unwrap_or(self.threads.saturating_mul(REORDER_WINDOW_FACTOR))
    }

    /// Reject invalid sizes before any work starts
    pub fn validate(&self) -> Result<(), AnnotateError> {
        if self.threads == 0 {
            return Err(AnnotateError::Configuration(
                "threads must be at least 1".to_string(),
            ));
        }
        if self.threads > MAX_THREADS {
            return Err(AnnotateError::Configuration(format!(
                "threads {} exceeds maximum of {MAX_THREADS}",
                self.threads
            )));
        }
        if self.batch_size == 0 {
            return Err(AnnotateError::Configuration(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.window() == 0 {
            return Err(AnnotateError::Configuration(
                "reorder window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
