//! Unit of work: one batch tracked from submission to terminal state

use serde::{Deserialize, Serialize};

use super::batch::Batch;
use crate::vep::{AnnotationServiceError, ServiceError};
use crate::{AnnotatedVariant, Variant};

/// Unit execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UnitStatus {
    /// Submitted, waiting for a worker slot
    #[default]
    Pending,
    /// A worker is annotating the batch
    Running,
    /// Annotated records are available
    Succeeded,
    /// The batch failed terminally
    Failed,
}

impl UnitStatus {
    /// Whether the unit has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitStatus::Succeeded | UnitStatus::Failed)
    }

    fn can_transition_to(self, next: UnitStatus) -> bool {
        matches!(
            (self, next),
            (UnitStatus::Pending, UnitStatus::Running)
                | (UnitStatus::Running, UnitStatus::Succeeded)
                | (UnitStatus::Running, UnitStatus::Failed)
        )
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnitStatus::Pending => "pending",
            UnitStatus::Running => "running",
            UnitStatus::Succeeded => "succeeded",
            UnitStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Why a unit failed
#[derive(Debug, Clone, thiserror::Error)]
pub enum UnitError {
    /// The annotation request failed terminally
    #[error(transparent)]
    Service(#[from] AnnotationServiceError),

    /// The response could not be paired with the request
    #[error("could not pair VEP response with request: {0}")]
    Pairing(ServiceError),

    /// Annotated record failed validation
    #[error("invalid annotated record: {0}")]
    Validation(String),

    /// Status transition outside pending -> running -> terminal
    #[error("invalid unit transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: UnitStatus,
        /// Requested status
        to: UnitStatus,
    },
}

impl UnitError {
    /// Multi-line diagnostic for the final report
    pub fn report(&self) -> String {
        match self {
            UnitError::Service(err) => err.report(),
            other => other.to_string(),
        }
    }
}

/// One batch moving through the worker pool
#[derive(Debug)]
pub struct UnitOfWork {
    sequence_index: u64,
    batch_len: usize,
    status: UnitStatus,
    input: Vec<Variant>,
    result: Option<Vec<AnnotatedVariant>>,
    error: Option<UnitError>,
}

impl UnitOfWork {
    /// Pending unit owning `batch`
    pub fn new(batch: Batch<Variant>) -> Self {
        Self {
            sequence_index: batch.sequence_index,
            batch_len: batch.records.len(),
            status: UnitStatus::Pending,
            input: batch.records,
            result: None,
            error: None,
        }
    }

    /// Ordering key
    pub fn sequence_index(&self) -> u64 {
        self.sequence_index
    }

    /// Current status
    pub fn status(&self) -> UnitStatus {
        self.status
    }

    /// Number of input records in the batch
    pub fn batch_len(&self) -> usize {
        self.batch_len
    }

    /// Annotated records, present iff succeeded
    pub fn result(&self) -> Option<&[AnnotatedVariant]> {
        self.result.as_deref()
    }

    /// Failure cause, present iff failed
    pub fn error(&self) -> Option<&UnitError> {
        self.error.as_ref()
    }

    fn transition(&mut self, next: UnitStatus) -> Result<(), UnitError> {
        if !self.status.can_transition_to(next) {
            return Err(UnitError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// pending -> running; hands the input records to the worker
    pub fn start(&mut self) -> Result<Vec<Variant>, UnitError> {
        self.transition(UnitStatus::Running)?;
        Ok(std::mem::take(&mut self.input))
    }

    /// running -> succeeded
    pub fn succeed(&mut self, records: Vec<AnnotatedVariant>) -> Result<(), UnitError> {
        self.transition(UnitStatus::Succeeded)?;
        self.result = Some(records);
        Ok(())
    }

    /// running -> failed
    pub fn fail(&mut self, error: UnitError) -> Result<(), UnitError> {
        self.transition(UnitStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    /// Consume a terminal unit into its outcome
    pub fn into_outcome(self) -> Result<Vec<AnnotatedVariant>, UnitError> {
        match (self.status, self.result, self.error) {
            (UnitStatus::Succeeded, Some(records), _) => Ok(records),
            (UnitStatus::Failed, _, Some(error)) => Err(error),
            (status, _, _) => Err(UnitError::InvalidTransition {
                from: status,
                to: UnitStatus::Succeeded,
            }),
        }
    }
}
