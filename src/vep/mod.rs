//! Ensembl VEP service boundary
//!
//! [`AnnotationService`] is the seam the worker pool calls once per batch.
//! [`VepHttpClient`] is the production implementation; it retries transient
//! failures according to a [`RetryPolicy`] and surfaces an
//! [`AnnotationServiceError`] once the attempt budget is spent.

use async_trait::async_trait;

pub mod client;
pub mod failure;
pub mod model;
pub mod retry;

pub use client::{VepClientConfig, VepHttpClient, DEFAULT_VEP_URL};
pub use failure::FailureKind;
pub use model::{TranscriptConsequence, VepRecord, VepRequest};
pub use retry::RetryPolicy;

/// Outcome of a single failed request attempt
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// Retryable network or server-side condition
    #[error("transient service error: {kind}: {message}")]
    Transient {
        /// Failure classification
        kind: FailureKind,
        /// Underlying error text
        message: String,
    },

    /// Failure that another attempt would not fix
    #[error("permanent service error: {kind}: {message}")]
    Permanent {
        /// Failure classification
        kind: FailureKind,
        /// Underlying error text
        message: String,
    },
}

impl ServiceError {
    /// Classify an error by kind, choosing the variant from
    /// [`FailureKind::is_retryable`]
    pub fn from_kind(kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        if kind.is_retryable() {
            Self::Transient { kind, message }
        } else {
            Self::Permanent { kind, message }
        }
    }

    /// Whether the retry loop may try again
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Failure classification
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transient { kind, .. } | Self::Permanent { kind, .. } => *kind,
        }
    }

    /// Underlying error text
    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message, .. } | Self::Permanent { message, .. } => message,
        }
    }
}

/// Terminal failure of one annotation request: retries exhausted, a
/// permanent failure, or shutdown during backoff
#[derive(Debug, Clone, thiserror::Error)]
#[error("annotation service failed after {attempts} attempt(s): {cause}")]
pub struct AnnotationServiceError {
    /// Attempts made before giving up
    pub attempts: u32,
    /// Last observed cause
    #[source]
    pub cause: ServiceError,
    /// Whether the loop stopped early because shutdown was requested
    pub interrupted: bool,
}

impl AnnotationServiceError {
    /// Terminal error after `attempts` attempts
    pub fn new(attempts: u32, cause: ServiceError) -> Self {
        Self {
            attempts,
            cause,
            interrupted: false,
        }
    }

    /// Mark as stopped by a shutdown request
    pub fn interrupted(mut self) -> Self {
        self.interrupted = true;
        self
    }

    /// Multi-line report with remediation hints
    pub fn report(&self) -> String {
        failure::format_failure(self.attempts, self.cause.kind(), self.cause.message())
    }
}

/// Annotation backend called once per batch
#[async_trait]
pub trait AnnotationService: Send + Sync {
    /// Annotate a batch of region strings (see [`crate::Variant::vep_region`]).
    ///
    /// Records come back in service order; the caller pairs them with the
    /// request using [`model::match_records`].
    async fn annotate(&self, regions: &[String]) -> Result<Vec<VepRecord>, AnnotationServiceError>;
}
