//! CLI error types and conversions

use crate::annotator::AnnotateError;
use crate::metrics::MetricsError;
use crate::output::OutputError;
use crate::vcf::VcfError;
use crate::vep::ServiceError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Annotation pipeline error
    #[error("annotation error: {0}")]
    AnnotateError(#[from] AnnotateError),

    /// VCF input could not be opened
    #[error("input error: {0}")]
    InputError(#[from] VcfError),

    /// HTTP client could not be built
    #[error("service error: {0}")]
    ServiceError(#[from] ServiceError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Metrics exporter error
    #[error("metrics error: {0}")]
    MetricsError(#[from] MetricsError),
}

impl CliError {
    /// Sequence index of the batch that failed, if the error names one
    pub fn sequence_index(&self) -> Option<u64> {
        match self {
            CliError::AnnotateError(e) => e.sequence_index(),
            _ => None,
        }
    }
}
