//! VCF input
//!
//! Reads plain or gzip-compressed VCF text and yields one [`crate::Variant`]
//! per ALT allele, lazily and in file order.

pub mod reader;

pub use reader::VcfReader;

/// VCF reader errors
#[derive(Debug, thiserror::Error)]
pub enum VcfError {
    /// IO error while opening or reading the file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed data line
    #[error("line {line}: {message}")]
    ParseError {
        /// 1-based line number in the input
        line: usize,
        /// What was wrong with the line
        message: String,
    },

    /// Record parsed but failed variant validation
    #[error("line {line}: invalid variant: {message}")]
    ValidationError {
        /// 1-based line number in the input
        line: usize,
        /// Validation failure
        message: String,
    },
}

/// Result type for VCF operations
pub type VcfResult<T> = Result<T, VcfError>;
