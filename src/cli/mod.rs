//! CLI command implementations

pub mod annotate;
pub mod error;

pub use annotate::{Cli, OutputFormat};
pub use error::CliError;
