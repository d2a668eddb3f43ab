//! Result sinks

use crate::AnnotatedVariant;

pub mod csv;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for annotated records, written in final order
pub trait ResultSink {
    /// Write a single annotated record
    fn write_record(&mut self, record: &AnnotatedVariant) -> OutputResult<()>;

    /// Write one batch worth of records
    fn write_records(&mut self, records: &[AnnotatedVariant]) -> OutputResult<()> {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Flush any buffered data to the underlying storage
    fn flush(&mut self) -> OutputResult<()>;
}

/// Collects records in memory
impl ResultSink for Vec<AnnotatedVariant> {
    fn write_record(&mut self, record: &AnnotatedVariant) -> OutputResult<()> {
        self.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        Ok(())
    }
}

impl<S: ResultSink + ?Sized> ResultSink for &mut S {
    fn write_record(&mut self, record: &AnnotatedVariant) -> OutputResult<()> {
        (**self).write_record(record)
    }

    fn write_records(&mut self, records: &[AnnotatedVariant]) -> OutputResult<()> {
        (**self).write_records(records)
    }

    fn flush(&mut self) -> OutputResult<()> {
        (**self).flush()
    }
}
