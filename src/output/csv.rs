//! CSV output writer

use crate::AnnotatedVariant;
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

use super::{OutputError, OutputResult, ResultSink};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Flush after this many records
const FLUSH_EVERY: u64 = 1000;

/// Column order of [`VariantRecord`]
const HEADER_FIELDS: [&str; 14] = [
    "chrom",
    "pos",
    "ref",
    "alt",
    "depth",
    "ref_reads",
    "alt_reads",
    "maf",
    "type",
    "alt_perc",
    "hgvs",
    "variant_type",
    "gene",
    "consequence",
];

/// CSV row for an annotated variant
#[derive(Debug, Serialize)]
struct VariantRecord<'a> {
    chrom: &'a str,
    pos: u64,
    #[serde(rename = "ref")]
    ref_allele: &'a str,
    #[serde(rename = "alt")]
    alt_allele: &'a str,
    depth: u32,
    ref_reads: u32,
    alt_reads: u32,
    maf: f64,
    #[serde(rename = "type")]
    vcf_type: &'a str,
    alt_perc: f64,
    hgvs: &'a str,
    variant_type: String,
    gene: &'a str,
    consequence: &'a str,
}

impl<'a> From<&'a AnnotatedVariant> for VariantRecord<'a> {
    fn from(record: &'a AnnotatedVariant) -> Self {
        let v = &record.variant;
        Self {
            chrom: &v.chrom,
            pos: v.pos,
            ref_allele: &v.ref_allele,
            alt_allele: &v.alt_allele,
            depth: v.depth,
            ref_reads: v.ref_reads,
            alt_reads: v.alt_reads,
            maf: v.maf,
            vcf_type: &v.vcf_type,
            alt_perc: record.alt_perc,
            hgvs: &record.hgvs,
            variant_type: record.variant_type.to_string(),
            gene: record.gene.as_deref().unwrap_or(""),
            consequence: record.consequence.as_deref().unwrap_or(""),
        }
    }
}

/// CSV writer for annotated variants
pub struct CsvVariantWriter {
    writer: Writer<BufWriter<File>>,
    records_written: u64,
}

impl CsvVariantWriter {
    /// Create a new CSV writer with the default buffer size
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        Self::new_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Create a new CSV writer with a custom buffer size
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `buffer_size` - Size of write buffer in bytes
    pub fn new_with_buffer_size<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating CSV writer: path={}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    OutputError::IoError(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {}", e)))?;

        let buf_writer = BufWriter::with_capacity(buffer_size, file);
        // Header goes out up front so an empty or halted run still has one
        let mut csv_writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(buf_writer);
        csv_writer
            .write_record(HEADER_FIELDS)
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {}", e)))?;

        Ok(Self {
            writer: csv_writer,
            records_written: 0,
        })
    }

    /// Number of records written so far
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flush, sync to disk and close the file
    pub fn close(mut self) -> OutputResult<()> {
        debug!(
            "Closing CSV writer: {} total records written",
            self.records_written
        );

        self.flush()?;

        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get inner writer: {}", e)))?;

        let file = buf_writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get file handle: {}", e)))?;

        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {}", e)))?;

        info!(
            "CSV writer closed successfully: {} records written",
            self.records_written
        );
        Ok(())
    }
}

impl ResultSink for CsvVariantWriter {
    fn write_record(&mut self, record: &AnnotatedVariant) -> OutputResult<()> {
        self.writer
            .serialize(VariantRecord::from(record))
            .map_err(|e| OutputError::CsvError(format!("Failed to write record: {}", e)))?;

        self.records_written += 1;

        if self.records_written % FLUSH_EVERY == 0 {
            self.flush()?;
            debug!("Progress: {} records written", self.records_written);
        }

        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {}", e)))
    }
}
