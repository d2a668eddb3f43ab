//! # Variant Annotator Library
//!
//! Annotates genomic variants read from a VCF file by querying the Ensembl
//! Variant Effect Predictor (VEP) REST API in batches, computing per-variant
//! read statistics and HGVS notation, and writing the results to CSV in the
//! original input order.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use variant_annotator::annotator::{AnnotationPipeline, PipelineConfig};
//! use variant_annotator::output::csv::CsvVariantWriter;
//! use variant_annotator::vcf::VcfReader;
//! use variant_annotator::vep::{VepClientConfig, VepHttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = VcfReader::open("challenge_data.vcf")?;
//! let service = Arc::new(VepHttpClient::new(VepClientConfig::default())?);
//! let mut sink = CsvVariantWriter::new("annotated_variants.csv")?;
//!
//! let pipeline = AnnotationPipeline::new(PipelineConfig::default(), service)?;
//! let summary = pipeline.run(reader, &mut sink).await?;
//! println!("{} variants annotated", summary.records_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`vcf`] - Lazy VCF reader, one [`Variant`] per ALT allele
//! - [`hgvs`] - HGVS genomic notation for a single allele
//! - [`vep`] - VEP request/response model and the resilient HTTP client
//! - [`annotator`] - Batch builder, worker pool and ordered result collector
//! - [`output`] - Result sinks (CSV)
//! - [`shutdown`] - Cooperative stop signal for workers
//!
//! ## Ordering
//!
//! Batches are annotated concurrently, but output is always emitted in the
//! order the variants appear in the input file.

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Batch orchestration and ordered result collection
pub mod annotator;

/// HGVS notation
pub mod hgvs;

/// Production metrics
pub mod metrics;

/// Result sinks
pub mod output;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// VCF input
pub mod vcf;

/// Ensembl VEP service boundary
pub mod vep;

pub use hgvs::VariantClass;

/// One ALT allele observation read from a VCF record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variant {
    /// Chromosome ID (e.g. "1", "X", "MT")
    pub chrom: String,
    /// 1-based position of the variant
    pub pos: u64,
    /// Reference allele sequence
    #[serde(rename = "ref")]
    pub ref_allele: String,
    /// Alternate allele sequence
    #[serde(rename = "alt")]
    pub alt_allele: String,
    /// Read depth at the variant position (INFO/DP)
    pub depth: u32,
    /// Reads supporting the reference allele (INFO/RO)
    pub ref_reads: u32,
    /// Reads supporting this alternate allele (INFO/AO)
    pub alt_reads: u32,
    /// Minor allele frequency, 0 to 1
    pub maf: f64,
    /// Variant type reported by the caller (INFO/TYPE, e.g. "snp")
    #[serde(rename = "type")]
    pub vcf_type: String,
}

impl Variant {
    /// Validate variant data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.chrom.is_empty() {
            return Err("Chromosome cannot be empty".to_string());
        }

        if self.pos == 0 {
            return Err("Position must be positive (1-based)".to_string());
        }

        if !is_nucleotide_sequence(&self.ref_allele) {
            return Err(format!(
                "REF allele must match ^[ACGT]+$, got '{}'",
                self.ref_allele
            ));
        }

        if !is_nucleotide_sequence(&self.alt_allele) {
            return Err(format!(
                "ALT allele must match ^[ACGT]+$, got '{}'",
                self.alt_allele
            ));
        }

        if self.alt_allele == self.ref_allele {
            return Err("ALT allele cannot equal REF allele".to_string());
        }

        let supporting = u64::from(self.ref_reads) + u64::from(self.alt_reads);
        if supporting > u64::from(self.depth) {
            return Err(format!(
                "ref_reads ({}) + alt_reads ({}) = {} exceeds depth ({})",
                self.ref_reads, self.alt_reads, supporting, self.depth
            ));
        }

        if !(0.0..=1.0).contains(&self.maf) {
            return Err(format!("MAF must be within 0..=1, got {}", self.maf));
        }

        Ok(())
    }

    /// Region string for the VEP region endpoint: `"{chrom} {pos} . {ref} {alt} . . ."`
    pub fn vep_region(&self) -> String {
        format!(
            "{} {} . {} {} . . .",
            self.chrom, self.pos, self.ref_allele, self.alt_allele
        )
    }

    /// Percentage of reads supporting the alternate allele, rounded to 2 decimals
    pub fn alt_percentage(&self) -> f64 {
        let total = u64::from(self.alt_reads) + u64::from(self.ref_reads);
        if total == 0 {
            return 0.0;
        }
        round2(f64::from(self.alt_reads) * 100.0 / total as f64)
    }
}

/// A variant together with its VEP annotation and derived statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnotatedVariant {
    /// The input variant
    #[serde(flatten)]
    pub variant: Variant,
    /// Percentage of reads supporting the alternate allele (0 to 100)
    pub alt_perc: f64,
    /// HGVS genomic notation (e.g. "1:g.1000A>G")
    pub hgvs: String,
    /// Variant class derived from the HGVS computation
    pub variant_type: VariantClass,
    /// Gene affected by the most severe consequence
    pub gene: Option<String>,
    /// Most severe consequence reported by VEP
    pub consequence: Option<String>,
}

impl AnnotatedVariant {
    /// Build an annotated record from a variant and its (optional) VEP result
    pub fn new(variant: Variant, gene: Option<String>, consequence: Option<String>) -> Self {
        let (hgvs, variant_type) = hgvs::make_hgvs(
            &variant.chrom,
            variant.pos,
            &variant.ref_allele,
            &variant.alt_allele,
        );
        Self {
            alt_perc: variant.alt_percentage(),
            variant,
            hgvs,
            variant_type,
            gene,
            consequence,
        }
    }

    /// Validate annotated data integrity
    pub fn validate(&self) -> Result<(), String> {
        self.variant.validate()?;

        if !(0.0..=100.0).contains(&self.alt_perc) {
            return Err(format!(
                "alt_perc must be within 0..=100, got {}",
                self.alt_perc
            ));
        }

        Ok(())
    }
}

/// Round to 2 decimal places
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn is_nucleotide_sequence(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T'))
}
