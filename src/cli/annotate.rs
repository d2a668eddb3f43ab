//! Annotate command implementation

use crate::annotator::{
    AnnotationPipeline, FailurePolicy, PipelineConfig, PipelineSummary, DEFAULT_BATCH_SIZE,
    DEFAULT_THREADS, MAX_THREADS,
};
use crate::metrics;
use crate::output::csv::CsvVariantWriter;
use crate::output::{OutputResult, ResultSink};
use crate::shutdown::SharedShutdown;
use crate::vcf::VcfReader;
use crate::vep::client::DEFAULT_TIMEOUT_SECS;
use crate::vep::retry::DEFAULT_MAX_ATTEMPTS;
use crate::vep::{RetryPolicy, VepClientConfig, VepHttpClient, DEFAULT_VEP_URL};
use crate::AnnotatedVariant;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::CliError;

/// Parse and validate the worker count
fn parse_threads(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("threads must be at least 1".to_string());
    }
    if value > MAX_THREADS {
        return Err(format!("threads {value} exceeds maximum of {MAX_THREADS}"));
    }
    Ok(value)
}

/// Parse and validate the batch size
fn parse_batch_size(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("batch size must be at least 1".to_string());
    }
    Ok(value)
}

/// Variant Annotator CLI
#[derive(Parser, Debug)]
#[command(name = "variant-annotator")]
#[command(
    about = "Annotate VCF variants with gene and consequence data from Ensembl VEP",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Input VCF file (plain text or .gz)
    #[arg(long, env = "VCF_FILE", default_value = "challenge_data.vcf")]
    pub vcf: PathBuf,

    /// Output CSV file
    #[arg(long, env = "OUTPUT_CSV", default_value = "annotated_variants.csv")]
    pub output: PathBuf,

    /// Number of concurrent VEP requests (max: 32)
    ///
    /// Ensembl rate-limits per client, so values above 8-16 rarely help.
    #[arg(long, env = "THREADS", default_value_t = DEFAULT_THREADS, value_parser = parse_threads)]
    pub threads: usize,

    /// Variants per VEP request
    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,

    /// What to do when a batch fails after retries: halt or skip
    #[arg(long, env = "ON_BATCH_FAILURE", default_value = "halt")]
    pub on_batch_failure: FailurePolicy,

    /// Attempts per VEP request, including the first (range: 1-10)
    #[arg(
        long,
        env = "MAX_ATTEMPTS",
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..=10)
    )]
    pub max_attempts: u32,

    /// VEP region endpoint
    #[arg(long, env = "VEP_URL", default_value = DEFAULT_VEP_URL)]
    pub vep_url: String,

    /// Per-attempt request timeout in seconds
    #[arg(
        long,
        env = "VEP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, env = "METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Summary format (json or human)
    #[arg(long, default_value = "human")]
    pub output_format: OutputFormat,

    /// Disable the progress spinner
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl Cli {
    /// Pipeline settings from the command line
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(self.threads, self.batch_size)
            .with_failure_policy(self.on_batch_failure)
    }

    /// HTTP client settings from the command line
    pub fn client_config(&self) -> VepClientConfig {
        VepClientConfig {
            url: self.vep_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryPolicy::with_max_attempts(self.max_attempts),
        }
    }

    /// Run the annotation and print the summary in the requested format
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<PipelineSummary, CliError> {
        let result = self.annotate(shutdown).await;
        match self.output_format {
            OutputFormat::Json => self.output_json(&result),
            OutputFormat::Human => self.output_human(&result),
        }
        result
    }

    async fn annotate(&self, shutdown: SharedShutdown) -> Result<PipelineSummary, CliError> {
        if let Some(addr) = self.metrics_addr {
            metrics::init_metrics(addr)?;
        }

        let client = VepHttpClient::new(self.client_config())?.with_shutdown(shutdown.clone());
        info!(
            url = client.url(),
            max_attempts = client.max_attempts(),
            "VEP client ready"
        );
        let pipeline =
            AnnotationPipeline::new(self.pipeline_config(), Arc::new(client))?.with_shutdown(shutdown);

        let reader = VcfReader::open(&self.vcf)?;
        let writer = CsvVariantWriter::new(&self.output)?;

        let progress = self.create_progress_bar();
        let mut sink = ProgressSink::new(writer, progress.clone());
        let result = pipeline.run(reader, &mut sink).await;

        // Close even on failure so rows written before a halt are kept
        let closed = sink.into_inner().close();
        match &result {
            Ok(_) => progress.finish_and_clear(),
            Err(_) => progress.abandon(),
        }

        let summary = result?;
        closed?;
        Ok(summary)
    }

    fn create_progress_bar(&self) -> ProgressBar {
        if self.no_progress || self.output_format == OutputFormat::Json {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        match ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {pos} variants annotated {msg}",
        ) {
            Ok(style) => pb.set_style(style),
            Err(e) => warn!("Invalid progress template: {}", e),
        }
        pb.set_message(format!("from {}", self.vcf.display()));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    fn output_json(&self, result: &Result<PipelineSummary, CliError>) {
        let output = match result {
            Ok(summary) => serde_json::json!({
                "success": true,
                "input": self.vcf.display().to_string(),
                "output": self.output.display().to_string(),
                "summary": summary,
            }),
            Err(e) => serde_json::json!({
                "success": false,
                "input": self.vcf.display().to_string(),
                "output": self.output.display().to_string(),
                "failed_batch": e.sequence_index(),
                "error": e.to_string(),
            }),
        };
        println!("{output}");
    }

    fn output_human(&self, result: &Result<PipelineSummary, CliError>) {
        match result {
            Ok(summary) => {
                println!("\nAnnotation completed successfully!");
                println!("Input: {}", self.vcf.display());
                println!("Output: {}", self.output.display());
                println!("Variants written: {}", summary.records_written);
                println!(
                    "Batches: {} ({} failed)",
                    summary.batches_submitted, summary.batches_failed
                );
                if !summary.skipped_batches.is_empty() {
                    println!(
                        "Skipped batches: {:?} ({} variants not annotated)",
                        summary.skipped_batches, summary.records_skipped
                    );
                }
                println!("Elapsed: {:.1}s", summary.elapsed_secs);
            }
            Err(e) => {
                eprintln!("\nAnnotation failed!");
                if let Some(index) = e.sequence_index() {
                    eprintln!("Failed batch: {index}");
                }
                eprintln!("Error: {e}");
                error!("Annotation failed: {}", e);
            }
        }
    }
}

/// Sink wrapper that advances a progress bar per written record
pub struct ProgressSink<S> {
    inner: S,
    progress: ProgressBar,
}

impl<S: ResultSink> ProgressSink<S> {
    /// Wrap `inner`
    pub fn new(inner: S, progress: ProgressBar) -> Self {
        Self { inner, progress }
    }

    /// Unwrap the inner sink
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ResultSink> ResultSink for ProgressSink<S> {
    fn write_record(&mut self, record: &AnnotatedVariant) -> OutputResult<()> {
        self.inner.write_record(record)?;
        self.progress.inc(1);
        Ok(())
    }

    fn write_records(&mut self, records: &[AnnotatedVariant]) -> OutputResult<()> {
        self.inner.write_records(records)?;
        self.progress.inc(records.len() as u64);
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.inner.flush()
    }
}
