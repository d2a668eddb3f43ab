//! Halt and skip handling of terminally failed batches

use std::sync::Arc;
use tempfile::TempDir;
use variant_annotator::annotator::{
    AnnotateError, AnnotationPipeline, FailurePolicy, PipelineConfig,
};
use variant_annotator::output::csv::CsvVariantWriter;
use variant_annotator::output::{OutputError, OutputResult, ResultSink};
use variant_annotator::AnnotatedVariant;

use crate::support::{records, FakeVep};

fn positions(sink: &[AnnotatedVariant]) -> Vec<u64> {
    sink.iter().map(|r| r.variant.pos).collect()
}

#[tokio::test]
async fn test_halt_on_second_batch() {
    // Batches: [1,2] [3,4] [5,6]; position 3 makes batch 1 fail
    let service = Arc::new(FakeVep::new().with_latency(1, 20).failing_on(3));
    let pipeline = AnnotationPipeline::new(PipelineConfig::new(2, 2), service).unwrap();

    let mut sink: Vec<AnnotatedVariant> = Vec::new();
    let result = pipeline.run(records(6), &mut sink).await;

    match result {
        Err(AnnotateError::PipelineHalt {
            sequence_index,
            cause,
        }) => {
            assert_eq!(sequence_index, 1);
            assert!(cause.contains("HTTP 400"), "cause: {cause}");
        }
        other => panic!("expected halt at batch 1, got {other:?}"),
    }
    assert_eq!(positions(&sink), vec![1, 2]);
    assert!(pipeline.shutdown().is_shutdown_requested());
}

#[tokio::test]
async fn test_halt_is_the_default_policy() {
    assert_eq!(PipelineConfig::default().failure_policy, FailurePolicy::Halt);

    let service = Arc::new(FakeVep::new().failing_on(1));
    let pipeline = AnnotationPipeline::new(PipelineConfig::new(4, 5), service).unwrap();

    let mut sink: Vec<AnnotatedVariant> = Vec::new();
    let err = pipeline.run(records(20), &mut sink).await.unwrap_err();
    assert_eq!(err.sequence_index(), Some(0));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_halt_stops_submitting_new_batches() {
    let service = Arc::new(FakeVep::new().with_latency(5, 10).failing_on(1));
    let pipeline = AnnotationPipeline::new(PipelineConfig::new(2, 1), service.clone()).unwrap();

    let mut sink: Vec<AnnotatedVariant> = Vec::new();
    let result = pipeline.run(records(200), &mut sink).await;

    assert!(matches!(result, Err(AnnotateError::PipelineHalt { sequence_index: 0, .. })));
    // The window caps how far submission can run ahead of the failed batch
    let window = PipelineConfig::new(2, 1).window();
    assert!(service.calls() <= window + 2, "calls: {}", service.calls());
}

/// Sink that rejects every write
struct FullDisk;

impl ResultSink for FullDisk {
    fn write_record(&mut self, _record: &AnnotatedVariant) -> OutputResult<()> {
        Err(OutputError::IoError("disk full".to_string()))
    }

    fn flush(&mut self) -> OutputResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_sink_failure_stops_submission() {
    let config = PipelineConfig::new(2, 1);
    let window = config.window();
    let service = Arc::new(FakeVep::new().with_latency(1, 5));
    let pipeline = AnnotationPipeline::new(config, service.clone()).unwrap();

    let mut sink = FullDisk;
    let result = pipeline.run(records(200), &mut sink).await;

    match result {
        Err(AnnotateError::Output(e)) => assert!(e.to_string().contains("disk full")),
        other => panic!("expected output error, got {other:?}"),
    }
    assert!(pipeline.shutdown().is_shutdown_requested());
    assert!(service.calls() <= window + 2, "calls: {}", service.calls());
}

#[tokio::test]
async fn test_partial_csv_output_is_retained_after_halt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("annotated.csv");

    let service = Arc::new(FakeVep::new().with_latency(1, 10).failing_on(3));
    let pipeline = AnnotationPipeline::new(PipelineConfig::new(2, 2), service).unwrap();

    let mut writer = CsvVariantWriter::new(&path).unwrap();
    let result = pipeline.run(records(6), &mut writer).await;
    assert!(result.is_err());
    writer.close().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<&str> = content.lines().skip(1).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("1,1,A,G,"));
    assert!(rows[1].starts_with("1,2,A,G,"));
}

#[tokio::test]
async fn test_halt_on_first_batch_leaves_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("annotated.csv");

    let service = Arc::new(FakeVep::new().failing_on(1));
    let pipeline = AnnotationPipeline::new(PipelineConfig::new(2, 2), service).unwrap();

    let mut writer = CsvVariantWriter::new(&path).unwrap();
    let result = pipeline.run(records(4), &mut writer).await;
    assert!(matches!(result, Err(AnnotateError::PipelineHalt { sequence_index: 0, .. })));
    writer.close().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("chrom,pos,ref,alt,"));
}

#[tokio::test]
async fn test_skip_policy_continues_and_reports() {
    let service = Arc::new(FakeVep::new().with_latency(1, 20).failing_on(3));
    let config = PipelineConfig::new(2, 2).with_failure_policy(FailurePolicy::Skip);
    let pipeline = AnnotationPipeline::new(config, service).unwrap();

    let mut sink: Vec<AnnotatedVariant> = Vec::new();
    let summary = pipeline.run(records(6), &mut sink).await.unwrap();

    assert_eq!(positions(&sink), vec![1, 2, 5, 6]);
    assert_eq!(summary.skipped_batches, vec![1]);
    assert_eq!(summary.records_skipped, 2);
    assert_eq!(summary.batches_failed, 1);
    assert_eq!(summary.records_written, 4);
    assert!(!pipeline.shutdown().is_shutdown_requested());
}

#[tokio::test]
async fn test_skip_policy_with_every_batch_failing() {
    let mut service = FakeVep::new();
    for pos in 1..=4 {
        service = service.failing_on(pos);
    }
    let config = PipelineConfig::new(3, 1).with_failure_policy(FailurePolicy::Skip);
    let pipeline = AnnotationPipeline::new(config, Arc::new(service)).unwrap();

    let mut sink: Vec<AnnotatedVariant> = Vec::new();
    let summary = pipeline.run(records(4), &mut sink).await.unwrap();

    assert!(sink.is_empty());
    assert_eq!(summary.skipped_batches, vec![0, 1, 2, 3]);
}
