//! Output order is input order, whatever the completion order

use std::sync::Arc;
use variant_annotator::annotator::{AnnotationPipeline, PipelineConfig};
use variant_annotator::AnnotatedVariant;

use crate::support::{records, FakeVep};

fn positions(sink: &[AnnotatedVariant]) -> Vec<u64> {
    sink.iter().map(|r| r.variant.pos).collect()
}

#[tokio::test]
async fn test_ten_records_batch_three_two_threads() {
    let service = Arc::new(FakeVep::new().with_latency(1, 50));
    let pipeline = AnnotationPipeline::new(PipelineConfig::new(2, 3), service.clone()).unwrap();

    let mut sink: Vec<AnnotatedVariant> = Vec::new();
    let summary = pipeline.run(records(10), &mut sink).await.unwrap();

    assert_eq!(summary.records_written, 10);
    assert_eq!(summary.batches_submitted, 4);
    assert_eq!(positions(&sink), (1..=10).collect::<Vec<_>>());
    assert_eq!(service.calls(), 4);
}

#[tokio::test]
async fn test_order_invariant_across_pool_and_batch_sizes() {
    for threads in [1, 2, 4, 8] {
        for batch_size in [1, 3, 7] {
            let service = Arc::new(FakeVep::new().with_latency(0, 8));
            let pipeline =
                AnnotationPipeline::new(PipelineConfig::new(threads, batch_size), service).unwrap();

            let mut sink: Vec<AnnotatedVariant> = Vec::new();
            let summary = pipeline.run(records(30), &mut sink).await.unwrap();

            assert_eq!(
                positions(&sink),
                (1..=30).collect::<Vec<_>>(),
                "threads={threads} batch_size={batch_size}"
            );
            assert_eq!(summary.records_written, 30);
        }
    }
}

#[tokio::test]
async fn test_annotations_stay_with_their_variant() {
    let service = Arc::new(FakeVep::new().with_latency(1, 20));
    let pipeline = AnnotationPipeline::new(PipelineConfig::new(4, 2), service).unwrap();

    let mut sink: Vec<AnnotatedVariant> = Vec::new();
    pipeline.run(records(12), &mut sink).await.unwrap();

    for record in &sink {
        let expected = format!("GENE{}", record.variant.pos);
        assert_eq!(record.gene.as_deref(), Some(expected.as_str()));
        assert_eq!(record.consequence.as_deref(), Some("missense_variant"));
        assert_eq!(record.hgvs, format!("1:g.{}A>G", record.variant.pos));
        assert_eq!(record.alt_perc, 25.0);
    }
}

#[tokio::test]
async fn test_early_batches_are_buffered_until_gap_closes() {
    // A window of 8 with 8 workers lets later batches overtake batch 0
    let service = Arc::new(FakeVep::new().with_latency(1, 30));
    let config = PipelineConfig::new(8, 1).with_reorder_window(8);
    let pipeline = AnnotationPipeline::new(config, service.clone()).unwrap();

    let mut sink: Vec<AnnotatedVariant> = Vec::new();
    let summary = pipeline.run(records(40), &mut sink).await.unwrap();

    assert_eq!(positions(&sink), (1..=40).collect::<Vec<_>>());
    assert!(summary.max_buffered <= 8);

    let order = service.completion_order();
    assert_eq!(order.len(), 40);
}
