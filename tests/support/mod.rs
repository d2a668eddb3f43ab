//! Shared fixtures: test variants and an in-process VEP fake

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use variant_annotator::vcf::VcfResult;
use variant_annotator::vep::retry::permanent;
use variant_annotator::vep::{
    AnnotationService, AnnotationServiceError, FailureKind, TranscriptConsequence, VepRecord,
};
use variant_annotator::Variant;

/// SNV on chromosome 1 at `pos`
pub fn variant(pos: u64) -> Variant {
    Variant {
        chrom: "1".to_string(),
        pos,
        ref_allele: "A".to_string(),
        alt_allele: "G".to_string(),
        depth: 40,
        ref_reads: 30,
        alt_reads: 10,
        maf: 0.25,
        vcf_type: "snp".to_string(),
    }
}

/// `n` readable records at positions 1..=n
pub fn records(n: u64) -> Vec<VcfResult<Variant>> {
    (1..=n).map(|pos| Ok(variant(pos))).collect()
}

/// Position encoded in a region string ("{chrom} {pos} . {ref} {alt} . . .")
pub fn region_pos(region: &str) -> Option<u64> {
    region.split_whitespace().nth(1)?.parse().ok()
}

/// Fake annotation service.
///
/// Echoes every region back with a gene named after its position, sleeps a
/// random latency per call, and fails permanently for any batch containing
/// one of the configured positions. Tracks how many calls were in flight.
#[derive(Default)]
pub struct FakeVep {
    latency_ms: (u64, u64),
    fail_positions: HashSet<u64>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    completion_order: Mutex<Vec<u64>>,
}

impl FakeVep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep uniformly within `min..=max` milliseconds per call
    pub fn with_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.latency_ms = (min_ms, max_ms);
        self
    }

    /// Fail any batch that contains `pos`
    pub fn failing_on(mut self, pos: u64) -> Self {
        self.fail_positions.insert(pos);
        self
    }

    /// Most calls observed in flight at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// First position of each batch, in the order the calls finished
    pub fn completion_order(&self) -> Vec<u64> {
        self.completion_order
            .lock()
            .map(|order| order.clone())
            .unwrap_or_default()
    }

    fn latency(&self) -> Duration {
        let (min, max) = self.latency_ms;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

#[async_trait]
impl AnnotationService for FakeVep {
    async fn annotate(&self, regions: &[String]) -> Result<Vec<VepRecord>, AnnotationServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = self.latency();
        tokio::time::sleep(delay).await;

        let positions: Vec<u64> = regions.iter().filter_map(|r| region_pos(r)).collect();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let (Ok(mut order), Some(first)) = (self.completion_order.lock(), positions.first()) {
            order.push(*first);
        }

        if positions.iter().any(|p| self.fail_positions.contains(p)) {
            return Err(AnnotationServiceError::new(
                1,
                permanent(FailureKind::InvalidRequest, "HTTP 400 Bad Request"),
            ));
        }

        Ok(regions
            .iter()
            .map(|region| {
                let gene = region_pos(region).map(|p| format!("GENE{p}"));
                VepRecord {
                    input: Some(region.clone()),
                    most_severe_consequence: Some("missense_variant".to_string()),
                    transcript_consequences: vec![TranscriptConsequence {
                        gene_symbol: gene,
                        consequence_terms: vec!["missense_variant".to_string()],
                    }],
                }
            })
            .collect())
    }
}
