//! VEP region-endpoint request and response model

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::warn;

use super::failure::FailureKind;
use super::ServiceError;

/// Body of a `POST /vep/homo_sapiens/region` request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VepRequest {
    /// One region string per variant, in batch order
    pub variants: Vec<String>,
}

/// Transcript-level consequence in a VEP record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TranscriptConsequence {
    /// HGNC gene symbol
    #[serde(default)]
    pub gene_symbol: Option<String>,
    /// Sequence Ontology consequence terms for this transcript
    #[serde(default)]
    pub consequence_terms: Vec<String>,
}

/// One VEP result record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VepRecord {
    /// Echo of the region string this record answers
    #[serde(default)]
    pub input: Option<String>,
    /// Most severe consequence across all transcripts
    #[serde(default)]
    pub most_severe_consequence: Option<String>,
    /// Per-transcript consequences (absent for intergenic variants)
    #[serde(default)]
    pub transcript_consequences: Vec<TranscriptConsequence>,
}

impl VepRecord {
    /// Gene symbol of the first transcript whose consequence terms include
    /// the most severe consequence
    pub fn gene_for_most_severe_consequence(&self) -> Option<&str> {
        let most_severe = self.most_severe_consequence.as_deref()?;
        self.transcript_consequences
            .iter()
            .find(|t| t.consequence_terms.iter().any(|c| c == most_severe))
            .and_then(|t| t.gene_symbol.as_deref())
    }
}

/// Pair VEP records with the region strings they answer.
///
/// When every record echoes its `input`, records are matched by key and a
/// region with no record maps to `None`. Otherwise pairing is positional and
/// the counts must agree.
pub fn match_records(
    regions: &[String],
    records: Vec<VepRecord>,
) -> Result<Vec<Option<VepRecord>>, ServiceError> {
    let keyed = !records.is_empty() && records.iter().all(|r| r.input.is_some());

    if !keyed {
        if records.len() != regions.len() {
            return Err(ServiceError::Permanent {
                kind: FailureKind::MismatchedResponse,
                message: format!(
                    "received {} record(s) for {} variant(s)",
                    records.len(),
                    regions.len()
                ),
            });
        }
        return Ok(records.into_iter().map(Some).collect());
    }

    let mut by_input: HashMap<String, VecDeque<VepRecord>> = HashMap::new();
    for record in records {
        let key = record.input.clone().unwrap_or_default();
        by_input.entry(key).or_default().push_back(record);
    }

    let matched: Vec<Option<VepRecord>> = regions
        .iter()
        .map(|region| {
            let record = by_input.get_mut(region).and_then(|q| q.pop_front());
            if record.is_none() {
                warn!(region = %region, "No VEP record returned for variant");
            }
            record
        })
        .collect();

    let unmatched: usize = by_input.values().map(VecDeque::len).sum();
    if unmatched > 0 {
        warn!(unmatched, "VEP returned records for inputs that were not requested");
    }

    Ok(matched)
}
