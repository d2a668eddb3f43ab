//! HGVS genomic notation for a single VCF allele

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Variant class implied by the HGVS description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantClass {
    /// Single nucleotide substitution
    #[serde(rename = "sub")]
    Substitution,
    /// Deletion
    #[serde(rename = "del")]
    Deletion,
    /// Insertion
    #[serde(rename = "ins")]
    Insertion,
    /// Deletion-insertion (complex)
    #[serde(rename = "delins")]
    DeletionInsertion,
}

impl std::fmt::Display for VariantClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VariantClass::Substitution => "sub",
            VariantClass::Deletion => "del",
            VariantClass::Insertion => "ins",
            VariantClass::DeletionInsertion => "delins",
        };
        write!(f, "{s}")
    }
}

impl FromStr for VariantClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sub" => Ok(VariantClass::Substitution),
            "del" => Ok(VariantClass::Deletion),
            "ins" => Ok(VariantClass::Insertion),
            "delins" => Ok(VariantClass::DeletionInsertion),
            _ => Err(format!("Invalid variant class: {s}")),
        }
    }
}

/// Convert a VCF allele (CHROM, POS, REF, ALT) into HGVS genomic notation.
///
/// Shared leading bases are trimmed first (moving `pos` to where the change
/// starts), then shared trailing bases.
pub fn make_hgvs(chrom: &str, pos: u64, ref_allele: &str, alt_allele: &str) -> (String, VariantClass) {
    let r = ref_allele.as_bytes();
    let a = alt_allele.as_bytes();

    let prefix = r.iter().zip(a).take_while(|(x, y)| x == y).count();
    let (r, a) = (&r[prefix..], &a[prefix..]);
    let pos = pos + prefix as u64;

    let suffix = r
        .iter()
        .rev()
        .zip(a.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let r = &r[..r.len() - suffix];
    let a = &a[..a.len() - suffix];

    // Alleles are ASCII, so slicing on byte offsets stays on char boundaries
    let ref_final = String::from_utf8_lossy(r);
    let alt_final = String::from_utf8_lossy(a);

    match (r.len(), a.len()) {
        (1, 1) => (
            format!("{chrom}:g.{pos}{ref_final}>{alt_final}"),
            VariantClass::Substitution,
        ),
        (1, 0) => (format!("{chrom}:g.{pos}del"), VariantClass::Deletion),
        (n, 0) => {
            let end = pos + n as u64 - 1;
            (format!("{chrom}:g.{pos}_{end}del"), VariantClass::Deletion)
        }
        (0, _) => {
            // Insertion sits between pos-1 and pos
            let left = pos.saturating_sub(1);
            (
                format!("{chrom}:g.{left}_{pos}ins{alt_final}"),
                VariantClass::Insertion,
            )
        }
        (n, _) => {
            let end = pos + n as u64 - 1;
            (
                format!("{chrom}:g.{pos}_{end}delins{alt_final}"),
                VariantClass::DeletionInsertion,
            )
        }
    }
}
