//! Line-oriented VCF reader

use flate2::read::MultiGzDecoder;
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use super::{VcfError, VcfResult};
use crate::{round2, Variant};

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Minimum number of tab-separated columns in a data line (CHROM..INFO)
const MIN_COLUMNS: usize = 8;

/// Lazy, single-pass VCF reader
///
/// Multi-allelic records expand into one [`Variant`] per ALT allele, in ALT
/// order. `DP` and `RO` are read as scalars; `AO`, `AF` and `TYPE` as
/// per-ALT lists.
pub struct VcfReader<R> {
    inner: R,
    line_number: usize,
    buf: String,
    pending: VecDeque<Variant>,
    finished: bool,
}

impl VcfReader<Box<dyn BufRead + Send>> {
    /// Open a VCF file, transparently decompressing `.gz` input
    pub fn open<P: AsRef<Path>>(path: P) -> VcfResult<Self> {
        let path = path.as_ref();
        info!("Opening VCF: path={}", path.display());

        let file = File::open(path)?;
        let gzipped = path.extension().is_some_and(|ext| ext == "gz");

        let inner: Box<dyn BufRead + Send> = if gzipped {
            debug!("Reading gzip-compressed VCF");
            Box::new(BufReader::with_capacity(
                DEFAULT_BUFFER_SIZE,
                MultiGzDecoder::new(file),
            ))
        } else {
            Box::new(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file))
        };

        Ok(Self::new(inner))
    }
}

impl<R: BufRead> VcfReader<R> {
    /// Wrap any buffered reader
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line_number: 0,
            buf: String::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Number of lines consumed so far
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Read lines until one produces variants; `Ok(false)` at end of input
    fn fill_pending(&mut self) -> VcfResult<bool> {
        loop {
            self.buf.clear();
            if self.inner.read_line(&mut self.buf)? == 0 {
                return Ok(false);
            }
            self.line_number += 1;

            let line = self.buf.trim_end_matches(['\n', '\r']);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let variants = parse_record(line, self.line_number)?;
            if variants.is_empty() {
                continue;
            }
            self.pending.extend(variants);
            return Ok(true);
        }
    }
}

impl<R: BufRead> Iterator for VcfReader<R> {
    type Item = VcfResult<Variant>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(variant) = self.pending.pop_front() {
            return Some(Ok(variant));
        }
        if self.finished {
            return None;
        }

        match self.fill_pending() {
            Ok(true) => self.pending.pop_front().map(Ok),
            Ok(false) => {
                self.finished = true;
                None
            }
            Err(e) => {
                // A read failure leaves the stream position undefined
                if matches!(e, VcfError::IoError(_)) {
                    self.finished = true;
                }
                Some(Err(e))
            }
        }
    }
}

/// Parse one data line into its per-ALT variants
fn parse_record(line: &str, line_number: usize) -> VcfResult<Vec<Variant>> {
    let err = |message: String| VcfError::ParseError {
        line: line_number,
        message,
    };

    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() < MIN_COLUMNS {
        return Err(err(format!(
            "expected at least {MIN_COLUMNS} tab-separated columns, found {}",
            columns.len()
        )));
    }

    let chrom = columns[0];
    let pos: u64 = columns[1]
        .parse()
        .map_err(|_| err(format!("invalid POS '{}'", columns[1])))?;
    let ref_allele = columns[3];
    let alts: Vec<&str> = columns[4].split(',').filter(|a| !a.is_empty() && *a != ".").collect();

    let info = parse_info(columns[7]);
    let scalar = |key: &str| -> VcfResult<u32> {
        let raw = info
            .get(key)
            .ok_or_else(|| err(format!("missing INFO/{key}")))?;
        raw.parse()
            .map_err(|_| err(format!("invalid INFO/{key} '{raw}'")))
    };
    let list = |key: &str| -> VcfResult<Vec<&str>> {
        let raw = info
            .get(key)
            .ok_or_else(|| err(format!("missing INFO/{key}")))?;
        let values: Vec<&str> = raw.split(',').collect();
        if values.len() < alts.len() {
            return Err(err(format!(
                "INFO/{key} has {} value(s) for {} ALT allele(s)",
                values.len(),
                alts.len()
            )));
        }
        Ok(values)
    };

    if alts.is_empty() {
        return Ok(Vec::new());
    }

    let depth = scalar("DP")?;
    let ref_reads = scalar("RO")?;
    let alt_counts = list("AO")?;
    let allele_freqs = list("AF")?;
    let types = list("TYPE")?;

    let mut variants = Vec::with_capacity(alts.len());
    for (idx, alt) in alts.iter().enumerate() {
        let alt_reads: u32 = alt_counts[idx]
            .parse()
            .map_err(|_| err(format!("invalid INFO/AO '{}'", alt_counts[idx])))?;
        let af: f64 = allele_freqs[idx]
            .parse()
            .map_err(|_| err(format!("invalid INFO/AF '{}'", allele_freqs[idx])))?;

        let variant = Variant {
            chrom: chrom.to_string(),
            pos,
            ref_allele: ref_allele.to_string(),
            alt_allele: alt.to_string(),
            depth,
            ref_reads,
            alt_reads,
            maf: round2(af.min(1.0 - af)),
            vcf_type: types[idx].to_string(),
        };

        variant.validate().map_err(|message| VcfError::ValidationError {
            line: line_number,
            message,
        })?;
        variants.push(variant);
    }

    Ok(variants)
}

/// Split an INFO column into key/value pairs; flags map to an empty value
fn parse_info(raw: &str) -> HashMap<&str, &str> {
    raw.split(';')
        .filter(|entry| !entry.is_empty() && *entry != ".")
        .map(|entry| entry.split_once('=').unwrap_or((entry, "")))
        .collect()
}
