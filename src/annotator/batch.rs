//! Batch builder

use super::AnnotateError;

/// Ordered group of records sent together in one request
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    /// 0-based position in submission order
    pub sequence_index: u64,
    /// Records in input order
    pub records: Vec<T>,
}

impl<T> Batch<T> {
    /// Number of records in the batch
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch holds no records (never true for builder output)
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Lazy iterator grouping records into batches of at most `batch_size`.
///
/// Sequence indices start at 0 and increase by one per batch. The last batch
/// may be short but is never empty.
#[derive(Debug)]
pub struct Batches<I> {
    records: I,
    batch_size: usize,
    next_index: u64,
}

/// Group `records` into batches of `batch_size`
pub fn batches<I>(records: I, batch_size: usize) -> Result<Batches<I::IntoIter>, AnnotateError>
where
    I: IntoIterator,
{
    if batch_size == 0 {
        return Err(AnnotateError::Configuration(
            "batch size must be at least 1".to_string(),
        ));
    }
    Ok(Batches {
        records: records.into_iter(),
        batch_size,
        next_index: 0,
    })
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Batch<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let records: Vec<I::Item> = self.records.by_ref().take(self.batch_size).collect();
        if records.is_empty() {
            return None;
        }
        let batch = Batch {
            sequence_index: self.next_index,
            records,
        };
        self.next_index += 1;
        Some(batch)
    }
}
