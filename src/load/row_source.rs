use crate::core::error::Result;
use crate::core::types::Record;

/// Pull-based producer of ingest records.
///
/// `None` means the source is exhausted and stays exhausted. Malformed input
/// is skipped by the source itself and only shows up in `skipped()`; an
/// `Err` item is a failure of the underlying input.
pub trait RowSource {
    fn next_record(&mut self) -> Option<Result<Record>>;

    /// Lines or items dropped as malformed so far
    fn skipped(&self) -> u64 {
        0
    }

    fn records(&mut self) -> RowSourceIter<'_, Self>
    where
        Self: Sized,
    {
        RowSourceIter { source: self }
    }
}

/// `Iterator` view over a row source
pub struct RowSourceIter<'a, S: RowSource> {
    source: &'a mut S,
}

impl<S: RowSource> Iterator for RowSourceIter<'_, S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.source.next_record()
    }
}

/// Row source over records already in memory
#[derive(Debug, Clone, Default)]
pub struct VecRowSource {
    records: std::collections::VecDeque<Record>,
}

impl VecRowSource {
    pub fn new(records: Vec<Record>) -> Self {
        VecRowSource { records: records.into() }
    }
}

impl RowSource for VecRowSource {
    fn next_record(&mut self) -> Option<Result<Record>> {
        self.records.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_until_exhausted() {
        let mut source = VecRowSource::new(vec![Record::new(1, vec![]), Record::new(2, vec![])]);
        let stamps: Vec<i64> = source.records().map(|r| r.unwrap().timestamp).collect();
        assert_eq!(stamps, vec![1, 2]);
        assert!(source.next_record().is_none());
        assert!(source.next_record().is_none());
        assert_eq!(source.skipped(), 0);
    }
}
