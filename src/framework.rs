//! Pull-based stage abstractions the pipeline is assembled from.

use crate::error::IngestError;

use std::ops::AddAssign;
use std::sync::Arc;

/// A unit of data travelling through the pipeline, tagged with the archive
/// (or directory) it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowFile<T> {
    pub data: T,
    pub source: Arc<str>,
}

impl<T> FlowFile<T> {
    pub fn new(data: T, source: Arc<str>) -> Self {
        Self { data, source }
    }
}

impl FlowFile<()> {
    pub fn genesis() -> Self {
        Self {
            data: (),
            source: Arc::from(""),
        }
    }
}

/// Item yielded by every stage.
pub type Flow<T> = Result<FlowFile<T>, IngestError>;

/// One input fans out into a lazy sequence of outputs.
pub trait Transform {
    type Input;
    type Output;
    type Iter: Iterator<Item = Flow<Self::Output>>;

    fn transform(&self, input: FlowFile<Self::Input>) -> Self::Iter;
}

/// Where a junction sends a flowfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Keep,
    Divert,
    Drop,
}

/// Routes a flowfile without consuming or changing it.
pub trait Junction {
    type Input;

    fn split(&self, input: &FlowFile<Self::Input>) -> Route;
}

/// Terminal stage.
pub trait Sink {
    type Input;

    fn close(&mut self, input: FlowFile<Self::Input>) -> Result<(), IngestError>;
}

/// Runs `after` once the wrapped iterator is dropped, whether or not it was
/// drained.
pub struct CloseableIter<I: Iterator, F: Fn()> {
    iter: I,
    after: F,
}

impl<I: Iterator, F: Fn()> CloseableIter<I, F> {
    pub fn new(iter: I, after: F) -> Self {
        Self { iter, after }
    }
}

impl<I: Iterator, F: Fn()> Iterator for CloseableIter<I, F> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

impl<I: Iterator, F: Fn()> Drop for CloseableIter<I, F> {
    fn drop(&mut self) {
        (self.after)()
    }
}

/// Record counters, kept per archive and summed for the run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub records: u64,
    pub kept: u64,
    pub diverted: u64,
    pub dropped: u64,
    pub lossy_chunks: u64,
    pub discarded_bytes: u64,
    pub archives: u64,
    pub aborted_archives: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one record under the route it actually took.
    pub fn increment(&mut self, route: Route) {
        self.records += 1;
        match route {
            Route::Keep => self.kept += 1,
            Route::Divert => self.diverted += 1,
            Route::Drop => self.dropped += 1,
        }
    }
}

impl AddAssign<&Stats> for Stats {
    fn add_assign(&mut self, other: &Stats) {
        self.records += other.records;
        self.kept += other.kept;
        self.diverted += other.diverted;
        self.dropped += other.dropped;
        self.lossy_chunks += other.lossy_chunks;
        self.discarded_bytes += other.discarded_bytes;
        self.archives += other.archives;
        self.aborted_archives += other.aborted_archives;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    #[test]
    fn test_closeable_iter_runs_after_on_early_drop() {
        let closed = Cell::new(0);
        {
            let mut iter = CloseableIter::new(1..10, || closed.set(closed.get() + 1));
            assert_eq!(iter.next(), Some(1));
            assert_eq!(closed.get(), 0);
        }
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn test_stats_sum() {
        let mut archive = Stats::new();
        archive.increment(Route::Keep);
        archive.increment(Route::Drop);
        archive.increment(Route::Divert);
        archive.increment(Route::Keep);

        let mut total = Stats::new();
        total += &archive;
        total += &archive;
        assert_eq!(total.records, 8);
        assert_eq!(total.kept, 4);
        assert_eq!(total.diverted, 2);
        assert_eq!(total.dropped, 2);
    }
}
