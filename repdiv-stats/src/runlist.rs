//! Run-length encoded label sequences.
//!
//! A [`RunList`] stores a pooled sequence of category labels as
//! `(label, count)` runs: label `k` repeated `count` times, runs laid out
//! back to back. Splitting the sequence by an ascending sample of positions
//! only has to count how many sampled positions fall into each run, so a
//! repartition costs `O(runs + sample)` and never materialises the expanded
//! sequence.

use repdiv_core::{RepdivError, Result};

/// A single run: `count` consecutive copies of `label`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// Category label, unique within the list.
    pub label: usize,
    /// Run length. Zero-length runs are kept in pooled lists so every
    /// category keeps its slot.
    pub count: usize,
}

/// Run-length encoded label sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunList {
    runs: Vec<Run>,
    total: usize,
}

/// Left (sampled) and right (complement) halves of a split [`RunList`].
///
/// Each half holds only the labels it received cells from, in parent
/// order, as run-length decoding its sub-sequence would produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSplit {
    pub left: RunList,
    pub right: RunList,
}

impl RunList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// One run per category, labelled `0..counts.len()`.
    pub fn from_counts(counts: &[usize]) -> Self {
        let mut list = Self::with_capacity(counts.len());
        for (label, &count) in counts.iter().enumerate() {
            list.push(label, count);
        }
        list
    }

    /// Pool two groups: `a`'s categories get labels `0..a.len()`, `b`'s get
    /// `a.len()..a.len() + b.len()`, so no label is shared between groups.
    pub fn pooled(a: &[usize], b: &[usize]) -> Self {
        let mut list = Self::with_capacity(a.len() + b.len());
        for (label, &count) in a.iter().chain(b.iter()).enumerate() {
            list.push(label, count);
        }
        list
    }

    fn with_capacity(n: usize) -> Self {
        Self {
            runs: Vec::with_capacity(n),
            total: 0,
        }
    }

    /// Append a run.
    pub fn push(&mut self, label: usize, count: usize) {
        self.runs.push(Run { label, count });
        self.total += count;
    }

    /// The runs, in sequence order.
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Number of runs (including zero-length ones).
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether there are no runs.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Length of the expanded label sequence.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Per-run counts, in run order.
    pub fn counts(&self) -> Vec<usize> {
        self.runs.iter().map(|r| r.count).collect()
    }

    /// Iterate over the expanded label sequence.
    pub fn labels(&self) -> impl Iterator<Item = usize> + '_ {
        self.runs
            .iter()
            .flat_map(|r| std::iter::repeat(r.label).take(r.count))
    }

    /// Split the expanded sequence into the positions in `indices` (left)
    /// and all other positions (right), preserving relative order.
    ///
    /// ```
    /// use repdiv_stats::runlist::RunList;
    ///
    /// // expanded: 0 0 0 1 2 2
    /// let list = RunList::from_counts(&[3, 1, 2]);
    /// let split = list.split_by_sorted_indices(&[1, 3, 5]).unwrap();
    /// assert_eq!(split.left.counts(), vec![1, 1, 1]);
    /// assert_eq!(split.right.counts(), vec![2, 1]);
    /// assert_eq!(split.right.runs()[1].label, 2);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if `indices` is not strictly increasing or an index
    /// is past the end of the expanded sequence.
    pub fn split_by_sorted_indices(&self, indices: &[usize]) -> Result<RunSplit> {
        for w in indices.windows(2) {
            if w[0] >= w[1] {
                return Err(RepdivError::InvalidInput(format!(
                    "split indices must be strictly increasing ({} then {})",
                    w[0], w[1]
                )));
            }
        }
        if let Some(&last) = indices.last() {
            if last >= self.total {
                return Err(RepdivError::InvalidInput(format!(
                    "split index {} out of range for sequence of length {}",
                    last, self.total
                )));
            }
        }

        let mut left_counts = Vec::with_capacity(self.runs.len());
        let mut right_counts = Vec::with_capacity(self.runs.len());
        self.split_counts_into(indices, &mut left_counts, &mut right_counts);

        let mut left = Self::with_capacity(self.runs.len());
        let mut right = Self::with_capacity(self.runs.len());
        for ((run, l), r) in self.runs.iter().zip(left_counts).zip(right_counts) {
            if l > 0 {
                left.push(run.label, l);
            }
            if r > 0 {
                right.push(run.label, r);
            }
        }
        Ok(RunSplit { left, right })
    }

    /// Count-only split, one entry per run of `self` (zeros included).
    /// Buffers are cleared and refilled; `indices` must already be validated.
    pub(crate) fn split_counts_into(
        &self,
        indices: &[usize],
        left: &mut Vec<usize>,
        right: &mut Vec<usize>,
    ) {
        debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        left.clear();
        right.clear();

        let mut pos = 0;
        let mut end = 0;
        for run in &self.runs {
            end += run.count;
            let start = pos;
            while pos < indices.len() && indices[pos] < end {
                pos += 1;
            }
            let taken = pos - start;
            left.push(taken);
            right.push(run.count - taken);
        }
        debug_assert_eq!(pos, indices.len());
    }

    /// Like [`split_counts_into`](Self::split_counts_into), but each half
    /// keeps only the runs it drew cells from.
    pub(crate) fn split_present_into(
        &self,
        indices: &[usize],
        left: &mut Vec<usize>,
        right: &mut Vec<usize>,
    ) {
        self.split_counts_into(indices, left, right);
        left.retain(|&c| c > 0);
        right.retain(|&c| c > 0);
    }
}
