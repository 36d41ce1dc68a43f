//! Subsampling groups to a common total.
//!
//! Permutation tests on diversity are sensitive to group size: a larger
//! group observes more rare clonotypes. Downsampling draws every group to
//! the same number of cells without replacement before testing.

use rand::Rng;
use repdiv_core::{RepdivError, Result};

use crate::groups::GroupCollection;
use crate::runlist::RunList;

/// Downsampling mode applied before pairwise testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Downsampling {
    /// Test groups at their observed sizes.
    #[default]
    Off,
    /// Reduce every group to the smallest group total.
    ToMinimum,
    /// Reduce every group to exactly this many cells.
    ToSize(usize),
}

impl Downsampling {
    /// Target size for `groups`, or `None` when downsampling is off.
    pub fn target(&self, groups: &GroupCollection) -> Option<usize> {
        match *self {
            Downsampling::Off => None,
            Downsampling::ToMinimum => groups.totals().into_iter().min(),
            Downsampling::ToSize(n) => Some(n),
        }
    }
}

/// Subsample every group to exactly `target` cells.
///
/// Each group's cells are drawn uniformly without replacement, so the
/// result follows a multivariate hypergeometric distribution over the
/// group's clonotypes. Category order and vector length are preserved;
/// clonotypes that lose all their cells keep a zero entry.
///
/// # Errors
///
/// Returns an error if `target` is zero or any group holds fewer than
/// `target` cells.
pub fn downsample<R: Rng + ?Sized>(
    groups: &GroupCollection,
    target: usize,
    rng: &mut R,
) -> Result<GroupCollection> {
    if target == 0 {
        return Err(RepdivError::InvalidInput(
            "downsampling target must be greater than zero".into(),
        ));
    }

    let mut result = GroupCollection::new();
    for (name, counts) in groups.iter() {
        let total: usize = counts.iter().sum();
        if total < target {
            return Err(RepdivError::InvalidInput(format!(
                "group '{}' has {} cells, fewer than the downsampling target {}",
                name, total, target
            )));
        }
        let reduced = if total == target {
            counts.to_vec()
        } else {
            subsample_counts(counts, total, target, rng)
        };
        result.push(name, reduced)?;
    }
    Ok(result)
}

fn subsample_counts<R: Rng + ?Sized>(
    counts: &[usize],
    total: usize,
    target: usize,
    rng: &mut R,
) -> Vec<usize> {
    let list = RunList::from_counts(counts);
    let mut picked = rand::seq::index::sample(rng, total, target).into_vec();
    picked.sort_unstable();

    let mut kept = Vec::with_capacity(counts.len());
    let mut dropped = Vec::with_capacity(counts.len());
    list.split_counts_into(&picked, &mut kept, &mut dropped);
    kept
}
