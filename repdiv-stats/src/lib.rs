//! Permutation tests for differences in repertoire diversity.
//!
//! Given several groups of clonotype counts, [`assembler::run`] asks for
//! every pair of groups whether their diversity differs, for the Gini
//! index and any number of Hill-number orders, and returns one
//! multiple-testing corrected p-value matrix per metric.
//!
//! - **Diversity** — Gini, Hill numbers, Shannon ([`diversity`])
//! - **Permutation test** — two-sample test with Phipson–Smyth p-values ([`permutation`])
//! - **Pairwise matrices** — lower-triangular p-value matrices ([`matrix`], [`assembler`])
//! - **Multiple testing correction** — Bonferroni, Holm, Hochberg, BH, BY ([`correction`])
//! - **Downsampling** — equal-size subsampling before testing ([`downsample`])
//! - **Dispatch** — sequential or rayon-backed task execution ([`dispatch`])
//!
//! # Example
//!
//! ```
//! use repdiv_stats::{run, GroupCollection, PermutationConfig, Sequential};
//!
//! let groups = GroupCollection::from_pairs([
//!     ("expanded", vec![40, 3, 2, 1]),
//!     ("naive", vec![6, 5, 5, 4, 4, 4, 3, 3, 2, 2]),
//! ])
//! .unwrap();
//! let config = PermutationConfig { iterations: 500, seed: Some(1), ..Default::default() };
//! let matrices = run(&groups, &config, &Sequential).unwrap();
//!
//! let p = matrices.get("gini").unwrap().get_by_label("expanded", "naive").unwrap();
//! assert!(p > 0.0 && p <= 1.0);
//! ```

pub mod assembler;
pub mod correction;
pub mod dispatch;
pub mod diversity;
pub mod downsample;
pub mod groups;
pub mod matrix;
pub mod metric;
pub mod permutation;
pub mod runlist;

#[cfg(test)]
mod test_support;

pub use assembler::{run, run_default, PermutationConfig};
pub use correction::CorrectionMethod;
pub use dispatch::{Dispatcher, Sequential};
#[cfg(feature = "parallel")]
pub use dispatch::RayonDispatcher;
pub use downsample::Downsampling;
pub use groups::GroupCollection;
pub use matrix::{PValueMatrices, PValueMatrix};
pub use metric::{Metric, MetricSet};
pub use permutation::{permutation_test, MetricTest, PairwiseTest};
pub use runlist::RunList;
