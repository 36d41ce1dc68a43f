//! Pairwise diversity testing across many groups.
//!
//! [`run`] compares every pair of groups with [`permutation_test`], one
//! dispatch task per group (group `i` against every earlier group), and
//! gathers the results into one lower-triangular [`PValueMatrix`] per
//! metric. Each matrix is then corrected for multiple testing on its own.

use rand::rngs::StdRng;
use rand::SeedableRng;
use repdiv_core::{RepdivError, Result, Scored, Summarizable};

use crate::correction::CorrectionMethod;
use crate::dispatch::{default_dispatcher, Dispatcher};
use crate::downsample::{downsample, Downsampling};
use crate::groups::GroupCollection;
use crate::matrix::{PValueMatrices, PValueMatrix};
use crate::metric::MetricSet;
use crate::permutation::{permutation_test, PairwiseTest};

/// Configuration for a pairwise diversity test run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PermutationConfig {
    /// Permutations per pair.
    pub iterations: usize,
    /// Metrics to test.
    pub metrics: MetricSet,
    /// Multiple testing correction applied to each metric's matrix.
    pub correction: CorrectionMethod,
    /// Equal-size downsampling applied before testing.
    pub downsampling: Downsampling,
    /// Base seed. Task `i` uses `seed + i`; downsampling uses `seed`.
    /// A random seed is drawn when `None`.
    pub seed: Option<u64>,
}

impl Default for PermutationConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            metrics: MetricSet::default(),
            correction: CorrectionMethod::Holm,
            downsampling: Downsampling::Off,
            seed: None,
        }
    }
}

/// Test every pair of groups with the default dispatcher.
///
/// See [`run`].
pub fn run_default(groups: &GroupCollection, config: &PermutationConfig) -> Result<PValueMatrices> {
    run(groups, config, &default_dispatcher())
}

/// Test every pair of groups for a difference in each requested metric.
///
/// Returns one matrix per metric, keyed `"gini"`, `"hill0"`, ..., with
/// rows and columns in group order and cell `(i, j)`, `i > j`, holding the
/// corrected p-value for groups `i` and `j`.
///
/// # Errors
///
/// - [`RepdivError::InvalidInput`] for fewer than two groups, a group with a
///   zero total, zero iterations, or an invalid downsampling target.
/// - [`RepdivError::Configuration`] if pairs report different metric sets.
///
/// Errors raised while testing a pair name both groups.
///
/// # Example
///
/// ```
/// use repdiv_stats::assembler::{run, PermutationConfig};
/// use repdiv_stats::dispatch::Sequential;
/// use repdiv_stats::groups::GroupCollection;
///
/// let groups = GroupCollection::from_pairs([
///     ("skewed", vec![10, 0, 0, 0, 0]),
///     ("even", vec![2, 2, 2, 2, 2]),
///     ("mixed", vec![4, 3, 2, 1, 0]),
/// ])
/// .unwrap();
/// let config = PermutationConfig { iterations: 200, seed: Some(7), ..Default::default() };
/// let matrices = run(&groups, &config, &Sequential).unwrap();
///
/// let gini = matrices.get("gini").unwrap();
/// assert!(gini.get(1, 0).is_some());
/// assert!(gini.get(0, 1).is_none());
/// ```
pub fn run<D: Dispatcher>(
    groups: &GroupCollection,
    config: &PermutationConfig,
    dispatcher: &D,
) -> Result<PValueMatrices> {
    validate(groups, config)?;

    let base_seed = config.seed.unwrap_or_else(rand::random);
    log::info!(
        "testing {} groups ({} pairs) on [{}]: {} permutations, {} correction, seed {}",
        groups.len(),
        groups.len() * (groups.len() - 1) / 2,
        config.metrics.names().join(", "),
        config.iterations,
        config.correction,
        base_seed,
    );

    let downsampled;
    let tested = match config.downsampling.target(groups) {
        Some(target) => {
            let mut rng = StdRng::seed_from_u64(base_seed);
            downsampled = downsample(groups, target, &mut rng)?;
            log::info!("downsampled every group to {} cells", target);
            &downsampled
        }
        None => {
            let totals = groups.totals();
            if totals.windows(2).any(|w| w[0] != w[1]) {
                log::warn!(
                    "group totals differ ({}) and downsampling is off; differences in size alone can appear significant",
                    groups.summary()
                );
            }
            groups
        }
    };

    let metrics = &config.metrics;
    let iterations = config.iterations;
    let tasks: Vec<_> = (1..tested.len())
        .map(|i| {
            let seed = base_seed.wrapping_add(i as u64);
            move || test_against_earlier(tested, i, iterations, metrics, seed)
        })
        .collect();
    let outcomes = dispatcher.map(tasks);

    let mut pairs: Vec<(usize, usize, PairwiseTest)> = Vec::new();
    for (task, outcome) in outcomes.into_iter().enumerate() {
        let i = task + 1;
        for (j, test) in outcome?.into_iter().enumerate() {
            pairs.push((i, j, test));
        }
    }

    let matrices = assemble(tested, pairs, config.correction)?;
    log::info!("finished {} metric matrices", matrices.len());
    Ok(matrices)
}

fn validate(groups: &GroupCollection, config: &PermutationConfig) -> Result<()> {
    if groups.len() < 2 {
        return Err(RepdivError::InvalidInput(format!(
            "at least 2 groups are required for pairwise testing, got {}",
            groups.len()
        )));
    }
    if config.iterations == 0 {
        return Err(RepdivError::InvalidInput(
            "number of permutations must be greater than zero".into(),
        ));
    }
    if config.metrics.is_empty() {
        return Err(RepdivError::InvalidInput(
            "at least one diversity metric must be requested".into(),
        ));
    }
    for (name, counts) in groups.iter() {
        if counts.iter().sum::<usize>() == 0 {
            return Err(RepdivError::InvalidInput(format!(
                "group '{}' has a zero total count",
                name
            )));
        }
    }
    Ok(())
}

/// One dispatch task: group `i` against groups `0..i`, sequentially, on a
/// generator owned by this task.
fn test_against_earlier(
    groups: &GroupCollection,
    i: usize,
    iterations: usize,
    metrics: &MetricSet,
    seed: u64,
) -> Result<Vec<PairwiseTest>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let names = groups.names();
    (0..i)
        .map(|j| {
            log::debug!("permutation test '{}' vs '{}'", names[i], names[j]);
            permutation_test(groups.counts(i), groups.counts(j), iterations, metrics, &mut rng)
                .map_err(|e| e.context(format!("group '{}' vs '{}'", names[i], names[j])))
        })
        .collect()
}

fn assemble(
    groups: &GroupCollection,
    pairs: Vec<(usize, usize, PairwiseTest)>,
    correction: CorrectionMethod,
) -> Result<PValueMatrices> {
    let names = match pairs.first() {
        Some((_, _, first)) => first.names(),
        None => {
            return Err(RepdivError::InvalidInput(
                "no pairwise results to assemble".into(),
            ))
        }
    };
    for (i, j, test) in &pairs {
        if test.names() != names {
            return Err(RepdivError::Configuration(format!(
                "group '{}' vs '{}' reported metrics [{}], expected [{}]",
                groups.names()[*i],
                groups.names()[*j],
                test.names().join(", "),
                names.join(", ")
            )));
        }
    }

    let labels = groups.names().to_vec();
    let mut matrices = Vec::with_capacity(names.len());
    for (k, name) in names.iter().enumerate() {
        let mut matrix = PValueMatrix::new(name.as_str(), labels.clone());
        for (i, j, test) in &pairs {
            matrix.set(*i, *j, test.results()[k].score())?;
        }
        matrix.correct(correction)?;
        log::debug!("{}", matrix.summary());
        matrices.push(matrix);
    }
    Ok(PValueMatrices::new(matrices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Sequential;
    use crate::metric::Metric;
    use crate::test_support::sample_population;

    const TOL: f64 = 1e-12;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn four_groups() -> GroupCollection {
        GroupCollection::from_pairs([
            ("skewed", vec![10, 0, 0, 0, 0]),
            ("even", vec![2, 2, 2, 2, 2]),
            ("mixed", vec![4, 3, 2, 1]),
            ("pair", vec![5, 5]),
        ])
        .unwrap()
    }

    fn config(iterations: usize, seed: u64) -> PermutationConfig {
        PermutationConfig {
            iterations,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn matrices_are_lower_triangular() {
        init_logging();
        let groups = four_groups();
        let matrices = run(&groups, &config(100, 1), &Sequential).unwrap();
        assert_eq!(matrices.names(), vec!["gini", "hill0", "hill1", "hill2"]);
        for m in matrices.iter() {
            assert_eq!(m.labels(), groups.names());
            for i in 0..4 {
                for j in 0..4 {
                    let cell = m.get(i, j);
                    if i > j {
                        let p = cell.unwrap();
                        assert!(p > 0.0 && p <= 1.0, "{}[{},{}]={}", m.metric(), i, j, p);
                    } else {
                        assert!(cell.is_none(), "{}[{},{}] populated", m.metric(), i, j);
                    }
                }
            }
        }
    }

    #[test]
    fn duplicated_group_is_not_significant() {
        init_logging();
        let counts = vec![8, 4, 2, 1, 1];
        let groups =
            GroupCollection::from_pairs([("sample", counts.clone()), ("copy", counts)]).unwrap();
        let matrices = run(&groups, &config(2000, 5), &Sequential).unwrap();
        for m in matrices.iter() {
            let p = m.get(1, 0).unwrap();
            assert!(p > 0.5, "{}: p={}", m.metric(), p);
        }
    }

    #[test]
    fn identical_even_groups_stay_high() {
        let groups =
            GroupCollection::from_pairs([("a", vec![5, 5, 5, 5]), ("b", vec![5, 5, 5, 5])]).unwrap();
        for seed in [1, 2, 3] {
            let matrices = run(&groups, &config(300, seed), &Sequential).unwrap();
            for m in matrices.iter() {
                assert!(m.get(1, 0).unwrap() > 0.5);
            }
        }
    }

    #[test]
    fn skewed_vs_even_gini_detected() {
        let groups =
            GroupCollection::from_pairs([("a", vec![10, 0, 0, 0, 0]), ("b", vec![2, 2, 2, 2, 2])])
                .unwrap();
        for seed in [11, 12, 13] {
            let matrices = run(&groups, &config(2000, seed), &Sequential).unwrap();
            let p = matrices.get("gini").unwrap().get_by_label("a", "b").unwrap();
            assert!(p < 0.05, "seed {}: p={}", seed, p);
        }
    }

    #[test]
    fn bonferroni_scales_by_number_of_pairs() {
        let groups = four_groups();
        let mut raw_config = config(200, 9);
        raw_config.correction = CorrectionMethod::None;
        let mut bonf_config = raw_config.clone();
        bonf_config.correction = CorrectionMethod::Bonferroni;

        let raw = run(&groups, &raw_config, &Sequential).unwrap();
        let adjusted = run(&groups, &bonf_config, &Sequential).unwrap();
        for (r, a) in raw.iter().zip(adjusted.iter()) {
            for ((i, j, p), (_, _, q)) in r.populated().zip(a.populated()) {
                assert!((q - (p * 6.0).min(1.0)).abs() < TOL, "{}[{},{}]", r.metric(), i, j);
            }
        }
    }

    #[test]
    fn holm_is_monotone_within_each_metric() {
        let groups = four_groups();
        let mut raw_config = config(200, 17);
        raw_config.correction = CorrectionMethod::None;
        let mut holm_config = raw_config.clone();
        holm_config.correction = CorrectionMethod::Holm;

        let raw = run(&groups, &raw_config, &Sequential).unwrap();
        let adjusted = run(&groups, &holm_config, &Sequential).unwrap();
        for (r, a) in raw.iter().zip(adjusted.iter()) {
            let mut pairs: Vec<(f64, f64)> = r
                .populated()
                .zip(a.populated())
                .map(|((_, _, p), (_, _, q))| (p, q))
                .collect();
            pairs.sort_by(|x, y| x.0.total_cmp(&y.0));
            for w in pairs.windows(2) {
                assert!(w[1].1 >= w[0].1 - TOL, "{}: {:?}", r.metric(), pairs);
            }
        }
    }

    #[test]
    fn size_asymmetry_without_downsampling_skews_p_values() {
        init_logging();
        // one clonotype population (abundances 1..=20) sampled at two depths
        let population: Vec<usize> = (1..=20).collect();
        let metrics = MetricSet::new(vec![Metric::Hill(0.0)]).unwrap();
        let mut off = Vec::new();
        let mut down = Vec::new();
        for t in 0..12u64 {
            let mut rng = StdRng::seed_from_u64(500 + t);
            let groups = GroupCollection::from_pairs([
                ("deep", sample_population(&population, 200, &mut rng)),
                ("shallow", sample_population(&population, 20, &mut rng)),
            ])
            .unwrap();
            let base = PermutationConfig {
                iterations: 199,
                metrics: metrics.clone(),
                correction: CorrectionMethod::None,
                seed: Some(900 + t),
                ..Default::default()
            };
            let downsampled = PermutationConfig {
                downsampling: Downsampling::ToMinimum,
                ..base.clone()
            };
            off.push(run(&groups, &base, &Sequential).unwrap().get("hill0").unwrap().get(1, 0).unwrap());
            down.push(run(&groups, &downsampled, &Sequential).unwrap().get("hill0").unwrap().get(1, 0).unwrap());
        }

        // the null keeps the depth gap, so richness hardly ever looks different
        let mean = |ps: &[f64]| ps.iter().sum::<f64>() / ps.len() as f64;
        assert!(mean(&off) > 0.95, "off: {:?}", off);
        assert!(
            mean(&down) < mean(&off) - 0.05,
            "off: {:?} downsampled: {:?}",
            off,
            down
        );
    }

    #[test]
    fn same_seed_same_matrices() {
        let groups = four_groups();
        let a = run(&groups, &config(150, 77), &Sequential).unwrap();
        let b = run(&groups, &config(150, 77), &Sequential).unwrap();
        assert_eq!(a, b);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn rayon_matches_sequential() {
        use crate::dispatch::RayonDispatcher;

        let groups = four_groups();
        let seq = run(&groups, &config(150, 31), &Sequential).unwrap();
        let par = run(&groups, &config(150, 31), &RayonDispatcher::with_threads(3).unwrap()).unwrap();
        assert_eq!(seq, par);
        let default = run_default(&groups, &config(150, 31)).unwrap();
        assert_eq!(seq, default);
    }

    #[test]
    fn rejects_single_group() {
        let groups = GroupCollection::from_pairs([("only", vec![3, 2])]).unwrap();
        let err = run(&groups, &config(10, 0), &Sequential).unwrap_err();
        assert!(matches!(err, RepdivError::InvalidInput(_)));
    }

    #[test]
    fn rejects_zero_total_group_by_name() {
        let groups =
            GroupCollection::from_pairs([("a", vec![3, 2]), ("empty", vec![0, 0])]).unwrap();
        let err = run(&groups, &config(10, 0), &Sequential).unwrap_err();
        assert!(err.to_string().contains("'empty'"), "{}", err);
    }

    #[test]
    fn rejects_zero_iterations() {
        assert!(run(&four_groups(), &config(0, 0), &Sequential).is_err());
    }

    #[test]
    fn rejects_oversized_downsampling_target() {
        let cfg = PermutationConfig {
            downsampling: Downsampling::ToSize(1000),
            ..config(10, 0)
        };
        assert!(run(&four_groups(), &cfg, &Sequential).is_err());
    }

    #[test]
    fn parsed_correction_method_drives_run() {
        let mut cfg = config(50, 4);
        cfg.correction = "fdr".parse().unwrap();
        let matrices = run(&four_groups(), &cfg, &Sequential).unwrap();
        assert_eq!(matrices.len(), 4);
    }

    #[test]
    fn mismatched_metric_sets_fail() {
        let groups = four_groups();
        let gini = MetricSet::new(vec![Metric::Gini]).unwrap();
        let hill = MetricSet::new(vec![Metric::Hill(1.0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let pairs = vec![
            (1, 0, permutation_test(groups.counts(1), groups.counts(0), 10, &gini, &mut rng).unwrap()),
            (2, 0, permutation_test(groups.counts(2), groups.counts(0), 10, &hill, &mut rng).unwrap()),
        ];
        let err = assemble(&groups, pairs, CorrectionMethod::Holm).unwrap_err();
        assert!(matches!(err, RepdivError::Configuration(_)));
    }
}
