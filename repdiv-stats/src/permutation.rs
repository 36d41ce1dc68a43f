//! Two-sample permutation test on diversity indices.
//!
//! Both groups' clonotypes are pooled into a [`RunList`] with disjoint
//! labels. Each permutation draws as many cells as the first group holds,
//! splits the pool into the drawn cells and the rest, and recomputes every
//! requested metric on both halves. A half only holds the categories it
//! drew cells from. The p-value is the Phipson–Smyth
//! estimate `(b + 1) / (m + 1)`, where `b` counts permutations whose
//! absolute metric difference reached the observed one out of `m`.

use rand::Rng;
use repdiv_core::{RepdivError, Result, Scored, Summarizable};

use crate::metric::{EvalScratch, Metric, MetricSet};
use crate::runlist::RunList;

/// Relative tolerance under which a permuted difference ties the observed one.
const TIE_TOLERANCE: f64 = 1e-10;

/// Outcome of the permutation test for one metric.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricTest {
    /// The metric tested.
    pub metric: Metric,
    /// Observed statistic `|metric(a) - metric(b)|`.
    pub observed: f64,
    /// Mean absolute difference over all permutations.
    pub null_mean: f64,
    /// Permutations whose absolute difference reached `observed`.
    pub exceedances: usize,
    /// Number of permutations drawn.
    pub iterations: usize,
    /// Phipson–Smyth p-value, in (0, 1].
    pub p_value: f64,
}

impl Scored for MetricTest {
    fn score(&self) -> f64 {
        self.p_value
    }
}

impl Summarizable for MetricTest {
    fn summary(&self) -> String {
        format!(
            "{}: observed={:.4}, null mean={:.4}, exceedances={}/{}, p={:.6}",
            self.metric, self.observed, self.null_mean, self.exceedances, self.iterations, self.p_value,
        )
    }
}

/// Results of one pairwise permutation test, one entry per metric.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairwiseTest {
    results: Vec<MetricTest>,
}

impl PairwiseTest {
    /// Per-metric results in metric-set order.
    pub fn results(&self) -> &[MetricTest] {
        &self.results
    }

    /// Metric keys in order.
    pub fn names(&self) -> Vec<String> {
        self.results.iter().map(|r| r.metric.name()).collect()
    }

    /// Result for the metric keyed `name` (`"gini"`, `"hill1"`, ...).
    pub fn get(&self, name: &str) -> Option<&MetricTest> {
        self.results.iter().find(|r| r.metric.name() == name)
    }

    /// p-value for the metric keyed `name`.
    pub fn p_value(&self, name: &str) -> Option<f64> {
        self.get(name).map(Scored::score)
    }
}

impl Summarizable for PairwiseTest {
    fn summary(&self) -> String {
        let parts: Vec<String> = self
            .results
            .iter()
            .map(|r| format!("{}={:.4}", r.metric, r.p_value))
            .collect();
        format!("PairwiseTest: {}", parts.join(", "))
    }
}

/// Running null-distribution state for one pairwise test.
///
/// Holds the observed statistic per metric, the running total of permuted
/// absolute differences, and how many of them reached the observed value.
/// Every vector is indexed like the [`MetricSet`] it was built for.
#[derive(Debug, Clone)]
pub struct NullAccumulator {
    metrics: Vec<Metric>,
    observed: Vec<f64>,
    sums: Vec<f64>,
    exceedances: Vec<usize>,
    iterations: usize,
}

impl NullAccumulator {
    /// Start accumulating against the observed statistics of `metrics`.
    ///
    /// # Errors
    ///
    /// Returns an error if `observed` does not hold one value per metric.
    pub fn new(metrics: &MetricSet, observed: Vec<f64>) -> Result<Self> {
        check_len("observed statistics", metrics.len(), observed.len())?;
        let n = observed.len();
        Ok(Self {
            metrics: metrics.metrics().to_vec(),
            observed,
            sums: vec![0.0; n],
            exceedances: vec![0; n],
            iterations: 0,
        })
    }

    /// Record one permutation from the metric values of its two halves.
    ///
    /// # Errors
    ///
    /// Returns an error, recording nothing, if either side does not hold
    /// one value per metric.
    pub fn record(&mut self, left: &[f64], right: &[f64]) -> Result<()> {
        check_len("left metric values", self.metrics.len(), left.len())?;
        check_len("right metric values", self.metrics.len(), right.len())?;
        for (k, (l, r)) in left.iter().zip(right).enumerate() {
            let diff = (l - r).abs();
            self.sums[k] += diff;
            let obs = self.observed[k];
            if diff >= obs - TIE_TOLERANCE * obs.abs().max(1.0) {
                self.exceedances[k] += 1;
            }
        }
        self.iterations += 1;
        Ok(())
    }

    /// Permutations recorded so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Current Phipson–Smyth p-values, `(b + 1) / (m + 1)`.
    pub fn p_values(&self) -> Vec<f64> {
        let denom = (self.iterations + 1) as f64;
        self.exceedances
            .iter()
            .map(|&b| (b + 1) as f64 / denom)
            .collect()
    }

    /// Consume the accumulator into per-metric results.
    pub fn finish(self) -> PairwiseTest {
        let p_values = self.p_values();
        let m = self.iterations;
        let results = self
            .metrics
            .iter()
            .enumerate()
            .map(|(k, &metric)| MetricTest {
                metric,
                observed: self.observed[k],
                null_mean: if m > 0 { self.sums[k] / m as f64 } else { 0.0 },
                exceedances: self.exceedances[k],
                iterations: m,
                p_value: p_values[k],
            })
            .collect();
        PairwiseTest { results }
    }
}

fn check_len(what: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(RepdivError::InvalidInput(format!(
            "{} hold {} values, expected one per metric ({})",
            what, got, expected
        )));
    }
    Ok(())
}

/// Permutation test for a difference in diversity between two groups.
///
/// `counts_a` and `counts_b` are clonotype counts; categories are not
/// matched between the groups. Zero entries count towards the observed
/// Gini index as declared categories, while a permuted half only holds the
/// categories it drew cells from. Every permutation keeps the group sizes
/// fixed, so the test is only fair when both groups hold the same number
/// of cells (see [`crate::downsample`]).
///
/// # Errors
///
/// Returns an error if `iterations` is zero, `metrics` is empty, or either
/// group has no categories or a zero total.
///
/// # Example
///
/// ```
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
/// use repdiv_stats::metric::MetricSet;
/// use repdiv_stats::permutation::permutation_test;
///
/// let mut rng = StdRng::seed_from_u64(42);
/// let test = permutation_test(&[10, 0, 0, 0, 0], &[2, 2, 2, 2, 2], 500, &MetricSet::default(), &mut rng)
///     .unwrap();
/// assert!(test.p_value("gini").unwrap() < 0.05);
/// ```
pub fn permutation_test<R: Rng + ?Sized>(
    counts_a: &[usize],
    counts_b: &[usize],
    iterations: usize,
    metrics: &MetricSet,
    rng: &mut R,
) -> Result<PairwiseTest> {
    if iterations == 0 {
        return Err(RepdivError::InvalidInput(
            "number of permutations must be greater than zero".into(),
        ));
    }
    if metrics.is_empty() {
        return Err(RepdivError::InvalidInput(
            "at least one diversity metric must be requested".into(),
        ));
    }
    let nx: usize = counts_a.iter().sum();
    let ny: usize = counts_b.iter().sum();
    if nx == 0 || ny == 0 {
        return Err(RepdivError::InvalidInput(format!(
            "both groups need a positive total count (got {} and {})",
            nx, ny
        )));
    }

    let mut scratch = EvalScratch::default();
    let mut left_stats = Vec::with_capacity(metrics.len());
    let mut right_stats = Vec::with_capacity(metrics.len());

    metrics.evaluate_into(counts_a, &mut scratch, &mut left_stats)?;
    metrics.evaluate_into(counts_b, &mut scratch, &mut right_stats)?;
    let observed: Vec<f64> = left_stats
        .iter()
        .zip(&right_stats)
        .map(|(a, b)| (a - b).abs())
        .collect();
    let mut acc = NullAccumulator::new(metrics, observed)?;

    let pool = RunList::pooled(counts_a, counts_b);
    let n = pool.total();
    let mut positions: Vec<usize> = (0..n).collect();
    let mut sample = Vec::with_capacity(nx);
    let mut left = Vec::with_capacity(pool.len());
    let mut right = Vec::with_capacity(pool.len());

    for _ in 0..iterations {
        draw_sorted_sample(&mut positions, nx, &mut sample, rng);
        pool.split_present_into(&sample, &mut left, &mut right);
        metrics.evaluate_into(&left, &mut scratch, &mut left_stats)?;
        metrics.evaluate_into(&right, &mut scratch, &mut right_stats)?;
        acc.record(&left_stats, &right_stats)?;
    }

    Ok(acc.finish())
}

/// Uniform `k`-subset of `0..positions.len()`, sorted ascending, via a
/// partial Fisher–Yates shuffle. `positions` must hold a permutation of
/// `0..n`; it stays one afterwards, so it can be reused across draws.
fn draw_sorted_sample<R: Rng + ?Sized>(
    positions: &mut [usize],
    k: usize,
    sample: &mut Vec<usize>,
    rng: &mut R,
) {
    let n = positions.len();
    for i in 0..k {
        let j = rng.random_range(i..n);
        positions.swap(i, j);
    }
    sample.clear();
    sample.extend_from_slice(&positions[..k]);
    sample.sort_unstable();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_population;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gini_only() -> MetricSet {
        MetricSet::new(vec![Metric::Gini]).unwrap()
    }

    #[test]
    fn skewed_vs_even_gini_is_significant() {
        for seed in [1, 2, 3, 4, 5] {
            let mut rng = StdRng::seed_from_u64(seed);
            let test = permutation_test(
                &[10, 0, 0, 0, 0],
                &[2, 2, 2, 2, 2],
                2000,
                &MetricSet::default(),
                &mut rng,
            )
            .unwrap();
            let gini = test.get("gini").unwrap();
            assert!((gini.observed - 0.8).abs() < 1e-12);
            assert!(gini.p_value < 0.05, "seed {}: p={}", seed, gini.p_value);
        }
    }

    #[test]
    fn identical_groups_are_not_significant() {
        for seed in [10, 20, 30] {
            let mut rng = StdRng::seed_from_u64(seed);
            let test = permutation_test(&[5, 5, 5, 5], &[5, 5, 5, 5], 500, &MetricSet::default(), &mut rng)
                .unwrap();
            for r in test.results() {
                assert!(r.observed.abs() < 1e-12, "{}", r.summary());
                assert!(r.p_value > 0.5, "{}", r.summary());
            }
        }
    }

    #[test]
    fn hill_reference_uses_both_groups() {
        let mut rng = StdRng::seed_from_u64(8);
        let metrics = MetricSet::from_flags(false, &[0.0]).unwrap();
        let test = permutation_test(&[4, 3, 2, 1], &[5, 5], 10, &metrics, &mut rng).unwrap();
        assert!((test.get("hill0").unwrap().observed - 2.0).abs() < 1e-12);
    }

    #[test]
    fn p_value_lower_bound_is_phipson_smyth() {
        let mut rng = StdRng::seed_from_u64(3);
        let test = permutation_test(&[10, 0, 0, 0, 0], &[2, 2, 2, 2, 2], 99, &gini_only(), &mut rng).unwrap();
        let gini = test.get("gini").unwrap();
        assert_eq!(gini.exceedances, 0);
        assert!((gini.p_value - 0.01).abs() < 1e-12);
        assert_eq!(gini.iterations, 99);
    }

    #[test]
    fn same_seed_is_reproducible() {
        let a = permutation_test(&[6, 3, 1], &[2, 2, 2, 4], 200, &MetricSet::default(), &mut StdRng::seed_from_u64(5))
            .unwrap();
        let b = permutation_test(&[6, 3, 1], &[2, 2, 2, 4], 200, &MetricSet::default(), &mut StdRng::seed_from_u64(5))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn p_value_variance_shrinks_with_iterations() {
        let metrics = MetricSet::from_flags(false, &[0.0]).unwrap();
        let spread = |iterations: usize| {
            let ps: Vec<f64> = (0..20u64)
                .map(|seed| {
                    let mut rng = StdRng::seed_from_u64(1000 + seed);
                    permutation_test(&[4, 3, 2, 1], &[5, 5], iterations, &metrics, &mut rng)
                        .unwrap()
                        .p_value("hill0")
                        .unwrap()
                })
                .collect();
            let mean = ps.iter().sum::<f64>() / ps.len() as f64;
            ps.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (ps.len() - 1) as f64
        };
        let coarse = spread(50);
        let fine = spread(2000);
        assert!(fine < coarse, "var(2000)={} var(50)={}", fine, coarse);
    }

    #[test]
    fn null_mean_tracks_accumulated_differences() {
        let metrics = MetricSet::from_flags(true, &[1.0]).unwrap();
        let mut acc = NullAccumulator::new(&metrics, vec![0.5, 2.0]).unwrap();
        acc.record(&[1.0, 3.0], &[0.2, 2.5]).unwrap();
        acc.record(&[0.1, 0.0], &[0.4, 3.0]).unwrap();
        assert_eq!(acc.iterations(), 2);
        // gaps: [0.8, 0.5] then [0.3, 3.0]
        let test = acc.finish();
        let gini = test.get("gini").unwrap();
        assert!((gini.null_mean - 0.55).abs() < 1e-12);
        assert_eq!(gini.exceedances, 1);
        assert!((gini.p_value - 2.0 / 3.0).abs() < 1e-12);
        let hill = test.get("hill1").unwrap();
        assert_eq!(hill.exceedances, 1);
    }

    #[test]
    fn ties_count_as_exceedances() {
        let mut acc = NullAccumulator::new(&gini_only(), vec![0.3]).unwrap();
        acc.record(&[0.1 + 0.2], &[0.0]).unwrap();
        assert_eq!(acc.p_values(), vec![1.0]);
    }

    #[test]
    fn accumulator_rejects_length_mismatch() {
        assert!(matches!(
            NullAccumulator::new(&MetricSet::default(), vec![0.5]),
            Err(RepdivError::InvalidInput(_))
        ));
        let mut acc = NullAccumulator::new(&gini_only(), vec![0.5]).unwrap();
        assert!(acc.record(&[0.1, 0.2], &[0.0]).is_err());
        assert!(acc.record(&[0.1], &[]).is_err());
        assert_eq!(acc.iterations(), 0);
        acc.record(&[0.9], &[0.1]).unwrap();
        let test = acc.finish();
        assert_eq!(test.names(), vec!["gini"]);
        assert_eq!(test.get("gini").unwrap().exceedances, 1);
    }

    #[test]
    fn identity_split_reproduces_observed_statistic() {
        let a = [5, 5];
        let b = [2, 2, 2, 2, 2];
        let metrics = MetricSet::default();
        let observed: Vec<f64> = metrics
            .evaluate(&a)
            .unwrap()
            .iter()
            .zip(metrics.evaluate(&b).unwrap())
            .map(|(x, y)| (x - y).abs())
            .collect();

        let pool = RunList::pooled(&a, &b);
        let identity: Vec<usize> = (0..10).collect();
        let (mut left, mut right) = (Vec::new(), Vec::new());
        pool.split_present_into(&identity, &mut left, &mut right);
        assert_eq!(left, a);
        assert_eq!(right, b);

        let permuted: Vec<f64> = metrics
            .evaluate(&left)
            .unwrap()
            .iter()
            .zip(metrics.evaluate(&right).unwrap())
            .map(|(x, y)| (x - y).abs())
            .collect();
        for (o, p) in observed.iter().zip(&permuted) {
            assert!((o - p).abs() < 1e-12, "observed {:?} permuted {:?}", observed, permuted);
        }
    }

    #[test]
    fn gini_null_rejection_rate_is_not_deflated() {
        // clonotype abundances 1..=20, 60 cells per sample
        let population: Vec<usize> = (1..=20).collect();
        let mut rng = StdRng::seed_from_u64(2024);
        let trials = 200;
        let rejections = (0..trials)
            .filter(|_| {
                let a = sample_population(&population, 60, &mut rng);
                let b = sample_population(&population, 60, &mut rng);
                let test = permutation_test(&a, &b, 199, &gini_only(), &mut rng).unwrap();
                test.p_value("gini").unwrap() <= 0.05
            })
            .count();
        assert!(
            (10..=60).contains(&rejections),
            "{} of {} same-population pairs rejected at 0.05",
            rejections,
            trials
        );
    }

    #[test]
    fn sorted_sample_is_a_subset() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut positions: Vec<usize> = (0..30).collect();
        let mut sample = Vec::new();
        for _ in 0..50 {
            draw_sorted_sample(&mut positions, 12, &mut sample, &mut rng);
            assert_eq!(sample.len(), 12);
            assert!(sample.windows(2).all(|w| w[0] < w[1]));
            assert!(sample.iter().all(|&i| i < 30));
            let mut check = positions.clone();
            check.sort_unstable();
            assert_eq!(check, (0..30).collect::<Vec<_>>());
        }
    }

    #[test]
    fn rejects_degenerate_input() {
        let mut rng = StdRng::seed_from_u64(0);
        let metrics = MetricSet::default();
        assert!(matches!(
            permutation_test(&[0, 0], &[1, 2], 10, &metrics, &mut rng),
            Err(RepdivError::InvalidInput(_))
        ));
        assert!(permutation_test(&[1, 2], &[], 10, &metrics, &mut rng).is_err());
        assert!(permutation_test(&[1, 2], &[3], 0, &metrics, &mut rng).is_err());
    }
}
