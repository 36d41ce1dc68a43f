//! Requested diversity metrics.
//!
//! A [`MetricSet`] names which statistics a permutation test recomputes on
//! every repartition: the Gini index and any number of Hill-number orders.

use std::fmt;

use repdiv_core::{RepdivError, Result};

use crate::diversity::{gini_sorted, hill_from_proportions, validate_orders};

/// One diversity statistic.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Metric {
    /// Gini inequality index, reported as `"gini"`.
    Gini,
    /// Hill number of the given order, reported as `"hill<q>"`.
    Hill(f64),
}

impl Metric {
    /// Result key for this metric (`"gini"`, `"hill0"`, `"hill0.5"`, ...).
    pub fn name(&self) -> String {
        match self {
            Metric::Gini => "gini".to_string(),
            Metric::Hill(q) => format!("hill{}", q),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Ordered, non-empty set of metrics to test.
///
/// The default is Gini plus Hill orders 0, 1 and 2. With the `serde`
/// feature a set (de)serialises as a plain list of metrics and is validated
/// by [`MetricSet::new`] on load.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<Metric>", into = "Vec<Metric>"))]
pub struct MetricSet {
    metrics: Vec<Metric>,
}

impl Default for MetricSet {
    fn default() -> Self {
        Self {
            metrics: vec![
                Metric::Gini,
                Metric::Hill(0.0),
                Metric::Hill(1.0),
                Metric::Hill(2.0),
            ],
        }
    }
}

impl MetricSet {
    /// Build a set from explicit metrics.
    ///
    /// # Errors
    ///
    /// Returns an error if `metrics` is empty, a Hill order is negative or
    /// not finite, or two metrics share a name. An order of `-0.0` is
    /// stored as `0.0`.
    pub fn new(metrics: Vec<Metric>) -> Result<Self> {
        let metrics: Vec<Metric> = metrics
            .into_iter()
            .map(|m| match m {
                Metric::Hill(q) if q == 0.0 => Metric::Hill(0.0),
                other => other,
            })
            .collect();
        if metrics.is_empty() {
            return Err(RepdivError::InvalidInput(
                "at least one diversity metric must be requested".into(),
            ));
        }
        let orders: Vec<f64> = metrics
            .iter()
            .filter_map(|m| match m {
                Metric::Hill(q) => Some(*q),
                Metric::Gini => None,
            })
            .collect();
        validate_orders(&orders)?;

        let names: Vec<String> = metrics.iter().map(Metric::name).collect();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(RepdivError::InvalidInput(format!(
                    "metric '{}' requested more than once",
                    name
                )));
            }
        }
        Ok(Self { metrics })
    }

    /// Build a set from a Gini toggle and a list of Hill orders.
    ///
    /// ```
    /// use repdiv_stats::metric::MetricSet;
    ///
    /// let set = MetricSet::from_flags(true, &[0.0, 2.0]).unwrap();
    /// assert_eq!(set.names(), vec!["gini", "hill0", "hill2"]);
    /// assert!(MetricSet::from_flags(false, &[]).is_err());
    /// ```
    pub fn from_flags(gini: bool, hill_orders: &[f64]) -> Result<Self> {
        let mut metrics = Vec::with_capacity(hill_orders.len() + 1);
        if gini {
            metrics.push(Metric::Gini);
        }
        metrics.extend(hill_orders.iter().map(|&q| Metric::Hill(q)));
        Self::new(metrics)
    }

    /// Metrics in evaluation order.
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Result keys in evaluation order.
    pub fn names(&self) -> Vec<String> {
        self.metrics.iter().map(Metric::name).collect()
    }

    /// Number of metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Always `false` for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Evaluate every metric on one count vector, writing into `out`.
    ///
    /// `scratch` is reused between calls to avoid reallocating in the
    /// permutation loop.
    ///
    /// # Errors
    ///
    /// Returns an error if `counts` has no categories or sums to zero.
    pub fn evaluate_into(
        &self,
        counts: &[usize],
        scratch: &mut EvalScratch,
        out: &mut Vec<f64>,
    ) -> Result<()> {
        let total: usize = counts.iter().sum();
        if counts.is_empty() || total == 0 {
            return Err(RepdivError::InvalidInput(
                "cannot evaluate diversity of an empty group".into(),
            ));
        }

        out.clear();
        scratch.proportions.clear();
        let n = total as f64;
        scratch
            .proportions
            .extend(counts.iter().filter(|&&c| c > 0).map(|&c| c as f64 / n));

        for metric in &self.metrics {
            let value = match *metric {
                Metric::Gini => {
                    scratch.sorted.clear();
                    scratch.sorted.extend_from_slice(counts);
                    scratch.sorted.sort_unstable();
                    gini_sorted(&scratch.sorted)
                }
                Metric::Hill(q) => hill_from_proportions(&scratch.proportions, q),
            };
            out.push(value);
        }
        Ok(())
    }

    /// Evaluate every metric on one count vector.
    pub fn evaluate(&self, counts: &[usize]) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.metrics.len());
        self.evaluate_into(counts, &mut EvalScratch::default(), &mut out)?;
        Ok(out)
    }
}

impl TryFrom<Vec<Metric>> for MetricSet {
    type Error = RepdivError;

    fn try_from(metrics: Vec<Metric>) -> Result<Self> {
        Self::new(metrics)
    }
}

impl From<MetricSet> for Vec<Metric> {
    fn from(set: MetricSet) -> Self {
        set.metrics
    }
}

/// Reusable buffers for [`MetricSet::evaluate_into`].
#[derive(Debug, Default)]
pub struct EvalScratch {
    sorted: Vec<usize>,
    proportions: Vec<f64>,
}
