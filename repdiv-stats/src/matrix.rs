//! Pairwise p-value matrices.

use repdiv_core::{RepdivError, Result, Summarizable};

use crate::correction::{correct, CorrectionMethod};

/// Square matrix of pairwise p-values for one metric.
///
/// Rows and columns are labelled by group name in input order. Only the
/// lower triangle (`row > col`) is populated; the diagonal and the upper
/// triangle stay `None`, since each comparison is non-directional.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PValueMatrix {
    /// Metric key this matrix belongs to.
    metric: String,
    /// Group labels for both axes.
    labels: Vec<String>,
    /// Flat storage (row-major, n×n).
    data: Vec<Option<f64>>,
}

impl PValueMatrix {
    /// Empty (all-NA) matrix over `labels`.
    pub fn new(metric: impl Into<String>, labels: Vec<String>) -> Self {
        let n = labels.len();
        Self {
            metric: metric.into(),
            labels,
            data: vec![None; n * n],
        }
    }

    /// Store the p-value for the pair (`row`, `col`).
    ///
    /// # Errors
    ///
    /// Returns an error if the cell is outside the lower triangle.
    pub fn set(&mut self, row: usize, col: usize, p_value: f64) -> Result<()> {
        let n = self.n();
        if row >= n || col >= row {
            return Err(RepdivError::InvalidInput(format!(
                "cell ({}, {}) is not in the lower triangle of a {}x{} matrix",
                row, col, n, n
            )));
        }
        self.data[row * n + col] = Some(p_value);
        Ok(())
    }

    /// p-value for the pair (`row`, `col`), `None` for unpopulated cells.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.data[row * self.n() + col]
    }

    /// p-value between two groups by name, in either order.
    pub fn get_by_label(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == a)?;
        let j = self.labels.iter().position(|l| l == b)?;
        if i > j {
            self.get(i, j)
        } else {
            self.get(j, i)
        }
    }

    /// Number of groups.
    pub fn n(&self) -> usize {
        self.labels.len()
    }

    /// Metric key.
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Group labels.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Populated cells as `(row, col, p_value)`, row-major.
    pub fn populated(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let n = self.n();
        self.data
            .iter()
            .enumerate()
            .filter_map(move |(idx, v)| v.map(|p| (idx / n, idx % n, p)))
    }

    /// Adjust every populated cell together with `method`, in place.
    pub fn correct(&mut self, method: CorrectionMethod) -> Result<()> {
        let cells: Vec<(usize, f64)> = self
            .data
            .iter()
            .enumerate()
            .filter_map(|(idx, v)| v.map(|p| (idx, p)))
            .collect();
        let raw: Vec<f64> = cells.iter().map(|&(_, p)| p).collect();
        let adjusted = correct(&raw, method).map_err(|e| e.context(&self.metric))?;
        for (&(idx, _), adj) in cells.iter().zip(adjusted) {
            self.data[idx] = Some(adj);
        }
        Ok(())
    }
}

impl Summarizable for PValueMatrix {
    fn summary(&self) -> String {
        let n = self.n();
        let min = self
            .populated()
            .map(|(_, _, p)| p)
            .fold(f64::INFINITY, f64::min);
        if min.is_finite() {
            format!("PValueMatrix[{}]: {}x{}, min p={:.6}", self.metric, n, n, min)
        } else {
            format!("PValueMatrix[{}]: {}x{}", self.metric, n, n)
        }
    }
}

/// Corrected p-value matrices keyed by metric name, in metric-set order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PValueMatrices {
    matrices: Vec<PValueMatrix>,
}

impl PValueMatrices {
    pub(crate) fn new(matrices: Vec<PValueMatrix>) -> Self {
        Self { matrices }
    }

    /// Matrix for the metric keyed `name`.
    pub fn get(&self, name: &str) -> Option<&PValueMatrix> {
        self.matrices.iter().find(|m| m.metric == name)
    }

    /// Metric keys in order.
    pub fn names(&self) -> Vec<&str> {
        self.matrices.iter().map(|m| m.metric.as_str()).collect()
    }

    /// All matrices in order.
    pub fn iter(&self) -> impl Iterator<Item = &PValueMatrix> {
        self.matrices.iter()
    }

    /// Number of metrics.
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    /// Whether there are no matrices.
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

impl IntoIterator for PValueMatrices {
    type Item = PValueMatrix;
    type IntoIter = std::vec::IntoIter<PValueMatrix>;

    fn into_iter(self) -> Self::IntoIter {
        self.matrices.into_iter()
    }
}
