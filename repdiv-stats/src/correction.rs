//! Multiple testing correction.
//!
//! Every cell of a pairwise p-value matrix is its own hypothesis test, so
//! the populated cells of each matrix are adjusted together to control the
//! family-wise error rate or the false discovery rate.

use std::fmt;
use std::str::FromStr;

use repdiv_core::{RepdivError, Result};

/// Multiple testing correction method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CorrectionMethod {
    /// Bonferroni correction — controls family-wise error rate (FWER).
    Bonferroni,
    /// Holm step-down procedure — controls FWER, uniformly more powerful
    /// than Bonferroni.
    #[default]
    Holm,
    /// Hochberg step-up procedure — controls FWER under independence.
    Hochberg,
    /// Benjamini-Hochberg procedure — controls false discovery rate (FDR).
    BenjaminiHochberg,
    /// Benjamini-Yekutieli procedure — controls FDR under arbitrary dependence.
    BenjaminiYekutieli,
    /// No adjustment.
    None,
}

impl CorrectionMethod {
    /// Canonical short name, accepted back by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            CorrectionMethod::Bonferroni => "bonferroni",
            CorrectionMethod::Holm => "holm",
            CorrectionMethod::Hochberg => "hochberg",
            CorrectionMethod::BenjaminiHochberg => "BH",
            CorrectionMethod::BenjaminiYekutieli => "BY",
            CorrectionMethod::None => "none",
        }
    }
}

impl fmt::Display for CorrectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CorrectionMethod {
    type Err = RepdivError;

    /// Parse a method name, case-insensitively. `fdr` is an alias for BH.
    ///
    /// ```
    /// use repdiv_stats::correction::CorrectionMethod;
    ///
    /// assert_eq!("fdr".parse::<CorrectionMethod>().unwrap(), CorrectionMethod::BenjaminiHochberg);
    /// assert_eq!("Holm".parse::<CorrectionMethod>().unwrap(), CorrectionMethod::Holm);
    /// assert!("tukey".parse::<CorrectionMethod>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bonferroni" => Ok(CorrectionMethod::Bonferroni),
            "holm" => Ok(CorrectionMethod::Holm),
            "hochberg" => Ok(CorrectionMethod::Hochberg),
            "bh" | "fdr" => Ok(CorrectionMethod::BenjaminiHochberg),
            "by" => Ok(CorrectionMethod::BenjaminiYekutieli),
            "none" => Ok(CorrectionMethod::None),
            _ => Err(RepdivError::Configuration(format!(
                "unknown correction method '{}' (expected one of bonferroni, holm, hochberg, BH, fdr, BY, none)",
                s
            ))),
        }
    }
}

/// Apply a multiple testing correction to `p_values`.
///
/// Returns a new `Vec<f64>` of adjusted p-values in the same order as the
/// input.
pub fn correct(p_values: &[f64], method: CorrectionMethod) -> Result<Vec<f64>> {
    match method {
        CorrectionMethod::Bonferroni => bonferroni(p_values),
        CorrectionMethod::Holm => holm(p_values),
        CorrectionMethod::Hochberg => hochberg(p_values),
        CorrectionMethod::BenjaminiHochberg => benjamini_hochberg(p_values),
        CorrectionMethod::BenjaminiYekutieli => benjamini_yekutieli(p_values),
        CorrectionMethod::None => {
            validate_p_values(p_values)?;
            Ok(p_values.to_vec())
        }
    }
}

/// Bonferroni correction: `p_adj = min(p * n, 1.0)`.
pub fn bonferroni(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len() as f64;
    Ok(p_values.iter().map(|&p| (p * n).min(1.0)).collect())
}

/// Holm step-down procedure.
///
/// The i-th smallest p-value (1-based) is scaled by `n - i + 1`; a running
/// maximum from left to right keeps the adjusted values monotone.
pub fn holm(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();
    let indices = ascending_order(p_values);
    let mut adjusted = vec![0.0; n];

    let mut prev = 0.0f64;
    for (i, &idx) in indices.iter().enumerate() {
        let adj = (p_values[idx] * (n - i) as f64).min(1.0).max(prev);
        adjusted[idx] = adj;
        prev = adj;
    }
    Ok(adjusted)
}

/// Hochberg step-up procedure.
///
/// Same scaling as Holm, with a running minimum from right to left.
pub fn hochberg(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();
    let indices = ascending_order(p_values);
    let mut adjusted = vec![0.0; n];

    let mut prev = f64::INFINITY;
    for i in (0..n).rev() {
        let adj = (p_values[indices[i]] * (n - i) as f64).min(1.0).min(prev);
        adjusted[indices[i]] = adj;
        prev = adj;
    }
    Ok(adjusted)
}

/// Benjamini-Hochberg procedure for controlling the false discovery rate.
///
/// Sorts p-values, adjusts as `p * n / rank`, enforces monotonicity
/// from right to left, and clamps to [0, 1].
pub fn benjamini_hochberg(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    Ok(step_up_fdr(p_values, 1.0))
}

/// Benjamini-Yekutieli procedure: BH scaled by the harmonic sum `Σ 1/i`.
pub fn benjamini_yekutieli(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let harmonic: f64 = (1..=p_values.len()).map(|i| 1.0 / i as f64).sum();
    Ok(step_up_fdr(p_values, harmonic))
}

fn step_up_fdr(p_values: &[f64], scale: f64) -> Vec<f64> {
    let n = p_values.len();
    if n == 0 {
        return Vec::new();
    }
    let indices = ascending_order(p_values);
    let n_f = n as f64;
    let mut adjusted = vec![0.0; n];

    // Compute adjusted p-values and enforce monotonicity (right to left).
    let mut prev = f64::INFINITY;
    for i in (0..n).rev() {
        let rank = (i + 1) as f64;
        let adj = (p_values[indices[i]] * scale * n_f / rank).min(1.0);
        let adj = adj.min(prev);
        adjusted[indices[i]] = adj;
        prev = adj;
    }
    adjusted
}

fn ascending_order(p_values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..p_values.len()).collect();
    indices.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));
    indices
}

fn validate_p_values(p_values: &[f64]) -> Result<()> {
    for (i, &p) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(RepdivError::InvalidInput(format!(
                "p-value at index {} is out of range [0, 1]: {}",
                i, p,
            )));
        }
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────
