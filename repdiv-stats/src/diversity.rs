//! Diversity indices for clonotype count vectors.
//!
//! - **Inequality** — Gini coefficient over category counts
//! - **Effective diversity** — Hill numbers of arbitrary non-negative order
//! - **Entropy** — Shannon index (natural log)

use repdiv_core::{RepdivError, Result};

/// Gini coefficient of a count vector.
///
/// `G = 2 Σ i·x_(i) / (n Σ x) − (n + 1) / n`, with `x_(i)` sorted ascending
/// and `i` starting at 1. Every entry counts as a category, including
/// zero-count ones, so `[10, 0, 0, 0, 0]` scores 0.8 and a perfectly even
/// vector scores 0.
///
/// # Errors
///
/// Returns an error if `counts` is empty or the total is zero.
pub fn gini(counts: &[usize]) -> Result<f64> {
    validate_counts(counts)?;
    let mut sorted = counts.to_vec();
    sorted.sort_unstable();
    Ok(gini_sorted(&sorted))
}

/// Gini coefficient of an ascending, validated count vector.
pub(crate) fn gini_sorted(sorted: &[usize]) -> f64 {
    let n = sorted.len() as f64;
    let total: f64 = sorted.iter().sum::<usize>() as f64;
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, &x)| (i + 1) as f64 * x as f64)
        .sum();
    2.0 * weighted / (n * total) - (n + 1.0) / n
}

/// Shannon diversity index H = -Σ p_i ln(p_i).
///
/// Uses natural logarithm.
///
/// # Errors
///
/// Returns an error if `counts` is empty or total is zero.
pub fn shannon_index(counts: &[usize]) -> Result<f64> {
    validate_counts(counts)?;
    let n: f64 = counts.iter().sum::<usize>() as f64;
    let mut h = 0.0;
    for &c in counts {
        if c > 0 {
            let p = c as f64 / n;
            h -= p * p.ln();
        }
    }
    Ok(h)
}

/// Hill numbers (effective number of clonotypes) for a range of orders.
///
/// For each order `q`:
/// - q = 0: richness (number of non-zero categories)
/// - q = 1: exp(Shannon entropy)
/// - General: `(Σ p_i^q)^(1/(1-q))`, evaluated as `exp(ln(Σ p_i^q) / (1-q))`
///
/// Zero-count categories do not contribute. Hill numbers are monotone
/// non-increasing in q.
///
/// # Errors
///
/// Returns an error if `counts` is empty, all counts are zero, or an order
/// is negative or not finite.
pub fn hill_numbers(counts: &[usize], orders: &[f64]) -> Result<Vec<(f64, f64)>> {
    validate_counts(counts)?;
    validate_orders(orders)?;
    let n: f64 = counts.iter().sum::<usize>() as f64;
    let proportions: Vec<f64> = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| c as f64 / n)
        .collect();

    Ok(orders
        .iter()
        .map(|&q| (q, hill_from_proportions(&proportions, q)))
        .collect())
}

/// Hill number of order `q` from non-zero proportions.
pub(crate) fn hill_from_proportions(proportions: &[f64], q: f64) -> f64 {
    if q == 0.0 {
        proportions.len() as f64
    } else if (q - 1.0).abs() < 1e-12 {
        let h: f64 = proportions.iter().map(|&p| -p * p.ln()).sum();
        h.exp()
    } else {
        let sum_pq: f64 = proportions.iter().map(|&p| p.powf(q)).sum();
        (sum_pq.ln() / (1.0 - q)).exp()
    }
}

pub(crate) fn validate_orders(orders: &[f64]) -> Result<()> {
    for &q in orders {
        if !q.is_finite() || q < 0.0 {
            return Err(RepdivError::InvalidInput(format!(
                "Hill order must be a finite non-negative number, got {}",
                q
            )));
        }
    }
    Ok(())
}

fn validate_counts(counts: &[usize]) -> Result<()> {
    if counts.is_empty() {
        return Err(RepdivError::InvalidInput(
            "counts must be non-empty".into(),
        ));
    }
    let n: usize = counts.iter().sum();
    if n == 0 {
        return Err(RepdivError::InvalidInput(
            "total count must be greater than zero".into(),
        ));
    }
    Ok(())
}
