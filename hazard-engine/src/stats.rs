//! Statistics across realizations
//!
//! Mean and quantile curves are computed independently for every
//! (IMT, site, level) cell from the realization curves and their
//! normalized weights.

use crate::calc::aggregator::{ExceedanceMatrix, ProbabilityCurves};
use hazard_common::{Error, Result};

/// Weighted mean of `values`
///
/// Weights are normalized. Computed as an offset from the first value so
/// that identical inputs return that value exactly.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };
    let total: f64 = weights.iter().sum();
    let offset: f64 = values
        .iter()
        .zip(weights)
        .map(|(&v, &w)| (w / total) * (v - first))
        .sum();
    first + offset
}

/// Quantile `q` of the weighted empirical distribution of `values`
///
/// Values are sorted, their normalized weights accumulated, and `q` is
/// linearly interpolated against the cumulative weights. Below the first
/// cumulative weight the smallest value is returned, above the last the
/// largest.
pub fn weighted_quantile(values: &[f64], weights: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut pairs: Vec<(f64, f64)> = values.iter().copied().zip(weights.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    let mut cumulative = Vec::with_capacity(pairs.len());
    let mut acc = 0.0;
    for (_, w) in &pairs {
        acc += w / total;
        cumulative.push(acc);
    }

    let last = pairs.len() - 1;
    if q <= cumulative[0] {
        return pairs[0].0;
    }
    if q >= cumulative[last] {
        return pairs[last].0;
    }
    // cumulative[i] < q < cumulative[i + 1] for some i
    let i = cumulative.partition_point(|&c| c <= q) - 1;
    let (x0, x1) = (cumulative[i], cumulative[i + 1]);
    let (y0, y1) = (pairs[i].0, pairs[i + 1].0);
    if x1 == x0 {
        return y1;
    }
    y0 + (q - x0) * (y1 - y0) / (x1 - x0)
}

/// Mean curves of `curves` with per-realization `weights`
pub fn compute_mean(curves: &[&ProbabilityCurves], weights: &[f64]) -> Result<ProbabilityCurves> {
    reduce_cells(curves, weights, weighted_mean)
}

/// Quantile curves at `q` of `curves` with per-realization `weights`
pub fn compute_quantile(
    curves: &[&ProbabilityCurves],
    weights: &[f64],
    q: f64,
) -> Result<ProbabilityCurves> {
    if !(0.0..=1.0).contains(&q) {
        return Err(Error::InvalidInput(format!("quantile {} outside [0, 1]", q)));
    }
    reduce_cells(curves, weights, |values, weights| {
        weighted_quantile(values, weights, q)
    })
}

fn reduce_cells<F>(curves: &[&ProbabilityCurves], weights: &[f64], f: F) -> Result<ProbabilityCurves>
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    let first = curves
        .first()
        .ok_or_else(|| Error::InvalidInput("no realization curves to summarize".to_string()))?;
    if weights.len() != curves.len() {
        return Err(Error::InvalidInput(format!(
            "{} weights for {} realizations",
            weights.len(),
            curves.len()
        )));
    }
    if weights.iter().any(|w| !(*w >= 0.0)) || weights.iter().sum::<f64>() <= 0.0 {
        return Err(Error::InvalidInput(
            "realization weights must be non-negative with a positive sum".to_string(),
        ));
    }

    let mut matrices = Vec::with_capacity(first.num_imts());
    let mut column = vec![0.0; curves.len()];
    for imt_index in 0..first.num_imts() {
        let shape = first.matrix(imt_index);
        let (num_sites, num_levels) = (shape.num_sites(), shape.num_levels());
        for curve in curves {
            if curve.num_imts() != first.num_imts()
                || curve.matrix(imt_index).num_sites() != num_sites
                || curve.matrix(imt_index).num_levels() != num_levels
            {
                return Err(Error::InvalidInput(
                    "realization curves have mismatched shapes".to_string(),
                ));
            }
        }

        let mut poes = Vec::with_capacity(num_sites * num_levels);
        for site in 0..num_sites {
            for level in 0..num_levels {
                for (slot, curve) in column.iter_mut().zip(curves) {
                    *slot = curve.matrix(imt_index).get(site, level);
                }
                poes.push(f(&column, weights));
            }
        }
        matrices.push(ExceedanceMatrix::from_poes(num_sites, num_levels, poes)?);
    }
    Ok(ProbabilityCurves::from_matrices(matrices))
}
