//! Curve aggregation
//!
//! Exceedance contributions of independent sources combine with the union
//! rule `1 - (1 - a) * (1 - b)`. The rule has 0 as identity and is
//! commutative and associative, so partial results can be folded in any
//! order.

use hazard_common::{Error, Result};

/// Probability that at least one of two independent events occurs
#[inline]
pub fn combine(current: f64, new: f64) -> f64 {
    1.0 - (1.0 - current) * (1.0 - new)
}

/// PoEs for one realization and one IMT, laid out site-major
#[derive(Debug, Clone, PartialEq)]
pub struct ExceedanceMatrix {
    num_sites: usize,
    num_levels: usize,
    poes: Vec<f64>,
}

impl ExceedanceMatrix {
    /// All-zero matrix
    pub fn zeros(num_sites: usize, num_levels: usize) -> Self {
        Self {
            num_sites,
            num_levels,
            poes: vec![0.0; num_sites * num_levels],
        }
    }

    /// Matrix from site-major PoEs
    pub fn from_poes(num_sites: usize, num_levels: usize, poes: Vec<f64>) -> Result<Self> {
        if poes.len() != num_sites * num_levels {
            return Err(Error::Internal(format!(
                "{} values do not fill a {}x{} matrix",
                poes.len(),
                num_sites,
                num_levels
            )));
        }
        Ok(Self {
            num_sites,
            num_levels,
            poes,
        })
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    pub fn get(&self, site: usize, level: usize) -> f64 {
        self.poes[site * self.num_levels + level]
    }

    /// PoEs of one site across levels
    pub fn row(&self, site: usize) -> &[f64] {
        let start = site * self.num_levels;
        &self.poes[start..start + self.num_levels]
    }

    pub fn is_zero(&self) -> bool {
        self.poes.iter().all(|&p| p == 0.0)
    }

    /// Fold one site's contribution into the matrix
    pub fn combine_site(&mut self, site: usize, poes: &[f64]) -> Result<()> {
        if site >= self.num_sites || poes.len() != self.num_levels {
            return Err(Error::Internal(format!(
                "contribution for site {} with {} levels does not fit a {}x{} matrix",
                site,
                poes.len(),
                self.num_sites,
                self.num_levels
            )));
        }
        let start = site * self.num_levels;
        for (cell, &poe) in self.poes[start..start + self.num_levels].iter_mut().zip(poes) {
            *cell = combine(*cell, poe);
        }
        Ok(())
    }

    /// Fold another matrix of the same shape into this one
    pub fn combine_with(&mut self, other: &ExceedanceMatrix) -> Result<()> {
        if self.num_sites != other.num_sites || self.num_levels != other.num_levels {
            return Err(Error::Internal(format!(
                "cannot combine {}x{} matrix with {}x{} matrix",
                self.num_sites, self.num_levels, other.num_sites, other.num_levels
            )));
        }
        for (cell, &poe) in self.poes.iter_mut().zip(&other.poes) {
            *cell = combine(*cell, poe);
        }
        Ok(())
    }
}

/// One exceedance matrix per IMT, in the configured IMT order
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityCurves {
    matrices: Vec<ExceedanceMatrix>,
}

impl ProbabilityCurves {
    /// Zero curves for `num_sites` sites and the given level counts per IMT
    pub fn zeros(num_sites: usize, levels_per_imt: &[usize]) -> Self {
        Self {
            matrices: levels_per_imt
                .iter()
                .map(|&levels| ExceedanceMatrix::zeros(num_sites, levels))
                .collect(),
        }
    }

    pub fn from_matrices(matrices: Vec<ExceedanceMatrix>) -> Self {
        Self { matrices }
    }

    pub fn matrix(&self, imt_index: usize) -> &ExceedanceMatrix {
        &self.matrices[imt_index]
    }

    pub fn matrix_mut(&mut self, imt_index: usize) -> &mut ExceedanceMatrix {
        &mut self.matrices[imt_index]
    }

    pub fn matrices(&self) -> &[ExceedanceMatrix] {
        &self.matrices
    }

    pub fn num_imts(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.matrices.iter().all(ExceedanceMatrix::is_zero)
    }

    pub fn combine_with(&mut self, other: &ProbabilityCurves) -> Result<()> {
        if self.matrices.len() != other.matrices.len() {
            return Err(Error::Internal(format!(
                "cannot combine curves for {} IMTs with curves for {} IMTs",
                self.matrices.len(),
                other.matrices.len()
            )));
        }
        for (mine, theirs) in self.matrices.iter_mut().zip(&other.matrices) {
            mine.combine_with(theirs)?;
        }
        Ok(())
    }
}
