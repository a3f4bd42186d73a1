//! Ground shaking intensity models
//!
//! Individual GMPE formulas live outside the engine. The engine only needs
//! the natural-log mean and standard deviations of the ground motion for a
//! (site, rupture, distance) triple; exceedance probabilities are derived
//! here from the normal distribution of ln(IML).

use hazard_common::site::Site;
use hazard_common::{Error, Imt, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Site parameters seen by a ground-motion model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteContext {
    pub vs30: f64,
    pub vs30_measured: bool,
    pub z1pt0: Option<f64>,
    pub z2pt5: Option<f64>,
}

impl From<&Site> for SiteContext {
    fn from(site: &Site) -> Self {
        Self {
            vs30: site.vs30,
            vs30_measured: site.vs30_measured,
            z1pt0: site.z1pt0,
            z2pt5: site.z2pt5,
        }
    }
}

/// Rupture parameters seen by a ground-motion model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuptureContext {
    pub mag: f64,
    pub rake: f64,
    pub hypo_depth: f64,
}

/// Site-to-rupture distances in km
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceContext {
    /// Joyner-Boore distance (closest horizontal distance)
    pub rjb: f64,
    /// Closest distance to the rupture including depth
    pub rrup: f64,
    /// Epicentral distance
    pub repi: f64,
    /// Hypocentral distance
    pub rhypo: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdDevType {
    Total,
    InterEvent,
    IntraEvent,
}

/// A ground shaking intensity model
///
/// Implementations report failures through `anyhow`; the worker wraps them
/// into block computation errors.
pub trait Gsim: Send + Sync + fmt::Debug {
    /// Registry name
    fn name(&self) -> &str;

    /// Mean and requested standard deviations of ln(IMT)
    fn get_mean_and_stddevs(
        &self,
        sctx: &SiteContext,
        rctx: &RuptureContext,
        dctx: &DistanceContext,
        imt: &Imt,
        stddev_types: &[StdDevType],
    ) -> anyhow::Result<(f64, Vec<f64>)>;

    /// Probabilities of exceeding each of `imls`
    ///
    /// - `None`: untruncated normal
    /// - `Some(0.0)`: no variability, step function at the mean
    /// - `Some(t)`: normal truncated symmetrically at `t` standard deviations
    fn get_poes(
        &self,
        sctx: &SiteContext,
        rctx: &RuptureContext,
        dctx: &DistanceContext,
        imt: &Imt,
        imls: &[f64],
        truncation_level: Option<f64>,
    ) -> anyhow::Result<Vec<f64>> {
        if let Some(level) = truncation_level {
            anyhow::ensure!(level >= 0.0, "truncation level must be >= 0, got {}", level);
        }
        let (mean, stddevs) =
            self.get_mean_and_stddevs(sctx, rctx, dctx, imt, &[StdDevType::Total])?;
        let stddev = stddevs.first().copied().unwrap_or(0.0);
        anyhow::ensure!(
            mean.is_finite() && stddev.is_finite() && stddev >= 0.0,
            "{} returned invalid mean {} / stddev {}",
            self.name(),
            mean,
            stddev
        );
        Ok(poes_from_distribution(mean, stddev, imls, truncation_level))
    }
}

/// Exceedance probabilities of `imls` for a lognormal ground motion
pub fn poes_from_distribution(
    mean: f64,
    stddev: f64,
    imls: &[f64],
    truncation_level: Option<f64>,
) -> Vec<f64> {
    let step = |iml: f64| if iml.ln() < mean { 1.0 } else { 0.0 };

    if truncation_level == Some(0.0) || stddev == 0.0 {
        return imls.iter().map(|&iml| step(iml)).collect();
    }

    imls.iter()
        .map(|&iml| {
            let z = (iml.ln() - mean) / stddev;
            match truncation_level {
                None => 1.0 - normal_cdf(z),
                Some(t) => {
                    let lower = normal_cdf(-t);
                    let upper = normal_cdf(t);
                    let clipped = z.clamp(-t, t);
                    ((upper - normal_cdf(clipped)) / (upper - lower)).clamp(0.0, 1.0)
                }
            }
        })
        .collect()
}

/// Standard normal CDF
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Error function (Abramowitz and Stegun 7.1.26)
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// Named ground-motion models available to the GSIM logic tree
#[derive(Debug, Clone, Default)]
pub struct GsimRegistry {
    models: HashMap<String, Arc<dyn Gsim>>,
}

impl GsimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its own name, replacing any previous entry
    pub fn register(&mut self, gsim: Arc<dyn Gsim>) {
        self.models.insert(gsim.name().to_string(), gsim);
    }

    pub fn with(mut self, gsim: Arc<dyn Gsim>) -> Self {
        self.register(gsim);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Gsim>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| Error::config(format!("unknown GSIM {:?}", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Constant {
        mean: f64,
        stddev: f64,
    }

    impl Gsim for Constant {
        fn name(&self) -> &str {
            "Constant"
        }

        fn get_mean_and_stddevs(
            &self,
            _sctx: &SiteContext,
            _rctx: &RuptureContext,
            _dctx: &DistanceContext,
            _imt: &Imt,
            stddev_types: &[StdDevType],
        ) -> anyhow::Result<(f64, Vec<f64>)> {
            Ok((self.mean, vec![self.stddev; stddev_types.len()]))
        }
    }

    fn contexts() -> (SiteContext, RuptureContext, DistanceContext) {
        (
            SiteContext {
                vs30: 760.0,
                vs30_measured: false,
                z1pt0: None,
                z2pt5: None,
            },
            RuptureContext {
                mag: 6.0,
                rake: 0.0,
                hypo_depth: 10.0,
            },
            DistanceContext {
                rjb: 10.0,
                rrup: 14.0,
                repi: 10.0,
                rhypo: 14.0,
            },
        )
    }

    #[test]
    fn test_normal_cdf_reference_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.0) - 0.841344746).abs() < 1e-6);
        assert!((normal_cdf(-1.96) - 0.024997895).abs() < 1e-6);
    }

    #[test]
    fn test_poes_untruncated_at_mean_is_half() {
        let poes = poes_from_distribution(0.0, 0.5, &[1.0], None);
        assert!((poes[0] - 0.5).abs() < 1e-7);
    }

    #[test]
    fn test_poes_zero_truncation_is_step() {
        let mean = 0.1f64.ln();
        let poes = poes_from_distribution(mean, 0.6, &[0.05, 0.2], Some(0.0));
        assert_eq!(poes, vec![1.0, 0.0]);
    }

    #[test]
    fn test_truncated_poes_reach_bounds() {
        let poes = poes_from_distribution(0.0, 1.0, &[(-4.0f64).exp(), (4.0f64).exp()], Some(3.0));
        assert_eq!(poes, vec![1.0, 0.0]);
    }

    #[test]
    fn test_poes_non_increasing() {
        let gsim = Constant {
            mean: 0.2f64.ln(),
            stddev: 0.7,
        };
        let (s, r, d) = contexts();
        let imls = [0.01, 0.05, 0.1, 0.2, 0.5, 1.0];
        let poes = gsim.get_poes(&s, &r, &d, &Imt::Pga, &imls, Some(3.0)).unwrap();
        assert!(poes.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_negative_truncation_rejected() {
        let gsim = Constant {
            mean: 0.0,
            stddev: 1.0,
        };
        let (s, r, d) = contexts();
        assert!(gsim
            .get_poes(&s, &r, &d, &Imt::Pga, &[0.1], Some(-1.0))
            .is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = GsimRegistry::new().with(Arc::new(Constant {
            mean: 0.0,
            stddev: 1.0,
        }));
        assert!(registry.contains("Constant"));
        assert_eq!(registry.get("Constant").unwrap().name(), "Constant");
        assert!(registry.get("Missing").unwrap_err().is_configuration());
    }
}
