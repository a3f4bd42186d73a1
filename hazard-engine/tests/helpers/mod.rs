//! Shared fixtures for hazard-engine integration tests
//!
//! A small synthetic region: two sites near the origin, one source model
//! with an area, a point and a fault source, and toy ground-motion models.

#![allow(dead_code)]

use hazard_common::config::CalculationConfig;
use hazard_common::geo::Point;
use hazard_common::site::{Site, SiteCollection};
use hazard_common::Imt;
use hazard_engine::gsim::{DistanceContext, Gsim, GsimRegistry, RuptureContext, SiteContext, StdDevType};
use hazard_engine::logictree::{BranchSetDefinition, BranchingLevelDefinition, LogicTreeDefinition};
use hazard_engine::source::{MagnitudeFrequencyDistribution, SeismicSource, SourceModel, SourceTypology};
use hazard_engine::CalculationContext;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const ASC: &str = "Active Shallow Crust";

/// Attenuation with magnitude and distance; `offset` shifts the ln mean
#[derive(Debug)]
pub struct ToyGsim {
    pub name: &'static str,
    pub offset: f64,
}

impl Gsim for ToyGsim {
    fn name(&self) -> &str {
        self.name
    }

    fn get_mean_and_stddevs(
        &self,
        _sctx: &SiteContext,
        rctx: &RuptureContext,
        dctx: &DistanceContext,
        imt: &Imt,
        stddev_types: &[StdDevType],
    ) -> anyhow::Result<(f64, Vec<f64>)> {
        let period_term = 0.5 * imt.spectral_period().unwrap_or(0.0);
        let mean = -1.5 + self.offset + 1.1 * (rctx.mag - 6.0)
            - 1.2 * ((dctx.rrup + 10.0) / 10.0).ln()
            + period_term;
        Ok((mean, vec![0.6; stddev_types.len()]))
    }
}

/// Always fails, as a model missing coefficients would
#[derive(Debug)]
pub struct BrokenGsim;

impl Gsim for BrokenGsim {
    fn name(&self) -> &str {
        "Broken"
    }

    fn get_mean_and_stddevs(
        &self,
        _sctx: &SiteContext,
        _rctx: &RuptureContext,
        _dctx: &DistanceContext,
        imt: &Imt,
        _stddev_types: &[StdDevType],
    ) -> anyhow::Result<(f64, Vec<f64>)> {
        anyhow::bail!("no coefficients for {}", imt)
    }
}

pub fn registry() -> GsimRegistry {
    GsimRegistry::new()
        .with(Arc::new(ToyGsim {
            name: "ToyA",
            offset: 0.0,
        }))
        .with(Arc::new(ToyGsim {
            name: "ToyB",
            offset: 0.3,
        }))
        .with(Arc::new(ToyGsim {
            name: "ToyTwin",
            offset: 0.0,
        }))
        .with(Arc::new(BrokenGsim))
}

pub fn sites_near_origin() -> SiteCollection {
    SiteCollection::new(vec![
        Site::new(Point::surface(0.0, 0.0), 760.0),
        Site::new(Point::surface(0.3, 0.1), 400.0),
    ])
    .unwrap()
}

pub fn far_away_sites() -> SiteCollection {
    SiteCollection::new(vec![Site::new(Point::surface(60.0, 30.0), 760.0)]).unwrap()
}

fn gr(a_val: f64, max_mag: f64) -> MagnitudeFrequencyDistribution {
    MagnitudeFrequencyDistribution::TruncatedGr {
        min_mag: 5.0,
        max_mag,
        bin_width: 0.5,
        a_val,
        b_val: 1.0,
    }
}

pub fn source_model() -> SourceModel {
    SourceModel {
        name: "sm1".to_string(),
        sources: vec![
            SeismicSource {
                source_id: "area-1".to_string(),
                name: "Background zone".to_string(),
                tectonic_region_type: ASC.to_string(),
                typology: SourceTypology::Area,
                locations: vec![
                    Point::new(0.0, 0.1, 10.0),
                    Point::new(0.1, 0.1, 10.0),
                    Point::new(0.2, 0.1, 10.0),
                ],
                rake: 0.0,
                mfd: gr(2.5, 6.5),
            },
            SeismicSource {
                source_id: "point-1".to_string(),
                name: String::new(),
                tectonic_region_type: ASC.to_string(),
                typology: SourceTypology::Point,
                locations: vec![Point::new(0.2, 0.0, 5.0)],
                rake: 90.0,
                mfd: gr(2.0, 6.0),
            },
            SeismicSource {
                source_id: "fault-1".to_string(),
                name: "Main fault".to_string(),
                tectonic_region_type: ASC.to_string(),
                typology: SourceTypology::SimpleFault,
                locations: vec![
                    Point::new(-0.2, -0.1, 2.0),
                    Point::new(0.0, -0.1, 8.0),
                    Point::new(0.2, -0.1, 14.0),
                ],
                rake: -90.0,
                mfd: MagnitudeFrequencyDistribution::EvenlyDiscretized {
                    min_mag: 6.5,
                    bin_width: 0.5,
                    occurrence_rates: vec![0.002, 0.001],
                },
            },
        ],
    }
}

/// Source model tree: one model, then a b-value uncertainty on every source
pub fn source_model_tree() -> LogicTreeDefinition {
    LogicTreeDefinition {
        branching_levels: vec![
            BranchingLevelDefinition {
                id: "bl1".into(),
                branch_sets: vec![BranchSetDefinition::new("bs1", "sourceModel").branch("b1", "sm1", 1.0)],
            },
            BranchingLevelDefinition {
                id: "bl2".into(),
                branch_sets: vec![BranchSetDefinition::new("bs2", "bGRRelative")
                    .branch("b2", "0.1", 0.5)
                    .branch("b3", "-0.1", 0.5)],
            },
        ],
    }
}

pub fn single_model_tree() -> LogicTreeDefinition {
    LogicTreeDefinition::single_level(BranchSetDefinition::new("bs1", "sourceModel").branch("b1", "sm1", 1.0))
}

pub fn gsim_tree(branches: &[(&str, &str, f64)]) -> LogicTreeDefinition {
    let mut branch_set = BranchSetDefinition::new("gs1", "gmpeModel").for_region(ASC);
    for (id, gsim, weight) in branches {
        branch_set = branch_set.branch(*id, *gsim, *weight);
    }
    LogicTreeDefinition::single_level(branch_set)
}

pub fn config() -> CalculationConfig {
    let mut imtls = BTreeMap::new();
    imtls.insert("PGA".to_string(), vec![0.005, 0.01, 0.05, 0.1, 0.3, 0.6]);
    imtls.insert("SA(0.2)".to_string(), vec![0.005, 0.01, 0.05, 0.1, 0.3, 0.6]);

    let mut config = CalculationConfig {
        description: "toy region".to_string(),
        intensity_measure_types_and_levels: imtls,
        quantile_hazard_curves: vec![0.15, 0.85],
        poes: vec![0.1, 0.02],
        uniform_hazard_spectra: true,
        ..CalculationConfig::default()
    };
    config.tasks.block_size = 1;
    config.tasks.point_source_block_size = 1;
    config.tasks.concurrent_tasks = 2;
    config.tasks.rupture_split_threshold = 2;
    config
}

pub fn context(
    config: CalculationConfig,
    sites: SiteCollection,
    sm_tree: LogicTreeDefinition,
    gsim_tree: LogicTreeDefinition,
) -> CalculationContext {
    CalculationContext::new(config, sites, vec![source_model()], sm_tree, gsim_tree, registry()).unwrap()
}

/// True when every curve value lies in [0, 1] and never increases with IML
pub fn is_valid_curve(poes: &[f64]) -> bool {
    poes.iter().all(|p| (0.0..=1.0).contains(p)) && poes.windows(2).all(|w| w[1] <= w[0] + 1e-12)
}
