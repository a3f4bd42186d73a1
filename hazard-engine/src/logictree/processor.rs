//! Logic tree processor
//!
//! Pairs the source model tree with the GSIM tree, checks them against the
//! loaded source models and GSIM registry, and turns them into realization
//! paths by full enumeration or by Monte Carlo sampling.

use super::{LogicTree, LogicTreeDefinition, TreeKind, UncertaintyType, UncertaintyValue};
use super::uncertainty::{apply_uncertainty, BranchSetFilter};
use crate::gsim::GsimRegistry;
use crate::source::{SeismicSource, SourceModel, SourceTypology};
use crate::warning::CalculationWarning;
use hazard_common::{Error, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// One (source model path, GSIM path) pair before it becomes a realization
#[derive(Debug, Clone, PartialEq)]
pub struct RealizationPath {
    pub source_model: String,
    pub sm_lt_path: Vec<String>,
    pub gsim_lt_path: Vec<String>,
    /// Product of branch weights; `None` when sampled
    pub weight: Option<f64>,
    /// Seed of the source model draw when sampled
    pub seed: Option<u64>,
}

/// Source-level uncertainty to apply, in path order
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUncertainty {
    pub branch_set_id: String,
    pub filter: Option<BranchSetFilter>,
    pub value: UncertaintyValue,
}

impl AppliedUncertainty {
    pub fn apply(&self, source: &SeismicSource) -> Result<SeismicSource> {
        apply_uncertainty(self.filter.as_ref(), &self.value, source)
    }
}

/// A resolved source model path
#[derive(Debug, Clone, PartialEq)]
pub struct SourceModelPath {
    pub source_model: String,
    pub uncertainties: Vec<AppliedUncertainty>,
}

impl SourceModelPath {
    /// Copies of `sources` with every uncertainty of the path applied
    pub fn apply(&self, sources: &[SeismicSource]) -> Result<Vec<SeismicSource>> {
        sources
            .iter()
            .map(|source| {
                let mut current = source.clone();
                for uncertainty in &self.uncertainties {
                    current = uncertainty.apply(&current)?;
                }
                Ok(current)
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct LogicTreeProcessor {
    source_model_tree: LogicTree,
    gsim_tree: LogicTree,
}

impl LogicTreeProcessor {
    /// Build both trees and cross-check them against the inputs
    pub fn new(
        source_model_definition: &LogicTreeDefinition,
        gsim_definition: &LogicTreeDefinition,
        source_models: &BTreeMap<String, SourceModel>,
        registry: &GsimRegistry,
    ) -> Result<Self> {
        let source_model_tree = LogicTree::build(source_model_definition, TreeKind::SourceModel)?;
        let gsim_tree = LogicTree::build(gsim_definition, TreeKind::Gsim)?;

        let processor = Self {
            source_model_tree,
            gsim_tree,
        };
        processor.validate(source_models, registry)?;
        debug!(
            source_model_paths = processor.source_model_tree.count_paths(),
            gsim_paths = processor.gsim_tree.count_paths(),
            "Logic trees built"
        );
        Ok(processor)
    }

    pub fn source_model_tree(&self) -> &LogicTree {
        &self.source_model_tree
    }

    pub fn gsim_tree(&self) -> &LogicTree {
        &self.gsim_tree
    }

    /// Number of distinct (source model path, GSIM path) pairs
    pub fn num_paths(&self) -> usize {
        self.source_model_tree
            .count_paths()
            .saturating_mul(self.gsim_tree.count_paths())
    }

    /// Lazy enumeration of every path pair with its product weight
    ///
    /// Restartable: every call walks both trees from the start.
    pub fn enumerate(&self) -> impl Iterator<Item = RealizationPath> + '_ {
        self.source_model_tree.paths().flat_map(move |sm_path| {
            let source_model = self.source_model_name(&sm_path.branch_ids);
            self.gsim_tree.paths().map(move |gsim_path| RealizationPath {
                source_model: source_model.clone(),
                sm_lt_path: sm_path.branch_ids.clone(),
                gsim_lt_path: gsim_path.branch_ids,
                weight: Some(sm_path.weight * gsim_path.weight),
                seed: None,
            })
        })
    }

    /// Draw `num_samples` path pairs with replacement
    ///
    /// A master generator seeded with `seed` yields, per realization, a
    /// source model seed then a GSIM seed; each path is drawn with its own
    /// generator so the list is reproducible. Sampling more paths than
    /// exist is allowed and reported as a warning.
    pub fn sample(
        &self,
        num_samples: usize,
        seed: u64,
    ) -> Result<(Vec<RealizationPath>, Option<CalculationWarning>)> {
        if num_samples == 0 {
            return Err(Error::config(
                "number_of_logic_tree_samples must be greater than zero",
            ));
        }

        let distinct_paths = self.num_paths();
        let warning = (num_samples > distinct_paths).then(|| {
            warn!(
                requested = num_samples,
                distinct_paths,
                "More logic tree samples requested than distinct paths"
            );
            CalculationWarning::TooManySamples {
                requested: num_samples,
                distinct_paths,
            }
        });

        let mut master = ChaCha8Rng::seed_from_u64(seed);
        let paths = (0..num_samples)
            .map(|_| {
                let sm_seed: u64 = master.gen();
                let gsim_seed: u64 = master.gen();
                let sm_lt_path = self
                    .source_model_tree
                    .sample_path(&mut ChaCha8Rng::seed_from_u64(sm_seed));
                let gsim_lt_path = self
                    .gsim_tree
                    .sample_path(&mut ChaCha8Rng::seed_from_u64(gsim_seed));
                RealizationPath {
                    source_model: self.source_model_name(&sm_lt_path),
                    sm_lt_path,
                    gsim_lt_path,
                    weight: None,
                    seed: Some(sm_seed),
                }
            })
            .collect();
        Ok((paths, warning))
    }

    /// Source model name and the source-level uncertainties along a path
    pub fn parse_source_model_path(&self, branch_ids: &[String]) -> Result<SourceModelPath> {
        let steps = self.source_model_tree.resolve_path(branch_ids)?;
        let mut source_model = None;
        let mut uncertainties = Vec::new();
        for (s, b) in steps {
            let branch_set = self.source_model_tree.branch_set(s);
            let branch = &branch_set.branches[b];
            match &branch.value {
                UncertaintyValue::SourceModel(name) => source_model = Some(name.clone()),
                value => uncertainties.push(AppliedUncertainty {
                    branch_set_id: branch_set.id.clone(),
                    filter: branch_set.filter.clone(),
                    value: value.clone(),
                }),
            }
        }
        let source_model = source_model
            .ok_or_else(|| Error::config(format!("path {:?} selects no source model", branch_ids)))?;
        Ok(SourceModelPath {
            source_model,
            uncertainties,
        })
    }

    /// Tectonic region type to GSIM name along a GSIM path
    pub fn parse_gsim_path(&self, branch_ids: &[String]) -> Result<BTreeMap<String, String>> {
        let mut mapping = BTreeMap::new();
        for (s, b) in self.gsim_tree.resolve_path(branch_ids)? {
            let branch_set = self.gsim_tree.branch_set(s);
            if let (
                Some(BranchSetFilter::ApplyToTectonicRegionType(trt)),
                UncertaintyValue::GmpeModel(gsim),
            ) = (&branch_set.filter, &branch_set.branches[b].value)
            {
                mapping.insert(trt.clone(), gsim.clone());
            }
        }
        Ok(mapping)
    }

    fn source_model_name(&self, sm_lt_path: &[String]) -> String {
        let root = self.source_model_tree.root();
        sm_lt_path
            .first()
            .and_then(|id| root.branch_index(id))
            .and_then(|b| match &root.branches[b].value {
                UncertaintyValue::SourceModel(name) => Some(name.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn validate(
        &self,
        source_models: &BTreeMap<String, SourceModel>,
        registry: &GsimRegistry,
    ) -> Result<()> {
        let mut source_ids = BTreeSet::new();
        let mut source_types: BTreeSet<SourceTypology> = BTreeSet::new();
        let mut regions = BTreeSet::new();

        for branch in &self.source_model_tree.root().branches {
            let UncertaintyValue::SourceModel(name) = &branch.value else {
                continue;
            };
            let model = source_models.get(name).ok_or_else(|| {
                Error::config(format!(
                    "branch {}: source model {:?} is not defined",
                    branch.id, name
                ))
            })?;
            model.check()?;
            for source in &model.sources {
                source_ids.insert(source.source_id.as_str());
                source_types.insert(source.typology);
                regions.insert(source.tectonic_region_type.as_str());
            }
        }

        for branch_set in self.source_model_tree.branch_sets() {
            match &branch_set.filter {
                Some(BranchSetFilter::ApplyToSources(ids)) => {
                    if let Some(missing) = ids.iter().find(|id| !source_ids.contains(id.as_str())) {
                        return Err(Error::config(format!(
                            "branch set {}: source with id {:?} is not defined in source models",
                            branch_set.id, missing
                        )));
                    }
                }
                Some(BranchSetFilter::ApplyToSourceType(typology)) => {
                    if !source_types.contains(typology) {
                        return Err(Error::config(format!(
                            "branch set {}: source models don't define sources of type {:?}",
                            branch_set.id,
                            typology.as_str()
                        )));
                    }
                }
                Some(BranchSetFilter::ApplyToTectonicRegionType(trt)) => {
                    if !regions.contains(trt.as_str()) {
                        return Err(Error::config(format!(
                            "branch set {}: source models don't define sources of tectonic \
                             region type {:?}",
                            branch_set.id, trt
                        )));
                    }
                }
                None => {}
            }
        }

        let mut covered = BTreeSet::new();
        for branch_set in self.gsim_tree.branch_sets() {
            debug_assert_eq!(branch_set.uncertainty_type, UncertaintyType::GmpeModel);
            if let Some(BranchSetFilter::ApplyToTectonicRegionType(trt)) = &branch_set.filter {
                if !regions.contains(trt.as_str()) {
                    return Err(Error::config(format!(
                        "branch set {}: source models don't define sources of tectonic region \
                         type {:?}",
                        branch_set.id, trt
                    )));
                }
                covered.insert(trt.as_str());
            }
            for branch in &branch_set.branches {
                if let UncertaintyValue::GmpeModel(name) = &branch.value {
                    if !registry.contains(name) {
                        return Err(Error::config(format!(
                            "branch {}: unknown GSIM {:?}; available: {:?}",
                            branch.id,
                            name,
                            registry.names()
                        )));
                    }
                }
            }
        }

        let missing: Vec<&str> = regions.difference(&covered).copied().collect();
        if !missing.is_empty() {
            return Err(Error::config(format!(
                "the following tectonic region types are defined in the source model logic tree \
                 but not in the GSIM logic tree: {:?}",
                missing
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gsim::{DistanceContext, Gsim, RuptureContext, SiteContext, StdDevType};
    use crate::logictree::{BranchSetDefinition, BranchingLevelDefinition};
    use crate::source::MagnitudeFrequencyDistribution;
    use hazard_common::geo::Point;
    use hazard_common::Imt;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Named(&'static str);

    impl Gsim for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn get_mean_and_stddevs(
            &self,
            _sctx: &SiteContext,
            _rctx: &RuptureContext,
            _dctx: &DistanceContext,
            _imt: &Imt,
            stddev_types: &[StdDevType],
        ) -> anyhow::Result<(f64, Vec<f64>)> {
            Ok((0.0, vec![0.5; stddev_types.len()]))
        }
    }

    const ASC: &str = "Active Shallow Crust";

    fn registry() -> GsimRegistry {
        GsimRegistry::new()
            .with(Arc::new(Named("ModelA")))
            .with(Arc::new(Named("ModelB")))
    }

    fn source_models() -> BTreeMap<String, SourceModel> {
        let source = |id: &str| SeismicSource {
            source_id: id.to_string(),
            name: String::new(),
            tectonic_region_type: ASC.to_string(),
            typology: SourceTypology::Area,
            locations: vec![Point::new(0.0, 0.0, 10.0)],
            rake: 0.0,
            mfd: MagnitudeFrequencyDistribution::TruncatedGr {
                min_mag: 5.0,
                max_mag: 7.0,
                bin_width: 0.1,
                a_val: 4.0,
                b_val: 1.0,
            },
        };
        let mut models = BTreeMap::new();
        models.insert(
            "sm1".to_string(),
            SourceModel {
                name: "sm1".into(),
                sources: vec![source("src1"), source("src2")],
            },
        );
        models.insert(
            "sm2".to_string(),
            SourceModel {
                name: "sm2".into(),
                sources: vec![source("src3")],
            },
        );
        models
    }

    fn sm_definition() -> LogicTreeDefinition {
        LogicTreeDefinition {
            branching_levels: vec![
                BranchingLevelDefinition {
                    id: "bl1".into(),
                    branch_sets: vec![BranchSetDefinition::new("bs1", "sourceModel")
                        .branch("b1", "sm1", 0.7)
                        .branch("b2", "sm2", 0.3)],
                },
                BranchingLevelDefinition {
                    id: "bl2".into(),
                    branch_sets: vec![BranchSetDefinition::new("bs2", "maxMagGRAbsolute")
                        .after(["b1"])
                        .for_sources(["src1"])
                        .branch("b3", "7.5", 0.5)
                        .branch("b4", "6.5", 0.5)],
                },
            ],
        }
    }

    fn gsim_definition() -> LogicTreeDefinition {
        LogicTreeDefinition::single_level(
            BranchSetDefinition::new("g1", "gmpeModel")
                .for_region(ASC)
                .branch("g1a", "ModelA", 0.6)
                .branch("g1b", "ModelB", 0.4),
        )
    }

    fn processor() -> LogicTreeProcessor {
        LogicTreeProcessor::new(&sm_definition(), &gsim_definition(), &source_models(), &registry())
            .unwrap()
    }

    #[test]
    fn test_enumeration_cross_product() {
        let processor = processor();
        let paths: Vec<_> = processor.enumerate().collect();
        assert_eq!(paths.len(), 6);
        assert_eq!(processor.num_paths(), 6);

        let total: f64 = paths.iter().map(|p| p.weight.unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-12);

        assert_eq!(paths[0].source_model, "sm1");
        assert_eq!(paths[0].sm_lt_path, vec!["b1", "b3"]);
        assert_eq!(paths[0].gsim_lt_path, vec!["g1a"]);
        assert!((paths[0].weight.unwrap() - 0.7 * 0.5 * 0.6).abs() < 1e-12);
        assert_eq!(paths[5].source_model, "sm2");
    }

    #[test]
    fn test_sampling_reproducible() {
        let processor = processor();
        let (first, warning) = processor.sample(10, 42).unwrap();
        let (second, _) = processor.sample(10, 42).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|p| p.weight.is_none() && p.seed.is_some()));
        assert_eq!(
            warning,
            Some(CalculationWarning::TooManySamples {
                requested: 10,
                distinct_paths: 6
            })
        );
    }

    #[test]
    fn test_zero_samples_rejected() {
        assert!(processor().sample(0, 42).unwrap_err().is_configuration());
    }

    #[test]
    fn test_parse_source_model_path() {
        let path = processor()
            .parse_source_model_path(&["b1".to_string(), "b4".to_string()])
            .unwrap();
        assert_eq!(path.source_model, "sm1");
        assert_eq!(path.uncertainties.len(), 1);
        assert_eq!(
            path.uncertainties[0].value,
            UncertaintyValue::MaxMagGrAbsolute(6.5)
        );

        let models = source_models();
        let modified = path.apply(&models["sm1"].sources).unwrap();
        match &modified[0].mfd {
            MagnitudeFrequencyDistribution::TruncatedGr { max_mag, .. } => assert_eq!(*max_mag, 6.5),
            _ => unreachable!(),
        }
        // src2 is not targeted by the filter
        assert_eq!(modified[1], models["sm1"].sources[1]);
    }

    #[test]
    fn test_parse_gsim_path() {
        let mapping = processor().parse_gsim_path(&["g1b".to_string()]).unwrap();
        assert_eq!(mapping.get(ASC).map(String::as_str), Some("ModelB"));
    }

    #[test]
    fn test_unknown_gsim_rejected() {
        let gsim = LogicTreeDefinition::single_level(
            BranchSetDefinition::new("g1", "gmpeModel")
                .for_region(ASC)
                .branch("g1a", "Nope", 1.0),
        );
        let err = LogicTreeProcessor::new(&sm_definition(), &gsim, &source_models(), &registry())
            .unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn test_missing_region_rejected() {
        let mut models = source_models();
        if let Some(model) = models.get_mut("sm2") {
            model.sources[0].tectonic_region_type = "Subduction Interface".into();
        }
        let err = LogicTreeProcessor::new(&sm_definition(), &gsim_definition(), &models, &registry())
            .unwrap_err();
        assert!(err.to_string().contains("Subduction Interface"));
    }

    #[test]
    fn test_filter_on_unknown_source_rejected() {
        let mut definition = sm_definition();
        definition.branching_levels[1].branch_sets[0].apply_to_sources = Some(vec!["ghost".into()]);
        assert!(LogicTreeProcessor::new(&definition, &gsim_definition(), &source_models(), &registry())
            .is_err());
    }

    #[test]
    fn test_unknown_source_model_rejected() {
        let models: BTreeMap<String, SourceModel> = source_models()
            .into_iter()
            .filter(|(name, _)| name != "sm2")
            .collect();
        assert!(LogicTreeProcessor::new(&sm_definition(), &gsim_definition(), &models, &registry())
            .is_err());
    }
}
