//! Classical PSHA worker
//!
//! Work is planned per realization: the realization's collected sources
//! are cut into blocks (point sources first, with their own block size)
//! and every block yields the realization's exceedance curves restricted
//! to the sources it holds.

use super::aggregator::ProbabilityCurves;
use super::task_manager::BlockId;
use crate::gsim::{Gsim, SiteContext};
use crate::source::CollectedSource;
use hazard_common::config::TaskConfig;
use hazard_common::site::SiteCollection;
use hazard_common::{Error, Imt, Result};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

/// Collected sources of one realization, split by block size class
#[derive(Debug, Clone)]
pub struct RealizationSources {
    pub realization: usize,
    point_sources: Arc<[CollectedSource]>,
    other_sources: Arc<[CollectedSource]>,
}

impl RealizationSources {
    pub fn new(realization: usize, sources: Vec<CollectedSource>) -> Self {
        let (point, other): (Vec<_>, Vec<_>) =
            sources.into_iter().partition(|s| s.typology.is_point());
        Self {
            realization,
            point_sources: point.into(),
            other_sources: other.into(),
        }
    }

    /// The same sources planned under another realization ordinal.
    ///
    /// The source arrays are shared, not copied.
    pub fn for_realization(&self, realization: usize) -> Self {
        Self {
            realization,
            point_sources: Arc::clone(&self.point_sources),
            other_sources: Arc::clone(&self.other_sources),
        }
    }

    pub fn num_sources(&self) -> usize {
        self.point_sources.len() + self.other_sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_sources() == 0
    }
}

/// A contiguous run of sources from one realization
#[derive(Debug, Clone)]
pub struct SourceBlock {
    pub realization: usize,
    sources: Arc<[CollectedSource]>,
    range: Range<usize>,
}

impl SourceBlock {
    pub fn sources(&self) -> &[CollectedSource] {
        &self.sources[self.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Block layout for the map phase
#[derive(Debug, Clone)]
pub struct TaskPlan {
    realizations: Vec<RealizationSources>,
    block_size: usize,
    point_source_block_size: usize,
}

impl TaskPlan {
    pub fn new(realizations: Vec<RealizationSources>, config: &TaskConfig) -> Self {
        Self {
            realizations,
            block_size: config.block_size.max(1),
            point_source_block_size: config.point_source_block_size.max(1),
        }
    }

    pub fn realizations(&self) -> &[RealizationSources] {
        &self.realizations
    }

    /// Total number of blocks `task_arg_gen` yields
    pub fn num_tasks(&self) -> usize {
        self.realizations
            .iter()
            .map(|r| {
                r.other_sources.len().div_ceil(self.block_size)
                    + r.point_sources.len().div_ceil(self.point_source_block_size)
            })
            .sum()
    }

    /// Lazy sequence of block arguments, realization by realization
    ///
    /// Each call starts over from the first realization.
    pub fn task_arg_gen(&self) -> impl Iterator<Item = (BlockId, SourceBlock)> + '_ {
        self.realizations.iter().flat_map(move |rlz| {
            let points = blocks(rlz.realization, &rlz.point_sources, self.point_source_block_size);
            let others = blocks(rlz.realization, &rlz.other_sources, self.block_size);
            points
                .chain(others)
                .enumerate()
                .map(move |(index, block)| {
                    (
                        BlockId {
                            realization: rlz.realization,
                            index,
                        },
                        block,
                    )
                })
        })
    }
}

fn blocks(
    realization: usize,
    sources: &Arc<[CollectedSource]>,
    size: usize,
) -> impl Iterator<Item = SourceBlock> + '_ {
    (0..sources.len()).step_by(size).map(move |start| SourceBlock {
        realization,
        sources: Arc::clone(sources),
        range: start..(start + size).min(sources.len()),
    })
}

/// GSIM assigned to each tectonic region type for one realization
pub type GsimAssignment = BTreeMap<String, Arc<dyn Gsim>>;

/// Computes per-block exceedance curves
#[derive(Debug, Clone)]
pub struct ClassicalWorker {
    sites: Arc<SiteCollection>,
    imtls: Arc<Vec<(Imt, Vec<f64>)>>,
    /// Indexed by realization ordinal
    gsims: Arc<Vec<GsimAssignment>>,
    truncation_level: Option<f64>,
    investigation_time: f64,
    max_distance: f64,
}

impl ClassicalWorker {
    pub fn new(
        sites: Arc<SiteCollection>,
        imtls: Arc<Vec<(Imt, Vec<f64>)>>,
        gsims: Arc<Vec<GsimAssignment>>,
        truncation_level: Option<f64>,
        investigation_time: f64,
        max_distance: f64,
    ) -> Self {
        Self {
            sites,
            imtls,
            gsims,
            truncation_level,
            investigation_time,
            max_distance,
        }
    }

    pub fn levels_per_imt(&self) -> Vec<usize> {
        self.imtls.iter().map(|(_, levels)| levels.len()).collect()
    }

    /// Exceedance curves of one block
    pub fn compute(&self, block: &SourceBlock) -> Result<ProbabilityCurves> {
        let mut curves = ProbabilityCurves::zeros(self.sites.len(), &self.levels_per_imt());
        let assignment = self.gsims.get(block.realization).ok_or_else(|| {
            Error::Internal(format!("no GSIM assignment for realization {}", block.realization))
        })?;
        for source in block.sources() {
            self.compute_source(source, assignment, &mut curves)?;
        }
        Ok(curves)
    }

    /// Fold the contribution of one source into `curves`
    ///
    /// Per site and level the source PoE is `1 - exp(-T * sum(rate * poe))`
    /// over the ruptures within the integration distance (Poisson).
    fn compute_source(
        &self,
        source: &CollectedSource,
        assignment: &GsimAssignment,
        curves: &mut ProbabilityCurves,
    ) -> Result<()> {
        let gsim = assignment.get(&source.tectonic_region_type).ok_or_else(|| {
            Error::Gsim(format!(
                "no GSIM assigned to tectonic region type {:?}",
                source.tectonic_region_type
            ))
        })?;

        for &site_index in &source.site_indices {
            let site = self.sites.get(site_index).ok_or_else(|| {
                Error::Internal(format!("site index {} out of range", site_index))
            })?;
            let sctx = SiteContext::from(site);

            for (imt_index, (imt, levels)) in self.imtls.iter().enumerate() {
                let mut rate_of_exceedance = vec![0.0; levels.len()];
                for rupture in &source.ruptures {
                    if rupture.min_distance(&site.location) > self.max_distance {
                        continue;
                    }
                    let rctx = rupture.context();
                    let dctx = rupture.distances_to(&site.location);
                    let poes = gsim
                        .get_poes(&sctx, &rctx, &dctx, imt, levels, self.truncation_level)
                        .map_err(|e| {
                            Error::Gsim(format!(
                                "{} failed for source {} at site {}: {:#}",
                                gsim.name(),
                                source.source_id,
                                site_index,
                                e
                            ))
                        })?;
                    for (acc, poe) in rate_of_exceedance.iter_mut().zip(poes) {
                        *acc += rupture.occurrence_rate * poe;
                    }
                }
                let source_poes: Vec<f64> = rate_of_exceedance
                    .into_iter()
                    .map(|rate| 1.0 - (-rate * self.investigation_time).exp())
                    .collect();
                curves.matrix_mut(imt_index).combine_site(site_index, &source_poes)?;
            }
        }
        Ok(())
    }
}
