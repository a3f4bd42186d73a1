//! Classical hazard calculator
//!
//! Runs a calculation in three phases:
//! - **pre-execute**: validate configuration and resolve the logic trees
//!   into realizations
//! - **execute**: collect the sources of every realization, cut them into
//!   blocks and map-reduce the blocks into one set of curves per realization
//! - **post-execute**: finalize hazard curves, compute statistics across
//!   realizations, then hazard maps and uniform hazard spectra
//!
//! Progress is reported on the context's event bus. A failure in any phase
//! emits `CalculationFailed` and no outputs are returned.

use super::aggregator::ProbabilityCurves;
use super::classical::{ClassicalWorker, GsimAssignment, RealizationSources, SourceBlock, TaskPlan};
use super::task_manager::TaskManager;
use crate::context::CalculationContext;
use crate::logictree::LogicTreeProcessor;
use crate::outputs::{CurveKind, HazardCurve, HazardMap, UniformHazardSpectrum};
use crate::post_processing::{compute_hazard_maps, make_uhs};
use crate::realization::{initialize_realizations, normalized_weights, Realization};
use crate::source::{CollectedSource, SourceCollector};
use crate::stats::{compute_mean, compute_quantile};
use crate::warning::CalculationWarning;
use chrono::Utc;
use hazard_common::events::CalculationEvent;
use hazard_common::site::SiteCollection;
use hazard_common::{Error, Imt, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Everything a finished calculation produced
#[derive(Debug, Clone, Serialize)]
pub struct CalculationOutput {
    pub calculation_id: Uuid,
    pub realizations: Vec<Realization>,
    /// Realization curves first, then mean, then quantiles
    pub curves: Vec<HazardCurve>,
    pub maps: Vec<HazardMap>,
    pub uhs: Vec<UniformHazardSpectrum>,
    pub warnings: Vec<CalculationWarning>,
}

impl CalculationOutput {
    /// Curves of one kind and IMT, in site order
    pub fn curves_of(&self, kind: CurveKind, imt: Imt) -> Vec<&HazardCurve> {
        self.curves
            .iter()
            .filter(|c| c.kind == kind && c.imt == imt)
            .collect()
    }
}

/// Result of the pre-execute phase
struct Prepared {
    imtls: Arc<Vec<(Imt, Vec<f64>)>>,
    processor: LogicTreeProcessor,
    realizations: Vec<Realization>,
}

pub struct HazardCalculator {
    context: CalculationContext,
    warnings: Vec<CalculationWarning>,
}

impl HazardCalculator {
    pub fn new(context: CalculationContext) -> Self {
        Self {
            context,
            warnings: Vec::new(),
        }
    }

    pub fn context(&self) -> &CalculationContext {
        &self.context
    }

    pub fn calculation_id(&self) -> Uuid {
        self.context.calculation_id
    }

    /// Run every phase of the calculation
    pub async fn run(mut self) -> Result<CalculationOutput> {
        let calculation_id = self.context.calculation_id;
        info!(%calculation_id, description = %self.context.config.description, "Starting hazard calculation");

        match self.run_phases().await {
            Ok(output) => Ok(output),
            Err(e) => {
                error!(%calculation_id, error = %e, "Hazard calculation failed");
                self.context
                    .event_bus
                    .emit_lossy(CalculationEvent::CalculationFailed {
                        calculation_id,
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                Err(e)
            }
        }
    }

    async fn run_phases(&mut self) -> Result<CalculationOutput> {
        let prepared = self.pre_execute()?;
        self.check_cancelled()?;
        let curves = self.execute(&prepared).await?;
        self.check_cancelled()?;
        self.post_execute(prepared, curves)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.context.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn pre_execute(&mut self) -> Result<Prepared> {
        let ctx = &self.context;
        ctx.config.validate()?;
        let imtls = Arc::new(ctx.config.imtls()?);
        for model in ctx.source_models.values() {
            model.check()?;
        }

        let processor = LogicTreeProcessor::new(
            &ctx.source_model_logic_tree,
            &ctx.gsim_logic_tree,
            &ctx.source_models,
            &ctx.gsims,
        )?;
        let (realizations, warnings) = initialize_realizations(&processor, &ctx.config)?;

        ctx.event_bus
            .emit_lossy(CalculationEvent::RealizationsInitialized {
                calculation_id: ctx.calculation_id,
                num_realizations: realizations.len(),
                sampled: ctx.config.is_sampling(),
                timestamp: Utc::now(),
            });
        for warning in warnings {
            self.record_warning(warning);
        }

        Ok(Prepared {
            imtls,
            processor,
            realizations,
        })
    }

    async fn execute(&mut self, prepared: &Prepared) -> Result<Vec<ProbabilityCurves>> {
        let collector = SourceCollector::new(
            self.context.config.maximum_distance,
            self.context.config.tasks.rupture_split_threshold,
        );

        // Realizations sharing a source model path share collected sources
        let mut collected_by_path: BTreeMap<Vec<String>, RealizationSources> = BTreeMap::new();
        let mut realization_sources = Vec::with_capacity(prepared.realizations.len());
        let mut assignments = Vec::with_capacity(prepared.realizations.len());
        let mut without_sources = Vec::new();

        for rlz in &prepared.realizations {
            let sources = match collected_by_path.get(&rlz.sm_lt_path) {
                Some(shared) => shared.for_realization(rlz.ordinal),
                None => {
                    let collected = self.collect_sources(&prepared.processor, &collector, rlz)?;
                    let sources = RealizationSources::new(rlz.ordinal, collected);
                    collected_by_path.insert(rlz.sm_lt_path.clone(), sources.clone());
                    sources
                }
            };
            if sources.is_empty() {
                without_sources.push(rlz.ordinal);
            }
            realization_sources.push(sources);
            assignments.push(self.gsim_assignment(&prepared.processor, rlz)?);
        }

        if !without_sources.is_empty() {
            warn!(
                realizations = ?without_sources,
                max_distance = self.context.config.maximum_distance,
                "No contributing sources, curves stay at zero"
            );
            self.record_warning(CalculationWarning::NoContributingSources {
                realizations: without_sources,
            });
        }

        let ctx = &self.context;
        let plan = TaskPlan::new(realization_sources, &ctx.config.tasks);
        let num_tasks = plan.num_tasks();
        let manager = TaskManager::new(&ctx.config.tasks, ctx.cancel_token.clone())
            .with_events(ctx.calculation_id, ctx.event_bus.clone());
        info!(
            num_realizations = prepared.realizations.len(),
            num_tasks,
            distributed = manager.is_distributed(),
            concurrent_tasks = manager.concurrent_tasks(),
            "Task blocks planned"
        );
        ctx.event_bus.emit_lossy(CalculationEvent::TasksPlanned {
            calculation_id: ctx.calculation_id,
            num_tasks,
            timestamp: Utc::now(),
        });

        let worker = ClassicalWorker::new(
            Arc::clone(&ctx.sites),
            Arc::clone(&prepared.imtls),
            Arc::new(assignments),
            ctx.config.truncation_level,
            ctx.config.investigation_time,
            ctx.config.maximum_distance,
        );
        let levels_per_imt = worker.levels_per_imt();
        let init: Vec<ProbabilityCurves> = prepared
            .realizations
            .iter()
            .map(|_| ProbabilityCurves::zeros(ctx.sites.len(), &levels_per_imt))
            .collect();

        let mut remaining = vec![0usize; prepared.realizations.len()];
        for (block, _) in plan.task_arg_gen() {
            remaining[block.realization] += 1;
        }
        for (ordinal, _) in remaining.iter().enumerate().filter(|(_, n)| **n == 0) {
            self.realization_completed(ordinal);
        }

        manager
            .map_reduce(
                plan.task_arg_gen(),
                num_tasks,
                move |block: SourceBlock| worker.compute(&block),
                init,
                |acc, block, partial| {
                    let curves = acc.get_mut(block.realization).ok_or_else(|| {
                        Error::Internal(format!("block {} has no realization", block))
                    })?;
                    curves.combine_with(&partial)?;
                    remaining[block.realization] -= 1;
                    if remaining[block.realization] == 0 {
                        self.realization_completed(block.realization);
                    }
                    Ok(())
                },
            )
            .await
    }

    fn collect_sources(
        &self,
        processor: &LogicTreeProcessor,
        collector: &SourceCollector,
        rlz: &Realization,
    ) -> Result<Vec<CollectedSource>> {
        let path = processor.parse_source_model_path(&rlz.sm_lt_path)?;
        let model = self
            .context
            .source_models
            .get(&path.source_model)
            .ok_or_else(|| Error::config(format!("unknown source model {:?}", path.source_model)))?;
        let sources = path.apply(&model.sources)?;
        let collected = collector.filter_and_split(&sources, &self.context.sites);
        debug!(
            source_model = %path.source_model,
            sm_lt_path = ?rlz.sm_lt_path,
            uncertainties = path.uncertainties.len(),
            num_ruptures = sources.iter().map(|s| s.count_ruptures()).sum::<usize>(),
            collected = collected.len(),
            "Sources collected"
        );
        Ok(collected)
    }

    fn gsim_assignment(
        &self,
        processor: &LogicTreeProcessor,
        rlz: &Realization,
    ) -> Result<GsimAssignment> {
        processor
            .parse_gsim_path(&rlz.gsim_lt_path)?
            .into_iter()
            .map(|(trt, name)| Ok((trt, self.context.gsims.get(&name)?)))
            .collect()
    }

    fn realization_completed(&self, ordinal: usize) {
        debug!(ordinal, "Realization curves complete");
        self.context
            .event_bus
            .emit_lossy(CalculationEvent::RealizationCompleted {
                calculation_id: self.context.calculation_id,
                ordinal,
                timestamp: Utc::now(),
            });
    }

    fn record_warning(&mut self, warning: CalculationWarning) {
        self.context.event_bus.emit_lossy(CalculationEvent::Warning {
            calculation_id: self.context.calculation_id,
            message: warning.to_string(),
            timestamp: Utc::now(),
        });
        self.warnings.push(warning);
    }

    fn post_execute(
        &mut self,
        prepared: Prepared,
        realization_curves: Vec<ProbabilityCurves>,
    ) -> Result<CalculationOutput> {
        let ctx = &self.context;
        let config = &ctx.config;
        let imtls = &prepared.imtls;

        let mut summaries: Vec<(CurveKind, ProbabilityCurves)> = Vec::new();
        if !realization_curves.is_empty() {
            let weights = normalized_weights(&prepared.realizations);
            let refs: Vec<&ProbabilityCurves> = realization_curves.iter().collect();
            if config.mean_hazard_curves {
                summaries.push((CurveKind::Mean, compute_mean(&refs, &weights)?));
            }
            for &q in &config.quantile_hazard_curves {
                summaries.push((CurveKind::Quantile(q), compute_quantile(&refs, &weights, q)?));
            }
        }

        let all_curves: Vec<(CurveKind, &ProbabilityCurves)> = prepared
            .realizations
            .iter()
            .zip(&realization_curves)
            .map(|(rlz, curves)| (CurveKind::Realization(rlz.ordinal), curves))
            .chain(summaries.iter().map(|(kind, curves)| (*kind, curves)))
            .collect();

        let mut curves = Vec::new();
        for (kind, probabilities) in &all_curves {
            curves.extend(hazard_curves(*kind, probabilities, imtls, &ctx.sites));
        }

        let mut maps = Vec::new();
        if !config.poes.is_empty() {
            for (kind, probabilities) in &all_curves {
                for (imt_index, (imt, levels)) in imtls.iter().enumerate() {
                    let matrix = probabilities.matrix(imt_index);
                    maps.extend(compute_hazard_maps(
                        *kind,
                        *imt,
                        levels,
                        ctx.sites.len(),
                        |site| matrix.row(site),
                        &config.poes,
                    )?);
                }
            }
        }

        let uhs = if config.uniform_hazard_spectra {
            make_uhs(&maps, &ctx.sites)
        } else {
            Vec::new()
        };

        let duration_ms = ctx.elapsed_ms();
        info!(
            calculation_id = %ctx.calculation_id,
            num_realizations = prepared.realizations.len(),
            num_curves = curves.len(),
            num_maps = maps.len(),
            num_spectra = uhs.len(),
            num_warnings = self.warnings.len(),
            duration_ms,
            "Hazard calculation completed"
        );
        ctx.event_bus
            .emit_lossy(CalculationEvent::CalculationCompleted {
                calculation_id: ctx.calculation_id,
                num_curves: curves.len(),
                duration_ms,
                timestamp: Utc::now(),
            });

        Ok(CalculationOutput {
            calculation_id: ctx.calculation_id,
            realizations: prepared.realizations,
            curves,
            maps,
            uhs,
            warnings: std::mem::take(&mut self.warnings),
        })
    }
}

fn hazard_curves(
    kind: CurveKind,
    probabilities: &ProbabilityCurves,
    imtls: &[(Imt, Vec<f64>)],
    sites: &SiteCollection,
) -> Vec<HazardCurve> {
    let mut curves = Vec::with_capacity(imtls.len() * sites.len());
    for (imt_index, (imt, levels)) in imtls.iter().enumerate() {
        let matrix = probabilities.matrix(imt_index);
        for (site_index, site) in sites.indexed() {
            curves.push(HazardCurve {
                kind,
                imt: *imt,
                site: site_index,
                location: site.location,
                imls: levels.clone(),
                poes: matrix.row(site_index).to_vec(),
            });
        }
    }
    curves
}
