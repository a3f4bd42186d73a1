//! # Hazard Engine
//!
//! Classical probabilistic seismic hazard:
//! - logic trees resolved into weighted realizations (enumerated or sampled)
//! - sources filtered and split against the sites, then computed in blocks
//!   on a bounded worker pool
//! - per-realization exceedance curves combined with the union rule
//! - mean and quantile curves, hazard maps and uniform hazard spectra
//!
//! Ground-motion models plug in through the [`gsim::Gsim`] trait.

pub mod calc;
pub mod context;
pub mod gsim;
pub mod logictree;
pub mod outputs;
pub mod post_processing;
pub mod realization;
pub mod source;
pub mod stats;
pub mod warning;

pub use calc::{CalculationOutput, HazardCalculator};
pub use context::CalculationContext;
pub use gsim::{Gsim, GsimRegistry};
pub use logictree::{LogicTreeDefinition, LogicTreeProcessor};
pub use outputs::{CurveKind, HazardCurve, HazardMap, UniformHazardSpectrum};
pub use realization::Realization;
pub use source::{SeismicSource, SourceModel};
pub use warning::CalculationWarning;
