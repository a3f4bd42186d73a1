//! Classical calculation: block planning, distribution, curve combination
//! and the calculator that drives them

pub mod aggregator;
pub mod calculator;
pub mod classical;
pub mod task_manager;

pub use aggregator::{combine, ExceedanceMatrix, ProbabilityCurves};
pub use calculator::{CalculationOutput, HazardCalculator};
pub use classical::{ClassicalWorker, GsimAssignment, RealizationSources, SourceBlock, TaskPlan};
pub use task_manager::{BlockHandle, BlockId, TaskManager};
