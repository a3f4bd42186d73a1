//! Logic tree realizations
//!
//! A realization is one (source model path, GSIM path) pair. In enumeration
//! mode every pair becomes a realization carrying its product weight; in
//! sampling mode the configured number of pairs is drawn and every
//! realization carries the implicit weight `1/n`.

use crate::logictree::LogicTreeProcessor;
use crate::warning::CalculationWarning;
use hazard_common::config::CalculationConfig;
use hazard_common::Result;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Realization {
    pub ordinal: usize,
    pub source_model: String,
    pub sm_lt_path: Vec<String>,
    pub gsim_lt_path: Vec<String>,
    /// `None` for sampled realizations
    pub weight: Option<f64>,
    pub seed: Option<u64>,
}

/// Build the realization list for a calculation
pub fn initialize_realizations(
    processor: &LogicTreeProcessor,
    config: &CalculationConfig,
) -> Result<(Vec<Realization>, Vec<CalculationWarning>)> {
    let mut warnings = Vec::new();
    let paths = match config.number_of_logic_tree_samples {
        Some(num_samples) => {
            let (paths, warning) = processor.sample(num_samples, config.random_seed)?;
            warnings.extend(warning);
            paths
        }
        None => processor.enumerate().collect(),
    };

    let realizations: Vec<Realization> = paths
        .into_iter()
        .enumerate()
        .map(|(ordinal, path)| Realization {
            ordinal,
            source_model: path.source_model,
            sm_lt_path: path.sm_lt_path,
            gsim_lt_path: path.gsim_lt_path,
            weight: path.weight,
            seed: path.seed,
        })
        .collect();

    info!(
        num_realizations = realizations.len(),
        sampled = config.is_sampling(),
        "Realizations initialized"
    );
    Ok((realizations, warnings))
}

/// Weights normalized to sum to 1; `None` weights count as `1/n`
pub fn normalized_weights(realizations: &[Realization]) -> Vec<f64> {
    let n = realizations.len();
    if n == 0 {
        return Vec::new();
    }
    let raw: Vec<f64> = realizations
        .iter()
        .map(|r| r.weight.unwrap_or(1.0 / n as f64))
        .collect();
    let total: f64 = raw.iter().sum();
    if total > 0.0 {
        raw.into_iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / n as f64; n]
    }
}
