//! Calculation configuration loading and validation
//!
//! Configuration file resolution follows this priority order:
//! 1. Explicit path passed by the caller (highest priority)
//! 2. `HAZARD_CONFIG` environment variable
//! 3. `<user config dir>/hazard/config.toml`
//! 4. Compiled defaults (fallback)
//!
//! Every numeric parameter is checked by [`CalculationConfig::validate`]
//! before a calculation starts; invalid values fail fast with
//! [`Error::Configuration`].

use crate::imt::Imt;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "HAZARD_CONFIG";

/// Intensity levels used when the configuration does not list any
pub const DEFAULT_PGA_LEVELS: [f64; 19] = [
    0.005, 0.007, 0.0098, 0.0137, 0.0192, 0.0269, 0.0376, 0.0527, 0.0738, 0.103, 0.145, 0.203,
    0.284, 0.397, 0.556, 0.778, 1.09, 1.52, 2.13,
];

/// Full calculation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationConfig {
    /// Free-form description of the calculation
    #[serde(default)]
    pub description: String,

    /// Master seed for logic tree sampling
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    /// Number of Monte Carlo samples of the logic trees.
    ///
    /// `None` enumerates every path; `Some(0)` is rejected.
    #[serde(default)]
    pub number_of_logic_tree_samples: Option<usize>,

    /// Integration distance (km); sources farther from every site are dropped
    #[serde(default = "default_maximum_distance")]
    pub maximum_distance: f64,

    /// Time span (years) the probabilities of exceedance refer to
    #[serde(default = "default_investigation_time")]
    pub investigation_time: f64,

    /// Truncation of the ground motion distribution in standard deviations.
    ///
    /// Omitting the key (`None`) uses the untruncated normal distribution;
    /// `0.0` collapses every GSIM to its median.
    #[serde(default)]
    pub truncation_level: Option<f64>,

    /// IMT string → ascending intensity levels
    #[serde(default = "default_imtls")]
    pub intensity_measure_types_and_levels: BTreeMap<String, Vec<f64>>,

    /// Compute the weighted mean curve across realizations
    #[serde(default = "default_true")]
    pub mean_hazard_curves: bool,

    /// Quantiles to compute across realizations, each in (0, 1)
    #[serde(default)]
    pub quantile_hazard_curves: Vec<f64>,

    /// PoEs at which hazard maps are interpolated, each in (0, 1]
    #[serde(default)]
    pub poes: Vec<f64>,

    /// Build uniform hazard spectra from the hazard maps
    #[serde(default)]
    pub uniform_hazard_spectra: bool,

    /// Task distribution parameters
    #[serde(default)]
    pub tasks: TaskConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Work distribution parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Number of non-point sub-sources per task block
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Number of point sub-sources per task block
    #[serde(default = "default_point_source_block_size")]
    pub point_source_block_size: usize,

    /// Maximum number of blocks computed at the same time
    #[serde(default = "default_concurrent_tasks")]
    pub concurrent_tasks: usize,

    /// Sources with more ruptures than this are split into sub-sources
    #[serde(default = "default_rupture_split_threshold")]
    pub rupture_split_threshold: usize,

    /// When false every block runs inline on the coordinator
    #[serde(default = "default_true")]
    pub distribute: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            point_source_block_size: default_point_source_block_size(),
            concurrent_tasks: default_concurrent_tasks(),
            rupture_split_threshold: default_rupture_split_threshold(),
            distribute: true,
        }
    }
}

impl Default for CalculationConfig {
    fn default() -> Self {
        Self {
            description: String::new(),
            random_seed: default_random_seed(),
            number_of_logic_tree_samples: None,
            maximum_distance: default_maximum_distance(),
            investigation_time: default_investigation_time(),
            truncation_level: None,
            intensity_measure_types_and_levels: default_imtls(),
            mean_hazard_curves: true,
            quantile_hazard_curves: Vec::new(),
            poes: Vec::new(),
            uniform_hazard_spectra: false,
            tasks: TaskConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_random_seed() -> u64 {
    42
}

fn default_maximum_distance() -> f64 {
    200.0
}

fn default_investigation_time() -> f64 {
    50.0
}

fn default_imtls() -> BTreeMap<String, Vec<f64>> {
    let mut imtls = BTreeMap::new();
    imtls.insert("PGA".to_string(), DEFAULT_PGA_LEVELS.to_vec());
    imtls
}

fn default_true() -> bool {
    true
}

fn default_block_size() -> usize {
    10
}

fn default_point_source_block_size() -> usize {
    100
}

fn default_concurrent_tasks() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(4)
}

fn default_rupture_split_threshold() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CalculationConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CalculationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Reading calculation configuration");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load the configuration following the resolution priority order.
    ///
    /// Falls back to compiled defaults when no file is found.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(explicit_path) {
            Some(path) => {
                info!(path = %path.display(), "Loading calculation configuration");
                Self::from_file(&path)
            }
            None => {
                warn!("No calculation configuration file found, using compiled defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Check every parameter, failing on the first invalid one
    pub fn validate(&self) -> Result<()> {
        if self.tasks.block_size == 0 {
            return Err(Error::config("block_size must be > 0"));
        }
        if self.tasks.point_source_block_size == 0 {
            return Err(Error::config("point_source_block_size must be > 0"));
        }
        if self.tasks.concurrent_tasks == 0 {
            return Err(Error::config("concurrent_tasks must be > 0"));
        }
        if self.tasks.rupture_split_threshold == 0 {
            return Err(Error::config("rupture_split_threshold must be > 0"));
        }
        if self.number_of_logic_tree_samples == Some(0) {
            return Err(Error::config(
                "number_of_logic_tree_samples must be > 0 (omit it to enumerate all paths)",
            ));
        }
        if !(self.maximum_distance > 0.0) {
            return Err(Error::config(format!(
                "maximum_distance must be > 0, got {}",
                self.maximum_distance
            )));
        }
        if !(self.investigation_time > 0.0) {
            return Err(Error::config(format!(
                "investigation_time must be > 0, got {}",
                self.investigation_time
            )));
        }
        if let Some(level) = self.truncation_level {
            if !(level >= 0.0) {
                return Err(Error::config(format!(
                    "truncation_level must be >= 0, got {}",
                    level
                )));
            }
        }
        for q in &self.quantile_hazard_curves {
            if !(*q > 0.0 && *q < 1.0) {
                return Err(Error::config(format!("quantile {} not in (0, 1)", q)));
            }
        }
        for poe in &self.poes {
            if !(*poe > 0.0 && *poe <= 1.0) {
                return Err(Error::config(format!("poe {} not in (0, 1]", poe)));
            }
        }
        if self.uniform_hazard_spectra && self.poes.is_empty() {
            return Err(Error::config(
                "uniform_hazard_spectra requires at least one hazard map poe",
            ));
        }
        self.imtls()?;
        Ok(())
    }

    /// Parsed IMTs with their levels, sorted by configuration key.
    ///
    /// Two keys naming the same IMT (`"PGA"` and `"pga"`, `"SA(0.1)"` and
    /// `"SA(0.10)"`) are rejected.
    pub fn imtls(&self) -> Result<Vec<(Imt, Vec<f64>)>> {
        if self.intensity_measure_types_and_levels.is_empty() {
            return Err(Error::config(
                "intensity_measure_types_and_levels must not be empty",
            ));
        }
        let mut imtls: Vec<(Imt, Vec<f64>)> =
            Vec::with_capacity(self.intensity_measure_types_and_levels.len());
        for (name, levels) in &self.intensity_measure_types_and_levels {
            let imt: Imt = name.parse()?;
            if imtls.iter().any(|(seen, _)| *seen == imt) {
                return Err(Error::config(format!(
                    "duplicate intensity measure type {} ({:?})",
                    imt, name
                )));
            }
            if levels.is_empty() {
                return Err(Error::config(format!("{} has no intensity levels", name)));
            }
            if levels.iter().any(|l| !(*l > 0.0)) {
                return Err(Error::config(format!(
                    "{} intensity levels must be positive",
                    name
                )));
            }
            if levels.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::config(format!(
                    "{} intensity levels must be strictly ascending",
                    name
                )));
            }
            imtls.push((imt, levels.clone()));
        }
        Ok(imtls)
    }

    /// True when logic trees are sampled rather than enumerated
    pub fn is_sampling(&self) -> bool {
        self.number_of_logic_tree_samples.is_some()
    }
}

/// Resolve the configuration file path.
///
/// Returns `None` when neither the caller, the environment nor the user
/// configuration directory provide a file.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: explicit path
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: user configuration directory
    dirs::config_dir()
        .map(|d| d.join("hazard").join("config.toml"))
        .filter(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CalculationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tasks.block_size, 10);
        assert_eq!(config.logging.level, "info");
        assert!(!config.is_sampling());
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let mut config = CalculationConfig::default();
        config.tasks.block_size = 0;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_zero_samples_rejected() {
        let mut config = CalculationConfig::default();
        config.number_of_logic_tree_samples = Some(0);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_quantile_out_of_range_rejected() {
        let mut config = CalculationConfig::default();
        config.quantile_hazard_curves = vec![0.5, 1.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_descending_levels_rejected() {
        let mut config = CalculationConfig::default();
        config
            .intensity_measure_types_and_levels
            .insert("SA(0.1)".to_string(), vec![0.2, 0.1]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_uhs_requires_poes() {
        let mut config = CalculationConfig::default();
        config.uniform_hazard_spectra = true;
        assert!(config.validate().is_err());
        config.poes = vec![0.1];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_imt_spellings_rejected() {
        let mut config = CalculationConfig::default();
        config
            .intensity_measure_types_and_levels
            .insert("pga".to_string(), vec![0.1, 0.2]);
        let err = config.imtls().unwrap_err();
        assert!(err.to_string().contains("duplicate"), "{}", err);

        let mut config = CalculationConfig::default();
        config
            .intensity_measure_types_and_levels
            .insert("SA(0.1)".to_string(), vec![0.1, 0.2]);
        config
            .intensity_measure_types_and_levels
            .insert("SA(0.10)".to_string(), vec![0.1, 0.2]);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/tmp/explicit-hazard.toml");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }
}
