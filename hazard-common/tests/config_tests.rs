//! Integration tests for calculation configuration loading
//!
//! Covers:
//! - TOML parsing with serde defaults
//! - Fail-fast validation of out-of-range parameters
//! - Configuration file resolution priority
//!
//! Note: Uses serial_test to prevent environment variable races.
//! Tests that manipulate HAZARD_CONFIG are marked with #[serial].

use hazard_common::config::{resolve_config_path, CalculationConfig, CONFIG_ENV_VAR};
use hazard_common::{Error, Imt};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};

const FULL_CONFIG: &str = r#"
description = "Classical PSHA with two IMTs"
random_seed = 23
number_of_logic_tree_samples = 10
maximum_distance = 150.0
investigation_time = 50.0
truncation_level = 3.0
mean_hazard_curves = true
quantile_hazard_curves = [0.15, 0.85]
poes = [0.1, 0.02]
uniform_hazard_spectra = true

[intensity_measure_types_and_levels]
"PGA" = [0.01, 0.1, 0.5]
"SA(0.1)" = [0.02, 0.2, 1.0]

[tasks]
block_size = 5
point_source_block_size = 50
concurrent_tasks = 8
rupture_split_threshold = 200
distribute = false

[logging]
level = "debug"
"#;

#[test]
fn test_parse_full_config() {
    let config = CalculationConfig::from_toml_str(FULL_CONFIG).unwrap();

    assert_eq!(config.random_seed, 23);
    assert_eq!(config.number_of_logic_tree_samples, Some(10));
    assert!(config.is_sampling());
    assert_eq!(config.maximum_distance, 150.0);
    assert_eq!(config.quantile_hazard_curves, vec![0.15, 0.85]);
    assert_eq!(config.tasks.block_size, 5);
    assert_eq!(config.tasks.point_source_block_size, 50);
    assert!(!config.tasks.distribute);
    assert_eq!(config.logging.level, "debug");

    let imtls = config.imtls().unwrap();
    assert_eq!(imtls.len(), 2);
    assert_eq!(imtls[0].0, Imt::Pga);
    assert_eq!(imtls[1].0, Imt::sa(0.1));
    assert_eq!(imtls[1].1, vec![0.02, 0.2, 1.0]);
}

#[test]
fn test_missing_sections_use_defaults() {
    let config = CalculationConfig::from_toml_str("random_seed = 7\n").unwrap();

    assert_eq!(config.random_seed, 7);
    assert_eq!(config.number_of_logic_tree_samples, None);
    assert_eq!(config.truncation_level, None);
    assert!(config.mean_hazard_curves);
    assert!(config.tasks.distribute);
    assert!(config.tasks.concurrent_tasks > 0);
    assert_eq!(config.imtls().unwrap()[0].0, Imt::Pga);
}

#[test]
fn test_zero_block_size_fails_fast() {
    let result = CalculationConfig::from_toml_str("[tasks]\nblock_size = 0\n");
    match result {
        Err(Error::Configuration(msg)) => assert!(msg.contains("block_size")),
        other => panic!("expected configuration error, got {:?}", other),
    }
}

#[test]
fn test_negative_block_size_fails_fast() {
    let result = CalculationConfig::from_toml_str("[tasks]\nblock_size = -3\n");
    let err = result.unwrap_err();
    assert!(err.is_configuration(), "unexpected error {:?}", err);
}

#[test]
fn test_zero_sample_count_fails_fast() {
    let result = CalculationConfig::from_toml_str("number_of_logic_tree_samples = 0\n");
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_unknown_imt_rejected() {
    let result = CalculationConfig::from_toml_str(
        "[intensity_measure_types_and_levels]\n\"FOO\" = [0.1]\n",
    );
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_truncation_level_modes() {
    let untruncated = CalculationConfig::from_toml_str("investigation_time = 1.0\n").unwrap();
    assert_eq!(untruncated.truncation_level, None);

    let median_only = CalculationConfig::from_toml_str("truncation_level = 0.0\n").unwrap();
    assert_eq!(median_only.truncation_level, Some(0.0));

    let truncated = CalculationConfig::from_toml_str("truncation_level = 2.5\n").unwrap();
    assert_eq!(truncated.truncation_level, Some(2.5));

    let negative = CalculationConfig::from_toml_str("truncation_level = -1.0\n");
    assert!(matches!(negative, Err(Error::Configuration(_))));
}

#[test]
fn test_same_imt_under_two_keys_rejected() {
    let result = CalculationConfig::from_toml_str(
        "[intensity_measure_types_and_levels]\n\"PGA\" = [0.1, 0.2]\n\"pga\" = [0.1, 0.2]\n",
    );
    assert!(matches!(result, Err(Error::Configuration(_))));

    let result = CalculationConfig::from_toml_str(
        "[intensity_measure_types_and_levels]\n\"SA(0.1)\" = [0.1]\n\"SA(0.10)\" = [0.1]\n",
    );
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(FULL_CONFIG.as_bytes()).unwrap();

    let config = CalculationConfig::from_file(file.path()).unwrap();
    assert_eq!(config.description, "Classical PSHA with two IMTs");
}

#[test]
fn test_from_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result = CalculationConfig::from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
#[serial]
fn test_env_var_resolution() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("env-config.toml");
    std::fs::write(&path, "random_seed = 99\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    assert_eq!(resolve_config_path(None), Some(path.clone()));
    let config = CalculationConfig::load(None).unwrap();
    assert_eq!(config.random_seed, 99);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_explicit_path_beats_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/hazard-env-config.toml");
    let explicit = PathBuf::from("/tmp/hazard-explicit.toml");

    assert_eq!(resolve_config_path(Some(&explicit)), Some(explicit.clone()));

    env::remove_var(CONFIG_ENV_VAR);
}
