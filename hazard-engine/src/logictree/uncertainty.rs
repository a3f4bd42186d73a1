//! Uncertainty kinds, values and branch-set filters

use crate::source::{MfdModification, SeismicSource, SourceTypology};
use hazard_common::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Kind of modeling uncertainty a branch-set expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UncertaintyType {
    /// Whole source model replacement
    SourceModel,
    /// GSIM choice for one tectonic region
    GmpeModel,
    /// Offset added to the GR maximum magnitude
    MaxMagGrRelative,
    /// Offset added to the GR b value
    BGrRelative,
    /// Absolute GR maximum magnitude
    MaxMagGrAbsolute,
    /// Absolute GR a and b values
    AbGrAbsolute,
}

impl UncertaintyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UncertaintyType::SourceModel => "sourceModel",
            UncertaintyType::GmpeModel => "gmpeModel",
            UncertaintyType::MaxMagGrRelative => "maxMagGRRelative",
            UncertaintyType::BGrRelative => "bGRRelative",
            UncertaintyType::MaxMagGrAbsolute => "maxMagGRAbsolute",
            UncertaintyType::AbGrAbsolute => "abGRAbsolute",
        }
    }

    /// Absolute uncertainties target exactly one source
    pub fn is_absolute(&self) -> bool {
        matches!(
            self,
            UncertaintyType::MaxMagGrAbsolute | UncertaintyType::AbGrAbsolute
        )
    }
}

impl fmt::Display for UncertaintyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UncertaintyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sourceModel" => Ok(UncertaintyType::SourceModel),
            "gmpeModel" => Ok(UncertaintyType::GmpeModel),
            "maxMagGRRelative" => Ok(UncertaintyType::MaxMagGrRelative),
            "bGRRelative" => Ok(UncertaintyType::BGrRelative),
            "maxMagGRAbsolute" => Ok(UncertaintyType::MaxMagGrAbsolute),
            "abGRAbsolute" => Ok(UncertaintyType::AbGrAbsolute),
            other => Err(Error::config(format!("unknown uncertainty type {:?}", other))),
        }
    }
}

/// Parsed value carried by a branch
#[derive(Debug, Clone, PartialEq)]
pub enum UncertaintyValue {
    SourceModel(String),
    GmpeModel(String),
    MaxMagGrRelative(f64),
    BGrRelative(f64),
    MaxMagGrAbsolute(f64),
    AbGrAbsolute { a_val: f64, b_val: f64 },
}

impl UncertaintyValue {
    /// Parse the raw branch value for an uncertainty of type `kind`
    pub fn parse(kind: UncertaintyType, raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let float = |s: &str| -> Result<f64> {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    Error::config(format!("{}: expected single float value, got {:?}", kind, raw))
                })
        };
        match kind {
            UncertaintyType::SourceModel | UncertaintyType::GmpeModel if raw.is_empty() => Err(
                Error::config(format!("{}: branch value must not be empty", kind)),
            ),
            UncertaintyType::SourceModel => Ok(UncertaintyValue::SourceModel(raw.to_string())),
            UncertaintyType::GmpeModel => Ok(UncertaintyValue::GmpeModel(raw.to_string())),
            UncertaintyType::MaxMagGrRelative => Ok(UncertaintyValue::MaxMagGrRelative(float(raw)?)),
            UncertaintyType::BGrRelative => Ok(UncertaintyValue::BGrRelative(float(raw)?)),
            UncertaintyType::MaxMagGrAbsolute => Ok(UncertaintyValue::MaxMagGrAbsolute(float(raw)?)),
            UncertaintyType::AbGrAbsolute => {
                let parts: Vec<&str> = raw.split_whitespace().collect();
                let pair = match parts.as_slice() {
                    [a, b] => a
                        .parse::<f64>()
                        .ok()
                        .zip(b.parse::<f64>().ok())
                        .filter(|(a, b)| a.is_finite() && b.is_finite()),
                    _ => None,
                };
                let (a_val, b_val) = pair.ok_or_else(|| {
                    Error::config(format!(
                        "{}: expected a pair of floats separated by space, got {:?}",
                        kind, raw
                    ))
                })?;
                Ok(UncertaintyValue::AbGrAbsolute { a_val, b_val })
            }
        }
    }

    /// MFD change for source-level uncertainties, `None` for model choices
    pub fn mfd_modification(&self) -> Option<MfdModification> {
        match *self {
            UncertaintyValue::SourceModel(_) | UncertaintyValue::GmpeModel(_) => None,
            UncertaintyValue::MaxMagGrRelative(v) => Some(MfdModification::IncrementMaxMag(v)),
            UncertaintyValue::BGrRelative(v) => Some(MfdModification::IncrementB(v)),
            UncertaintyValue::MaxMagGrAbsolute(v) => Some(MfdModification::SetMaxMag(v)),
            UncertaintyValue::AbGrAbsolute { a_val, b_val } => {
                Some(MfdModification::SetAb { a_val, b_val })
            }
        }
    }
}

/// Restricts which sources (or which region, for GSIM trees) a branch-set
/// applies to
#[derive(Debug, Clone, PartialEq)]
pub enum BranchSetFilter {
    ApplyToSources(Vec<String>),
    ApplyToSourceType(SourceTypology),
    ApplyToTectonicRegionType(String),
}

impl BranchSetFilter {
    pub fn name(&self) -> &'static str {
        match self {
            BranchSetFilter::ApplyToSources(_) => "applyToSources",
            BranchSetFilter::ApplyToSourceType(_) => "applyToSourceType",
            BranchSetFilter::ApplyToTectonicRegionType(_) => "applyToTectonicRegionType",
        }
    }

    pub fn matches(&self, source: &SeismicSource) -> bool {
        match self {
            BranchSetFilter::ApplyToSources(ids) => ids.iter().any(|id| *id == source.source_id),
            BranchSetFilter::ApplyToSourceType(typology) => source.typology == *typology,
            BranchSetFilter::ApplyToTectonicRegionType(trt) => {
                *trt == source.tectonic_region_type
            }
        }
    }
}

/// Apply one uncertainty value to a source
///
/// Returns a modified copy when the source passes `filter` and has a
/// truncated GR distribution; otherwise an unchanged copy. The input is
/// never mutated.
pub fn apply_uncertainty(
    filter: Option<&BranchSetFilter>,
    value: &UncertaintyValue,
    source: &SeismicSource,
) -> Result<SeismicSource> {
    let mut modified = source.clone();
    let Some(modification) = value.mfd_modification() else {
        return Ok(modified);
    };
    if !filter.map_or(true, |f| f.matches(source)) || !source.mfd.is_gutenberg_richter() {
        return Ok(modified);
    }
    modified.mfd = source
        .mfd
        .modified(modification)
        .map_err(|e| Error::InvalidInput(format!("source {}: {}", source.source_id, e)))?;
    Ok(modified)
}
