//! Calculation outputs
//!
//! Every output is tagged with the realization or statistic it derives
//! from. Outputs are plain values; persisting or exporting them is up to
//! the caller.

use hazard_common::geo::Point;
use hazard_common::Imt;
use serde::Serialize;
use std::fmt;

/// What a curve, map or spectrum summarizes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "String")]
pub enum CurveKind {
    /// A single realization, by ordinal
    Realization(usize),
    Mean,
    Quantile(f64),
}

impl CurveKind {
    /// Stable label such as `rlz-3`, `mean` or `quantile-0.15`
    pub fn label(&self) -> String {
        match self {
            CurveKind::Realization(ordinal) => format!("rlz-{}", ordinal),
            CurveKind::Mean => "mean".to_string(),
            CurveKind::Quantile(q) => format!("quantile-{}", q),
        }
    }

    pub fn is_statistic(&self) -> bool {
        !matches!(self, CurveKind::Realization(_))
    }
}

impl fmt::Display for CurveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<CurveKind> for String {
    fn from(kind: CurveKind) -> Self {
        kind.label()
    }
}

/// PoEs of one site for one IMT, aligned with the IMT's levels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HazardCurve {
    pub kind: CurveKind,
    pub imt: Imt,
    pub site: usize,
    pub location: Point,
    pub imls: Vec<f64>,
    pub poes: Vec<f64>,
}

/// IML reached at a fixed PoE, per site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HazardMap {
    pub kind: CurveKind,
    pub imt: Imt,
    pub poe: f64,
    /// Indexed by site
    pub imls: Vec<f64>,
}

/// Intensities across periods for one site at a fixed PoE
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniformHazardSpectrum {
    pub kind: CurveKind,
    pub poe: f64,
    pub site: usize,
    pub location: Point,
    /// Ascending; PGA appears as period 0.0
    pub periods: Vec<f64>,
    pub imls: Vec<f64>,
}
