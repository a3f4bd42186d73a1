//! Intensity measure types
//!
//! IMTs are written the way hazard configurations spell them:
//! `PGA`, `PGV`, `PGD`, `MMI` and `SA(<period>)` with an optional damping
//! (`SA(0.2, 5.0)`). Spectral acceleration defaults to 5% damping.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Damping ratio (percent) assumed when `SA(...)` omits it
pub const DEFAULT_SA_DAMPING: f64 = 5.0;

/// Intensity measure type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Imt {
    /// Peak ground acceleration (g)
    Pga,
    /// Peak ground velocity (cm/s)
    Pgv,
    /// Peak ground displacement (cm)
    Pgd,
    /// Spectral acceleration at a period (s) with damping (%)
    Sa { period: f64, damping: f64 },
    /// Modified Mercalli intensity
    Mmi,
}

impl Imt {
    /// Spectral acceleration with the default damping
    pub fn sa(period: f64) -> Self {
        Imt::Sa {
            period,
            damping: DEFAULT_SA_DAMPING,
        }
    }

    /// Period used when the IMT takes part in a spectrum.
    ///
    /// PGA is SA at period 0.0. Every other non-SA type has no period.
    pub fn spectral_period(&self) -> Option<f64> {
        match self {
            Imt::Pga => Some(0.0),
            Imt::Sa { period, .. } => Some(*period),
            _ => None,
        }
    }

    /// True for PGA and SA, the only types a spectrum can hold
    pub fn is_spectral(&self) -> bool {
        self.spectral_period().is_some()
    }
}

impl fmt::Display for Imt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Imt::Pga => write!(f, "PGA"),
            Imt::Pgv => write!(f, "PGV"),
            Imt::Pgd => write!(f, "PGD"),
            Imt::Mmi => write!(f, "MMI"),
            Imt::Sa { period, damping } => {
                if (*damping - DEFAULT_SA_DAMPING).abs() < f64::EPSILON {
                    write!(f, "SA({})", period)
                } else {
                    write!(f, "SA({}, {})", period, damping)
                }
            }
        }
    }
}

impl FromStr for Imt {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_uppercase().as_str() {
            "PGA" => return Ok(Imt::Pga),
            "PGV" => return Ok(Imt::Pgv),
            "PGD" => return Ok(Imt::Pgd),
            "MMI" => return Ok(Imt::Mmi),
            _ => {}
        }

        let inner = s
            .get(..3)
            .filter(|prefix| prefix.eq_ignore_ascii_case("SA("))
            .and_then(|_| s[3..].strip_suffix(')'))
            .ok_or_else(|| Error::config(format!("Unknown intensity measure type: {:?}", s)))?;

        let mut parts = inner.split(',').map(str::trim);
        let period = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::config(format!("Missing SA period in {:?}", s)))?
            .parse::<f64>()
            .map_err(|e| Error::config(format!("Invalid SA period in {:?}: {}", s, e)))?;
        let damping = match parts.next() {
            Some(d) => d
                .parse::<f64>()
                .map_err(|e| Error::config(format!("Invalid SA damping in {:?}: {}", s, e)))?,
            None => DEFAULT_SA_DAMPING,
        };
        if parts.next().is_some() {
            return Err(Error::config(format!("Too many SA parameters in {:?}", s)));
        }
        if !period.is_finite() || period < 0.0 {
            return Err(Error::config(format!(
                "SA period must be finite and >= 0, got {}",
                period
            )));
        }
        if !(damping.is_finite() && damping > 0.0) {
            return Err(Error::config(format!(
                "SA damping must be finite and > 0, got {}",
                damping
            )));
        }

        Ok(Imt::Sa { period, damping })
    }
}

impl TryFrom<String> for Imt {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Imt> for String {
    fn from(imt: Imt) -> Self {
        imt.to_string()
    }
}
