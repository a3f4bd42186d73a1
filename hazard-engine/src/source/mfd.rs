//! Magnitude-frequency distributions
//!
//! Two families are supported:
//! - Truncated Gutenberg-Richter: `log10(N(m)) = a - b*m` between a minimum
//!   and maximum magnitude, discretized in bins of `bin_width`
//! - Evenly discretized: explicit annual rates for consecutive bins
//!
//! Only the Gutenberg-Richter family can be modified by logic tree
//! uncertainties.

use hazard_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magnitude-frequency distribution of a seismic source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MagnitudeFrequencyDistribution {
    TruncatedGr {
        min_mag: f64,
        max_mag: f64,
        bin_width: f64,
        a_val: f64,
        b_val: f64,
    },
    EvenlyDiscretized {
        /// Centre of the first bin
        min_mag: f64,
        bin_width: f64,
        occurrence_rates: Vec<f64>,
    },
}

/// In-place modification requested by a logic tree branch
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MfdModification {
    SetAb { a_val: f64, b_val: f64 },
    IncrementB(f64),
    IncrementMaxMag(f64),
    SetMaxMag(f64),
}

impl MagnitudeFrequencyDistribution {
    /// Check the distribution parameters
    pub fn check(&self) -> Result<()> {
        match self {
            Self::TruncatedGr {
                min_mag,
                max_mag,
                bin_width,
                b_val,
                ..
            } => {
                if !(*bin_width > 0.0) {
                    return Err(Error::InvalidInput(format!(
                        "bin width must be positive, got {}",
                        bin_width
                    )));
                }
                if !(*min_mag >= 0.0) {
                    return Err(Error::InvalidInput(format!(
                        "minimum magnitude must be non-negative, got {}",
                        min_mag
                    )));
                }
                if !(*max_mag >= *min_mag + *bin_width) {
                    return Err(Error::InvalidInput(format!(
                        "maximum magnitude {} must exceed minimum {} by at least one bin",
                        max_mag, min_mag
                    )));
                }
                if !(*b_val > 0.0) {
                    return Err(Error::InvalidInput(format!(
                        "b value must be positive, got {}",
                        b_val
                    )));
                }
                Ok(())
            }
            Self::EvenlyDiscretized {
                bin_width,
                occurrence_rates,
                ..
            } => {
                if !(*bin_width > 0.0) {
                    return Err(Error::InvalidInput(format!(
                        "bin width must be positive, got {}",
                        bin_width
                    )));
                }
                if occurrence_rates.is_empty() || occurrence_rates.iter().any(|r| !(*r >= 0.0)) {
                    return Err(Error::InvalidInput(
                        "occurrence rates must be a non-empty list of non-negative values"
                            .to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn is_gutenberg_richter(&self) -> bool {
        matches!(self, Self::TruncatedGr { .. })
    }

    /// (magnitude, annual occurrence rate) for every bin
    pub fn annual_occurrence_rates(&self) -> Vec<(f64, f64)> {
        match self {
            Self::TruncatedGr {
                min_mag,
                max_mag,
                bin_width,
                a_val,
                b_val,
            } => {
                let (first, num_bins) = gr_bins(*min_mag, *max_mag, *bin_width);
                (0..num_bins)
                    .map(|i| {
                        let mag = first + i as f64 * bin_width;
                        let lo = mag - bin_width / 2.0;
                        let hi = mag + bin_width / 2.0;
                        let rate = 10f64.powf(a_val - b_val * lo) - 10f64.powf(a_val - b_val * hi);
                        (mag, rate)
                    })
                    .collect()
            }
            Self::EvenlyDiscretized {
                min_mag,
                bin_width,
                occurrence_rates,
            } => occurrence_rates
                .iter()
                .enumerate()
                .map(|(i, rate)| (min_mag + i as f64 * bin_width, *rate))
                .collect(),
        }
    }

    /// Total annual rate over all bins
    pub fn total_rate(&self) -> f64 {
        self.annual_occurrence_rates().iter().map(|(_, r)| r).sum()
    }

    /// Return a modified copy. Non-GR distributions cannot be modified.
    pub fn modified(&self, modification: MfdModification) -> Result<Self> {
        let mut mfd = self.clone();
        match &mut mfd {
            Self::TruncatedGr {
                max_mag,
                a_val,
                b_val,
                ..
            } => match modification {
                MfdModification::SetAb {
                    a_val: new_a,
                    b_val: new_b,
                } => {
                    *a_val = new_a;
                    *b_val = new_b;
                }
                MfdModification::IncrementB(value) => *b_val += value,
                MfdModification::IncrementMaxMag(value) => *max_mag += value,
                MfdModification::SetMaxMag(value) => *max_mag = value,
            },
            Self::EvenlyDiscretized { .. } => {
                return Err(Error::InvalidInput(
                    "only truncated Gutenberg-Richter distributions can be modified".to_string(),
                ))
            }
        }
        mfd.check()?;
        Ok(mfd)
    }
}

/// Centre of the first bin and number of bins of a truncated GR MFD.
///
/// Limits are rounded to the bin grid; bins are centred half a bin inside
/// the rounded limits.
fn gr_bins(min_mag: f64, max_mag: f64, bin_width: f64) -> (f64, usize) {
    let mut lo = (min_mag / bin_width).round() * bin_width;
    let mut hi = ((max_mag + 1e-9) / bin_width).round() * bin_width;
    if lo != hi {
        lo += bin_width / 2.0;
        hi -= bin_width / 2.0;
    }
    let num_bins = ((hi - lo) / bin_width).round() as usize + 1;
    (lo, num_bins)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gr() -> MagnitudeFrequencyDistribution {
        MagnitudeFrequencyDistribution::TruncatedGr {
            min_mag: 5.0,
            max_mag: 6.0,
            bin_width: 0.1,
            a_val: 4.0,
            b_val: 1.0,
        }
    }

    #[test]
    fn test_gr_bins_are_centred() {
        let rates = gr().annual_occurrence_rates();
        assert_eq!(rates.len(), 10);
        assert!((rates[0].0 - 5.05).abs() < 1e-9);
        assert!((rates[9].0 - 5.95).abs() < 1e-9);
    }

    #[test]
    fn test_gr_total_rate_telescopes() {
        // Sum of bin rates equals N(5.0) - N(6.0)
        let expected = 10f64.powf(4.0 - 5.0) - 10f64.powf(4.0 - 6.0);
        assert!((gr().total_rate() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rates_decrease_with_magnitude() {
        let rates = gr().annual_occurrence_rates();
        assert!(rates.windows(2).all(|w| w[0].1 > w[1].1));
    }

    #[test]
    fn test_increment_max_mag_adds_bins() {
        let modified = gr().modified(MfdModification::IncrementMaxMag(0.5)).unwrap();
        assert_eq!(modified.annual_occurrence_rates().len(), 15);
        // original untouched
        assert_eq!(gr().annual_occurrence_rates().len(), 10);
    }

    #[test]
    fn test_set_ab() {
        let modified = gr()
            .modified(MfdModification::SetAb {
                a_val: 3.0,
                b_val: 0.9,
            })
            .unwrap();
        match modified {
            MagnitudeFrequencyDistribution::TruncatedGr { a_val, b_val, .. } => {
                assert_eq!(a_val, 3.0);
                assert_eq!(b_val, 0.9);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_max_mag_below_min_rejected() {
        let result = gr().modified(MfdModification::SetMaxMag(4.0));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_evenly_discretized_cannot_be_modified() {
        let mfd = MagnitudeFrequencyDistribution::EvenlyDiscretized {
            min_mag: 5.5,
            bin_width: 0.5,
            occurrence_rates: vec![0.01, 0.001],
        };
        assert!(mfd.modified(MfdModification::IncrementB(0.1)).is_err());
        assert_eq!(mfd.annual_occurrence_rates(), vec![(5.5, 0.01), (6.0, 0.001)]);
    }
}
