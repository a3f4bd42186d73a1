//! Recoverable conditions reported alongside calculation results

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationWarning {
    /// No source survived filtering for these realizations; their curves
    /// are all zeros
    NoContributingSources { realizations: Vec<usize> },

    /// More samples requested than distinct logic tree paths
    TooManySamples {
        requested: usize,
        distinct_paths: usize,
    },
}

impl fmt::Display for CalculationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalculationWarning::NoContributingSources { realizations } => write!(
                f,
                "no sources within the integration distance for realizations {:?}",
                realizations
            ),
            CalculationWarning::TooManySamples {
                requested,
                distinct_paths,
            } => write!(
                f,
                "{} logic tree samples requested but only {} distinct paths exist",
                requested, distinct_paths
            ),
        }
    }
}
