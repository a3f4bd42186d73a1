//! Seismic sources and their ruptures
//!
//! A source is described by its typology, a set of discretized locations
//! and a magnitude-frequency distribution. Ruptures are generated on
//! demand:
//! - point and area sources: one rupture per (magnitude bin, location),
//!   the bin rate shared evenly over the locations
//! - fault sources: one rupture per magnitude bin spanning the whole
//!   discretized fault surface

pub mod collector;
pub mod mfd;

pub use collector::{CollectedSource, SourceCollector};
pub use mfd::{MagnitudeFrequencyDistribution, MfdModification};

use crate::gsim::{DistanceContext, RuptureContext};
use hazard_common::geo::{min_epicentral_distance, Point};
use hazard_common::site::SiteCollection;
use hazard_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Source typology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceTypology {
    Point,
    Area,
    SimpleFault,
    ComplexFault,
    CharacteristicFault,
}

impl SourceTypology {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTypology::Point => "point",
            SourceTypology::Area => "area",
            SourceTypology::SimpleFault => "simpleFault",
            SourceTypology::ComplexFault => "complexFault",
            SourceTypology::CharacteristicFault => "characteristicFault",
        }
    }

    /// Point-like sources get their own task block size
    pub fn is_point(&self) -> bool {
        matches!(self, SourceTypology::Point)
    }

    fn is_fault(&self) -> bool {
        matches!(
            self,
            SourceTypology::SimpleFault
                | SourceTypology::ComplexFault
                | SourceTypology::CharacteristicFault
        )
    }
}

impl fmt::Display for SourceTypology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTypology {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "point" => Ok(SourceTypology::Point),
            "area" => Ok(SourceTypology::Area),
            "simpleFault" => Ok(SourceTypology::SimpleFault),
            "complexFault" => Ok(SourceTypology::ComplexFault),
            "characteristicFault" => Ok(SourceTypology::CharacteristicFault),
            other => Err(Error::config(format!("unknown source type {:?}", other))),
        }
    }
}

/// A seismic source as read from a source model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicSource {
    pub source_id: String,
    #[serde(default)]
    pub name: String,
    pub tectonic_region_type: String,
    pub typology: SourceTypology,
    /// Discretized geometry: a single point, an area grid or a fault surface
    pub locations: Vec<Point>,
    #[serde(default)]
    pub rake: f64,
    pub mfd: MagnitudeFrequencyDistribution,
}

impl SeismicSource {
    /// Check geometry and MFD consistency
    pub fn check(&self) -> Result<()> {
        if self.locations.is_empty() {
            return Err(Error::InvalidInput(format!(
                "source {} has no locations",
                self.source_id
            )));
        }
        if self.typology == SourceTypology::Point && self.locations.len() != 1 {
            return Err(Error::InvalidInput(format!(
                "point source {} must have exactly one location",
                self.source_id
            )));
        }
        self.mfd
            .check()
            .map_err(|e| Error::InvalidInput(format!("source {}: {}", self.source_id, e)))
    }

    pub fn count_ruptures(&self) -> usize {
        let bins = self.mfd.annual_occurrence_rates().len();
        if self.typology.is_fault() {
            bins
        } else {
            bins * self.locations.len()
        }
    }

    /// Generate every rupture, in deterministic (magnitude, location) order
    pub fn ruptures(&self) -> Vec<Rupture> {
        let rates = self.mfd.annual_occurrence_rates();
        if self.typology.is_fault() {
            let surface: Arc<[Point]> = Arc::from(self.locations.as_slice());
            let hypocenter = self.locations[self.locations.len() / 2];
            rates
                .into_iter()
                .map(|(magnitude, rate)| Rupture {
                    magnitude,
                    rake: self.rake,
                    occurrence_rate: rate,
                    hypocenter,
                    surface: Arc::clone(&surface),
                })
                .collect()
        } else {
            let share = 1.0 / self.locations.len() as f64;
            let mut ruptures = Vec::with_capacity(rates.len() * self.locations.len());
            for (magnitude, rate) in rates {
                for location in &self.locations {
                    ruptures.push(Rupture {
                        magnitude,
                        rake: self.rake,
                        occurrence_rate: rate * share,
                        hypocenter: *location,
                        surface: Arc::from(std::slice::from_ref(location)),
                    });
                }
            }
            ruptures
        }
    }

    /// Minimum epicentral distance (km) from the source to any site
    pub fn min_distance(&self, sites: &SiteCollection) -> f64 {
        sites
            .iter()
            .map(|site| min_epicentral_distance(&self.locations, &site.location))
            .fold(f64::INFINITY, f64::min)
    }
}

/// A named source model: the value selected by a source model branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceModel {
    pub name: String,
    pub sources: Vec<SeismicSource>,
}

impl SourceModel {
    pub fn check(&self) -> Result<()> {
        let mut ids = std::collections::HashSet::new();
        for source in &self.sources {
            source.check()?;
            if !ids.insert(source.source_id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate source id {} in source model {}",
                    source.source_id, self.name
                )));
            }
        }
        Ok(())
    }
}

/// A single earthquake scenario with its annual occurrence rate
#[derive(Debug, Clone, PartialEq)]
pub struct Rupture {
    pub magnitude: f64,
    pub rake: f64,
    pub occurrence_rate: f64,
    pub hypocenter: Point,
    pub surface: Arc<[Point]>,
}

impl Rupture {
    pub fn context(&self) -> RuptureContext {
        RuptureContext {
            mag: self.magnitude,
            rake: self.rake,
            hypo_depth: self.hypocenter.depth,
        }
    }

    /// Distances from the rupture to a site location
    pub fn distances_to(&self, site: &Point) -> DistanceContext {
        let mut repi_closest = f64::INFINITY;
        let mut rrup = f64::INFINITY;
        for point in self.surface.iter() {
            let horizontal = point.epicentral_distance(site);
            repi_closest = repi_closest.min(horizontal);
            rrup = rrup.min(point.distance(site));
        }
        DistanceContext {
            rjb: repi_closest,
            rrup,
            repi: self.hypocenter.epicentral_distance(site),
            rhypo: self.hypocenter.distance(site),
        }
    }

    pub fn min_distance(&self, site: &Point) -> f64 {
        min_epicentral_distance(&self.surface, site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area_source(id: &str) -> SeismicSource {
        SeismicSource {
            source_id: id.to_string(),
            name: String::new(),
            tectonic_region_type: "Active Shallow Crust".to_string(),
            typology: SourceTypology::Area,
            locations: vec![
                Point::new(0.0, 0.0, 10.0),
                Point::new(0.1, 0.0, 10.0),
                Point::new(0.2, 0.0, 10.0),
            ],
            rake: 0.0,
            mfd: MagnitudeFrequencyDistribution::TruncatedGr {
                min_mag: 5.0,
                max_mag: 6.0,
                bin_width: 0.5,
                a_val: 3.0,
                b_val: 1.0,
            },
        }
    }

    #[test]
    fn test_area_rupture_count_and_rate() {
        let source = area_source("a1");
        let ruptures = source.ruptures();
        assert_eq!(ruptures.len(), source.count_ruptures());
        assert_eq!(ruptures.len(), 2 * 3);
        let total: f64 = ruptures.iter().map(|r| r.occurrence_rate).sum();
        assert!((total - source.mfd.total_rate()).abs() < 1e-12);
    }

    #[test]
    fn test_fault_ruptures_span_surface() {
        let mut source = area_source("f1");
        source.typology = SourceTypology::SimpleFault;
        let ruptures = source.ruptures();
        assert_eq!(ruptures.len(), 2);
        assert_eq!(ruptures[0].surface.len(), 3);
    }

    #[test]
    fn test_distances_include_depth() {
        let source = area_source("a1");
        let rupture = &source.ruptures()[0];
        let dctx = rupture.distances_to(&Point::surface(0.0, 0.0));
        assert_eq!(dctx.rjb, 0.0);
        assert!((dctx.rrup - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_typology_round_trip_names() {
        for name in ["point", "area", "simpleFault", "complexFault", "characteristicFault"] {
            assert_eq!(name.parse::<SourceTypology>().unwrap().as_str(), name);
        }
        assert!("volcano".parse::<SourceTypology>().is_err());
    }

    #[test]
    fn test_duplicate_source_ids_rejected() {
        let model = SourceModel {
            name: "sm".to_string(),
            sources: vec![area_source("a1"), area_source("a1")],
        };
        assert!(model.check().is_err());
    }
}
