//! Sites and site collections

use crate::geo::Point;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A site where hazard is computed, with the parameters GSIMs consume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub location: Point,
    /// Average shear-wave velocity in the top 30 m (m/s)
    pub vs30: f64,
    /// Whether `vs30` was measured rather than inferred
    #[serde(default)]
    pub vs30_measured: bool,
    /// Depth (m) to the 1.0 km/s shear-wave velocity horizon
    #[serde(default)]
    pub z1pt0: Option<f64>,
    /// Depth (km) to the 2.5 km/s shear-wave velocity horizon
    #[serde(default)]
    pub z2pt5: Option<f64>,
}

impl Site {
    pub fn new(location: Point, vs30: f64) -> Self {
        Self {
            location,
            vs30,
            vs30_measured: false,
            z1pt0: None,
            z2pt5: None,
        }
    }
}

/// Ordered collection of sites.
///
/// Sites are addressed by their index in the collection; sub-collections
/// used by the source collector are index lists into this one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteCollection {
    sites: Vec<Site>,
}

impl SiteCollection {
    /// Build a collection, rejecting non-physical site parameters
    pub fn new(sites: Vec<Site>) -> Result<Self> {
        for (i, site) in sites.iter().enumerate() {
            if !(site.vs30 > 0.0) {
                return Err(Error::InvalidInput(format!(
                    "site {} has non-positive vs30 {}",
                    i, site.vs30
                )));
            }
            if !(-90.0..=90.0).contains(&site.location.latitude)
                || !(-180.0..=180.0).contains(&site.location.longitude)
            {
                return Err(Error::InvalidInput(format!(
                    "site {} has invalid coordinates ({}, {})",
                    i, site.location.longitude, site.location.latitude
                )));
            }
        }
        Ok(Self { sites })
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Site> {
        self.sites.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.sites.iter()
    }

    /// (index, site) pairs in collection order
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &Site)> {
        self.sites.iter().enumerate()
    }

    pub fn locations(&self) -> Vec<Point> {
        self.sites.iter().map(|s| s.location).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_vs30() {
        let result = SiteCollection::new(vec![Site::new(Point::surface(0.0, 0.0), 0.0)]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_bad_latitude() {
        let result = SiteCollection::new(vec![Site::new(Point::surface(0.0, 95.0), 760.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_indexed_preserves_order() {
        let sites = SiteCollection::new(vec![
            Site::new(Point::surface(0.0, 0.0), 760.0),
            Site::new(Point::surface(1.0, 0.0), 400.0),
        ])
        .unwrap();
        let indices: Vec<usize> = sites.indexed().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(sites.get(1).unwrap().vs30, 400.0);
    }
}
