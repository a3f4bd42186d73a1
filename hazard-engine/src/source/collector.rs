//! Source filtering and splitting
//!
//! Sources beyond the integration distance from every site are dropped.
//! Sources with more ruptures than the split threshold are partitioned into
//! sub-sources of consecutive ruptures so that a single large fault or area
//! does not serialize a whole task block.

use super::{Rupture, SeismicSource, SourceTypology};
use hazard_common::site::SiteCollection;
use tracing::debug;

/// A retained (sub-)source with the sites it can affect
#[derive(Debug, Clone)]
pub struct CollectedSource {
    /// Source id, suffixed with `:<n>` for the n-th split fragment
    pub source_id: String,
    pub tectonic_region_type: String,
    pub typology: SourceTypology,
    pub ruptures: Vec<Rupture>,
    /// Indices into the site collection, ascending
    pub site_indices: Vec<usize>,
}

impl CollectedSource {
    pub fn total_rate(&self) -> f64 {
        self.ruptures.iter().map(|r| r.occurrence_rate).sum()
    }
}

/// Filters sources against a site collection and splits large ones
#[derive(Debug, Clone, Copy)]
pub struct SourceCollector {
    max_distance: f64,
    rupture_split_threshold: usize,
}

impl SourceCollector {
    pub fn new(max_distance: f64, rupture_split_threshold: usize) -> Self {
        Self {
            max_distance,
            rupture_split_threshold: rupture_split_threshold.max(1),
        }
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// Filter and split `sources` against `sites`
    ///
    /// Output is sorted by source id; fragments of one source follow rupture
    /// order. Each fragment keeps only the sites within `max_distance` of
    /// at least one of its ruptures, and fragments with no such site are
    /// dropped.
    pub fn filter_and_split(
        &self,
        sources: &[SeismicSource],
        sites: &SiteCollection,
    ) -> Vec<CollectedSource> {
        let mut ordered: Vec<&SeismicSource> = sources.iter().collect();
        ordered.sort_by(|a, b| a.source_id.cmp(&b.source_id));

        let mut collected = Vec::new();
        for source in ordered {
            if source.min_distance(sites) > self.max_distance {
                debug!(
                    source_id = %source.source_id,
                    max_distance = self.max_distance,
                    "Source beyond integration distance, skipped"
                );
                continue;
            }

            let ruptures = source.ruptures();
            if ruptures.len() <= self.rupture_split_threshold {
                if let Some(fragment) =
                    self.fragment(source, source.source_id.clone(), ruptures, sites)
                {
                    collected.push(fragment);
                }
                continue;
            }

            let num_fragments = ruptures.len().div_ceil(self.rupture_split_threshold);
            debug!(
                source_id = %source.source_id,
                num_ruptures = ruptures.len(),
                num_fragments,
                "Splitting source"
            );
            for (i, chunk) in ruptures.chunks(self.rupture_split_threshold).enumerate() {
                let id = format!("{}:{}", source.source_id, i);
                if let Some(fragment) = self.fragment(source, id, chunk.to_vec(), sites) {
                    collected.push(fragment);
                }
            }
        }
        collected
    }

    fn fragment(
        &self,
        source: &SeismicSource,
        source_id: String,
        ruptures: Vec<Rupture>,
        sites: &SiteCollection,
    ) -> Option<CollectedSource> {
        let site_indices: Vec<usize> = sites
            .indexed()
            .filter(|(_, site)| {
                ruptures
                    .iter()
                    .any(|r| r.min_distance(&site.location) <= self.max_distance)
            })
            .map(|(i, _)| i)
            .collect();

        if site_indices.is_empty() {
            return None;
        }
        Some(CollectedSource {
            source_id,
            tectonic_region_type: source.tectonic_region_type.clone(),
            typology: source.typology,
            ruptures,
            site_indices,
        })
    }
}
