//! Hazard maps and uniform hazard spectra
//!
//! Maps read the IML at a target PoE off every curve by log-log
//! interpolation. Spectra regroup map values of PGA and SA across periods
//! for each (curve kind, site, PoE).

use crate::outputs::{CurveKind, HazardMap, UniformHazardSpectrum};
use hazard_common::site::SiteCollection;
use hazard_common::{Error, Imt, Result};
use std::collections::BTreeMap;

/// PoEs below this value are raised to it before taking logarithms
pub const POE_CUTOFF: f64 = 1e-30;

/// IML at which a curve reaches `target_poe`
///
/// `imls` ascend and `poes` do not increase. Targets at or above the first
/// PoE give the first IML; targets at or below the last PoE give the last
/// IML. In between, `ln(IML)` is interpolated linearly against `ln(PoE)`
/// on the bracketing segment.
pub fn interpolate_iml(imls: &[f64], poes: &[f64], target_poe: f64) -> Result<f64> {
    if imls.is_empty() || imls.len() != poes.len() {
        return Err(Error::InvalidInput(format!(
            "curve with {} levels and {} PoEs",
            imls.len(),
            poes.len()
        )));
    }
    let poes: Vec<f64> = poes.iter().map(|p| p.max(POE_CUTOFF)).collect();
    let target = target_poe.max(POE_CUTOFF);
    let last = poes.len() - 1;

    if target >= poes[0] {
        return Ok(imls[0]);
    }
    if target <= poes[last] {
        return Ok(imls[last]);
    }

    // First point whose PoE drops below the target; the segment before it
    // brackets the target
    let upper = poes.iter().position(|&p| p < target).unwrap_or(last);
    let lower = upper - 1;
    let (p0, p1) = (poes[lower], poes[upper]);
    if p0 == p1 {
        return Ok(imls[lower]);
    }
    let (x0, x1) = (imls[lower].ln(), imls[upper].ln());
    let fraction = (target.ln() - p0.ln()) / (p1.ln() - p0.ln());
    Ok((x0 + fraction * (x1 - x0)).exp())
}

/// Hazard maps of one IMT at every target PoE
///
/// `curve_for_site` returns the PoEs of a site, aligned with `imls`.
pub fn compute_hazard_maps<'a, F>(
    kind: CurveKind,
    imt: Imt,
    imls: &[f64],
    num_sites: usize,
    curve_for_site: F,
    poes: &[f64],
) -> Result<Vec<HazardMap>>
where
    F: Fn(usize) -> &'a [f64],
{
    poes.iter()
        .map(|&poe| {
            let imls = (0..num_sites)
                .map(|site| interpolate_iml(imls, curve_for_site(site), poe))
                .collect::<Result<Vec<f64>>>()?;
            Ok(HazardMap {
                kind,
                imt,
                poe,
                imls,
            })
        })
        .collect()
}

/// Uniform hazard spectra from a set of hazard maps
///
/// Maps are grouped by (kind, PoE) and split per site. Only PGA (period
/// 0.0) and SA maps take part; spectra list periods in ascending order.
/// Groups with no spectral map produce no spectrum.
pub fn make_uhs(maps: &[HazardMap], sites: &SiteCollection) -> Vec<UniformHazardSpectrum> {
    // (kind label, poe bits) -> (kind, poe, [(period, map)])
    let mut groups: BTreeMap<(String, u64), (CurveKind, f64, Vec<(f64, &HazardMap)>)> =
        BTreeMap::new();
    for map in maps {
        let Some(period) = map.imt.spectral_period() else {
            continue;
        };
        groups
            .entry((map.kind.label(), map.poe.to_bits()))
            .or_insert_with(|| (map.kind, map.poe, Vec::new()))
            .2
            .push((period, map));
    }

    let mut spectra = Vec::new();
    for (_, (kind, poe, mut entries)) in groups {
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        let periods: Vec<f64> = entries.iter().map(|(period, _)| *period).collect();
        for (site_index, site) in sites.indexed() {
            let imls = entries
                .iter()
                .map(|(_, map)| map.imls.get(site_index).copied().unwrap_or(0.0))
                .collect();
            spectra.push(UniformHazardSpectrum {
                kind,
                poe,
                site: site_index,
                location: site.location,
                periods: periods.clone(),
                imls,
            });
        }
    }
    spectra
}
