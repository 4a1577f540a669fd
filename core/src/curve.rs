//! Concentration curve: cumulative share of population (sorted by
//! magnitude, smallest first) against cumulative share of magnitude.

use crate::{
    error::{EngineError, EngineResult},
    sampler::Entity,
    types::Pct,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurvePoint {
    pub population_share_pct: Pct,
    pub cumulative_magnitude_share_pct: Pct,
}

impl CurvePoint {
    pub fn new(population_share_pct: Pct, cumulative_magnitude_share_pct: Pct) -> Self {
        Self {
            population_share_pct,
            cumulative_magnitude_share_pct,
        }
    }
}

/// One stop along the curve, sampled at a fixed population stride.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuePathPoint {
    pub step: u32,
    pub population_share_pct: Pct,
    pub cumulative_magnitude_share_pct: Pct,
}

/// Prefix length of the point nearest `population_pct` on an `n`-point
/// curve whose points sit at k/n·100. Halfway ties go to the lower point.
pub fn nearest_index(n: usize, population_pct: Pct) -> usize {
    let x = n as f64 * population_pct / 100.0;
    (x - 0.5).ceil().max(0.0) as usize
}

/// Sort the population ascending and accumulate shares.
///
/// Equal magnitudes keep insertion order. The last point is pinned to
/// (100, 100). Fails if the total magnitude is zero or not finite.
pub fn build_curve(mut population: Vec<Entity>) -> EngineResult<Vec<CurvePoint>> {
    population.sort_by(|a, b| a.magnitude.total_cmp(&b.magnitude));

    let total: f64 = population.iter().map(|e| e.magnitude).sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(EngineError::DegenerateDistribution { total });
    }

    let n = population.len() as f64;
    let mut running = 0.0;
    let mut curve: Vec<CurvePoint> = population
        .iter()
        .enumerate()
        .map(|(i, e)| {
            running += e.magnitude;
            CurvePoint::new((i + 1) as f64 / n * 100.0, running / total * 100.0)
        })
        .collect();

    if let Some(last) = curve.last_mut() {
        *last = CurvePoint::new(100.0, 100.0);
    }
    Ok(curve)
}

/// Cumulative magnitude share at `population_pct`, linearly
/// interpolated between points with an implicit origin at (0, 0).
pub fn share_at(curve: &[CurvePoint], population_pct: Pct) -> Pct {
    if population_pct <= 0.0 || curve.is_empty() {
        return 0.0;
    }
    let idx = curve.partition_point(|p| p.population_share_pct < population_pct);
    let Some(hi) = curve.get(idx) else {
        return curve[curve.len() - 1].cumulative_magnitude_share_pct;
    };
    let lo = if idx == 0 {
        CurvePoint::new(0.0, 0.0)
    } else {
        curve[idx - 1]
    };
    let span = hi.population_share_pct - lo.population_share_pct;
    if span <= 0.0 {
        return hi.cumulative_magnitude_share_pct;
    }
    let t = (population_pct - lo.population_share_pct) / span;
    lo.cumulative_magnitude_share_pct
        + t * (hi.cumulative_magnitude_share_pct - lo.cumulative_magnitude_share_pct)
}

/// The point whose population share is closest to `population_pct`.
/// Ties go to the earlier point.
pub fn nearest_point(curve: &[CurvePoint], population_pct: Pct) -> Option<&CurvePoint> {
    curve.iter().min_by(|a, b| {
        let da = (a.population_share_pct - population_pct).abs();
        let db = (b.population_share_pct - population_pct).abs();
        da.total_cmp(&db)
    })
}

/// Gini-style concentration index: 1 - 2 × (area under the curve),
/// trapezoidal, in fraction units. 0 means perfectly even.
pub fn concentration_index(curve: &[CurvePoint]) -> f64 {
    let mut area = 0.0;
    let mut prev = CurvePoint::new(0.0, 0.0);
    for p in curve {
        let width = (p.population_share_pct - prev.population_share_pct) / 100.0;
        let height =
            (p.cumulative_magnitude_share_pct + prev.cumulative_magnitude_share_pct) / 200.0;
        area += width * height;
        prev = *p;
    }
    1.0 - 2.0 * area
}

/// Sample the curve every `max(4, count / 13)` entities.
pub fn value_path(curve: &[CurvePoint]) -> Vec<ValuePathPoint> {
    let count = curve.len();
    let stride = (count / 13).max(4);
    (stride..=count)
        .step_by(stride)
        .enumerate()
        .map(|(k, i)| {
            let p = curve[i - 1];
            ValuePathPoint {
                step: (k + 1) as u32,
                population_share_pct: p.population_share_pct,
                cumulative_magnitude_share_pct: p.cumulative_magnitude_share_pct,
            }
        })
        .collect()
}
