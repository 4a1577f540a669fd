//! The generation engine.
//!
//! PIPELINE ORDER (fixed):
//!   1. Validate config
//!   2. Seed the sequence source
//!   3. Sample the skewed population
//!   4. Build the raw concentration curve
//!   5. Calibrate it against the anchor
//!   6. Derive the monthly series and the histogram
//!
//! RULES:
//!   - Every stage is a pure function of the config and the stages before it.
//!   - The engine holds no state across calls; each call re-seeds.
//!   - Any failure aborts the call; there is no partial result.

use crate::{
    calibration::{calibrator_for, AnchorConstraint, CalibrationReport},
    config::GenerationConfig,
    curve::{build_curve, concentration_index, value_path, CurvePoint, ValuePathPoint},
    error::EngineResult,
    rng::SequenceRng,
    sampler::SkewedSampler,
    series::{histogram, monthly_series, HistogramBin, MonthlyPoint},
    types::Pct,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorSummary {
    pub population_share_pct: Pct,
    pub magnitude_share_pct: Pct,
    pub complement_population_share_pct: Pct,
    pub complement_magnitude_share_pct: Pct,
    pub concentration_index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub curve: Vec<CurvePoint>,
    pub anchor_summary: AnchorSummary,
    pub monthly: Vec<MonthlyPoint>,
    pub histogram: Vec<HistogramBin>,
    pub value_path: Vec<ValuePathPoint>,
    pub calibration: CalibrationReport,
}

pub struct ConcentrationEngine;

impl ConcentrationEngine {
    /// The uncalibrated curve a config's sample produces.
    pub fn raw_curve(config: &GenerationConfig) -> EngineResult<Vec<CurvePoint>> {
        config.validate()?;
        Self::sample_raw_curve(config)
    }

    /// Run the full pipeline for one config.
    pub fn generate(config: &GenerationConfig) -> EngineResult<GenerationResult> {
        config.validate()?;

        let raw = Self::sample_raw_curve(config)?;
        log::debug!(
            "engine: raw curve of {} points, {}% of population holds {:.2}%",
            raw.len(),
            config.anchor_population_share_pct,
            raw[config.anchor_index() - 1].cumulative_magnitude_share_pct
        );

        let anchor = AnchorConstraint::from_config(config);
        let calibration = calibrator_for(config).calibrate(&raw, &anchor)?;
        let curve = calibration.curve;
        let matched = curve[config.anchor_index() - 1].cumulative_magnitude_share_pct;

        let monthly = monthly_series(config.months, &config.monthly)?;
        let histogram = histogram(config.histogram_bins, &config.histogram)?;

        let anchor_summary = AnchorSummary {
            population_share_pct: anchor.population_share_pct,
            magnitude_share_pct: matched,
            complement_population_share_pct: 100.0 - anchor.population_share_pct,
            complement_magnitude_share_pct: 100.0 - matched,
            concentration_index: concentration_index(&curve),
        };

        log::info!(
            "engine: generated seed={} count={} strategy={} index={:.3} converged={}",
            config.seed,
            config.count,
            config.strategy.name(),
            anchor_summary.concentration_index,
            calibration.report.converged
        );

        Ok(GenerationResult {
            value_path: value_path(&curve),
            curve,
            anchor_summary,
            monthly,
            histogram,
            calibration: calibration.report,
        })
    }

    fn sample_raw_curve(config: &GenerationConfig) -> EngineResult<Vec<CurvePoint>> {
        let mut rng = SequenceRng::new(config.sequence, config.seed_u32()?);
        let population = SkewedSampler::new(&config.skew).sample(&mut rng, config.count);
        build_curve(population)
    }
}

/// Shorthand for `ConcentrationEngine::generate`.
pub fn generate(config: &GenerationConfig) -> EngineResult<GenerationResult> {
    ConcentrationEngine::generate(config)
}
